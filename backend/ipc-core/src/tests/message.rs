// Unit tests for the wire model
// Tests tag names, camelCase fields, and decode failure modes

use crate::error::ipc::IpcError;
use crate::message::{
    Body, ClientActionResult, ClientId, Commit, CommitMutation, DispatchActionRequest, Message,
    MessageId, MessageType, RegisterClientRequest, RegisterResult, Response, WindowId, decode,
    encode, invalid_request,
};

use serde_json::{Value, json};
use uuid::Uuid;

fn as_json(message: &Message) -> Value {
    serde_json::from_str(&encode(message).expect("encode")).expect("valid json")
}

/// **VALUE**: Verifies the exact JSON shape of a registration request.
///
/// **WHY THIS MATTERS**: Every process speaks this format; a renamed field or tag
/// silently breaks every peer that was not rebuilt.
///
/// **BUG THIS CATCHES**: Would catch snake_case leaking onto the wire, a missing
/// `type` tag, or `id` nested instead of flattened.
#[test]
fn given_register_request_when_encoded_then_uses_kebab_tag_and_camel_case_fields() {
    // GIVEN: A registration request from renderer-1
    let message = Message::new(Body::RegisterClient(RegisterClientRequest {
        name: String::from("renderer-1"),
        actions: vec![],
        window_id: Some(WindowId(1)),
    }));

    // WHEN: Encoding it
    let value = as_json(&message);

    // THEN: Fields are flat, tag is kebab-case, names are camelCase
    assert_eq!(value["type"], "register-client");
    assert_eq!(value["id"], message.id.to_string());
    assert_eq!(value["name"], "renderer-1");
    assert_eq!(value["windowId"], 1);
    assert_eq!(value["actions"], json!([]));
}

/// **VALUE**: Verifies a response carries its correlation header next to its result fields.
///
/// **WHY THIS MATTERS**: Correlation reads `respondsTo` and `successful` from the
/// same object that carries the result.
///
/// **BUG THIS CATCHES**: Would catch the status being nested under a sub-object.
#[test]
fn given_register_response_when_encoded_then_status_and_result_are_flat() {
    // GIVEN: A successful registration response
    let request_id = MessageId::new();
    let client_id = ClientId::from(Uuid::new_v4());
    let message = Message::new(Body::RegisterClientResponse(Response::ok(
        request_id,
        RegisterResult {
            client_id: Some(client_id),
        },
    )));

    // WHEN: Encoding it
    let value = as_json(&message);

    // THEN: Header and result share one level, and no error is present
    assert_eq!(value["type"], "register-client-response");
    assert_eq!(value["respondsTo"], request_id.to_string());
    assert_eq!(value["successful"], true);
    assert_eq!(value["clientId"], client_id.to_string());
    assert!(value.get("error").is_none());
}

/// **VALUE**: Verifies messages survive a trip through the wire format.
///
/// **WHY THIS MATTERS**: Every participant decodes what another encoded.
///
/// **BUG THIS CATCHES**: Would catch asymmetric serde attributes, e.g. a field that
/// is renamed on serialize but not on deserialize.
#[test]
fn given_messages_with_every_field_shape_when_round_tripped_then_structurally_identical() {
    // GIVEN: Messages with optional fields (absent, null, and set), nested
    // payloads, and unit bodies
    let client_id = ClientId::from(Uuid::new_v4());
    let messages = vec![
        Message::new(Body::GetAvailableVersions),
        Message::new(Body::DispatchAction(DispatchActionRequest {
            client_id,
            action: String::from("game-info/setGameName"),
            payload: json!("Celeste"),
            options: Some(json!({ "root": true })),
        })),
        Message::new(Body::DispatchAction(DispatchActionRequest {
            client_id,
            action: String::from("counter/increment"),
            payload: Value::Null,
            options: Some(Value::Null),
        })),
        Message::new(Body::CommitMutation(CommitMutation {
            mutation: String::from("counter/add"),
            payload: json!(1),
            options: Some(Value::Null),
            source_client_id: None,
        })),
        Message::new(Body::CommitMutation(CommitMutation {
            mutation: String::from("game-info/setName"),
            payload: json!({ "name": "Celeste", "chapters": [1, 2, 3] }),
            options: None,
            source_client_id: Some(client_id),
        })),
        Message::new(Body::DispatchClientActionResponse(Response::ok(
            MessageId::new(),
            ClientActionResult {
                return_value: json!(42),
                commits: vec![
                    Commit::new("counter/add", json!(1), None),
                    Commit::new("counter/add", json!(2), Some(Value::Null)),
                ],
            },
        ))),
        Message::new(invalid_request(MessageId::new(), "fly-to-moon")),
    ];

    for message in messages {
        // WHEN: Encoding then decoding
        let decoded = decode(&encode(&message).expect("encode")).expect("decode");

        // THEN: Nothing was lost or reshaped
        assert_eq!(decoded, message);
    }
}

/// **VALUE**: Verifies `"options": null` and a missing `options` stay distinct.
///
/// **BUG THIS CATCHES**: Would catch an explicit null collapsing into `None`, which
/// hands a mutation different options than the sender committed with.
#[test]
fn given_null_and_absent_options_when_decoded_then_kept_apart() {
    let id = MessageId::new();
    let with_null =
        json!({ "id": id, "type": "commit-mutation", "mutation": "counter/add", "options": null });
    let absent = json!({ "id": id, "type": "commit-mutation", "mutation": "counter/add" });

    let options = |frame: Value| match decode(&frame.to_string()).expect("decode").body {
        Body::CommitMutation(commit) => commit.options,
        other => panic!("expected commit-mutation, got {}", other.type_name()),
    };

    assert_eq!(options(with_null), Some(Value::Null));
    assert_eq!(options(absent), None);
}

/// **VALUE**: Verifies an unknown tag decodes instead of failing.
///
/// **WHY THIS MATTERS**: An unknown request type is a protocol error the server
/// answers; it must not kill the server's listener like a malformed frame would.
///
/// **BUG THIS CATCHES**: Would catch unknown tags being reported as decode errors.
#[test]
fn given_unknown_type_tag_when_decoded_then_yields_unrecognized_body() {
    // GIVEN: A well-formed frame with a tag this protocol does not define
    let id = MessageId::new();
    let frame = json!({ "id": id, "type": "fly-to-moon", "speed": 9000 }).to_string();

    // WHEN: Decoding it
    let message = decode(&frame).expect("unknown tags still decode");

    // THEN: The tag is preserved for the invalid-request reply
    assert_eq!(message.id, id);
    assert_eq!(message.body.type_name(), "fly-to-moon");
    assert_eq!(message.message_type(), None);
}

/// **VALUE**: Verifies malformed frames are decode errors.
///
/// **WHY THIS MATTERS**: A malformed frame is a transport fault; it has to be
/// surfaced, not skipped.
///
/// **BUG THIS CATCHES**: Would catch garbage or a known tag with the wrong fields
/// being accepted.
#[test]
fn given_malformed_frames_when_decoded_then_returns_decode_error() {
    let id = MessageId::new();
    let frames = [
        String::from("not json"),
        json!({ "type": "get-store-state" }).to_string(),
        json!({ "id": id, "type": "unregister-client" }).to_string(),
        json!({ "id": id, "type": "register-client-response", "successful": true }).to_string(),
    ];

    for frame in frames {
        let result = decode(&frame);
        assert!(
            matches!(result, Err(IpcError::Decode { .. })),
            "expected decode error for {frame}, got {result:?}"
        );
    }
}

/// **VALUE**: Verifies the invalid-request reply names the offending type.
///
/// **WHY THIS MATTERS**: The requester only learns what went wrong from the message text.
///
/// **BUG THIS CATCHES**: Would catch a generic error text or `successful: true`.
#[test]
fn given_type_name_when_invalid_request_then_failed_response_names_type() {
    let request_id = MessageId::new();

    let body = invalid_request(request_id, "fly-to-moon");

    let status = body.response_status().expect("is a response");
    assert_eq!(body.message_type(), Some(MessageType::InvalidRequestResponse));
    assert_eq!(status.responds_to, request_id);
    assert!(!status.successful);
    let error = status.error.as_ref().expect("carries an error");
    assert!(error.message.contains("fly-to-moon"));
}

/// **VALUE**: Verifies tag lookup and tag rendering agree for every type.
///
/// **BUG THIS CATCHES**: Would catch a tag added to [`MessageType`] but left out of
/// `ALL`, which would make the decoder treat it as unrecognized.
#[test]
fn given_every_message_type_when_looked_up_by_tag_then_found() {
    for kind in MessageType::ALL {
        assert_eq!(MessageType::from_tag(kind.as_str()), Some(*kind));
    }
    assert_eq!(MessageType::from_tag("commit_mutation"), None);
}
