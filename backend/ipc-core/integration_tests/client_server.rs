use crate::helpers::{Observer, eventually, start_client, start_server};

use ipc_core::client::ClientOptions;
use ipc_core::config::{RequestConfig, ServerOptions};
use ipc_core::error::ipc::IpcError;
use ipc_core::handler::MessageHandler;
use ipc_core::message::{
    ApiVersion, Body, ClientId, CommitMutation, Message, MessageId, MessageType,
    UnregisterClientRequest, WindowId, encode,
};
use ipc_core::store::StateStore;
use ipc_core::transport::LocalBus;

use std::time::Duration;

use serde_json::{Value, json};
use tokio::task::JoinSet;
use uuid::Uuid;

/// Larger than any fixed-size queue between the bus and a participant would hold.
const BURST: usize = 3000;

/// **VALUE**: Verifies the basic round trip: register, then dispatch an unowned action.
///
/// **WHY THIS MATTERS**: This is what every UI process does at startup and on
/// every user interaction.
///
/// **BUG THIS CATCHES**: Would catch:
/// - The server not assigning a client id
/// - Unowned actions not being executed against the canonical store
/// - The return value being lost between store and response
/// - Commits not reaching the requesting client's replica
#[tokio::test]
async fn given_registered_client_when_dispatching_unowned_action_then_server_executes_it() {
    // GIVEN: A server and renderer-1 (window 1, no actions) on one bus
    let bus = LocalBus::new();
    let server = start_server(&bus, ServerOptions::default());
    let client = start_client(
        bus.connect(),
        ClientOptions::new("renderer-1").with_identity(WindowId(1)),
    );

    // WHEN: The client registers
    let registered = client.register().await.expect("register");

    // THEN: The server assigned an id and recorded the window
    assert!(registered);
    let client_id = client.client_id().expect("has id");
    let records = server.server().clients();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id, client_id);
    assert_eq!(records[0].name, "renderer-1");
    assert_eq!(records[0].window_id, Some(WindowId(1)));

    // WHEN: It dispatches an action nobody owns
    let return_value = client
        .dispatch_action("game-info/setGameName", json!("Celeste"), None)
        .await
        .expect("dispatch");

    // THEN: The server ran it and the commit reached the replica
    assert_eq!(return_value, Value::Bool(true));
    assert_eq!(
        server.server().store().snapshot()["gameInfo"]["name"],
        "Celeste"
    );
    let replica = client.store().clone();
    assert!(eventually(|| replica.snapshot()["gameInfo"]["name"] == "Celeste").await);
}

/// **VALUE**: Verifies registering twice is a no-op the second time.
///
/// **BUG THIS CATCHES**: Would catch a second registration replacing the client id
/// or creating a duplicate record on the server.
#[tokio::test]
async fn given_registered_client_when_register_again_then_returns_false_and_keeps_id() {
    // GIVEN: A registered client
    let bus = LocalBus::new();
    let server = start_server(&bus, ServerOptions::default());
    let client = start_client(bus.connect(), ClientOptions::new("renderer-1"));
    assert!(client.register().await.expect("register"));
    let first_id = client.client_id();

    // WHEN: Registering again
    let second = client.register().await.expect("register again");

    // THEN: Nothing changed
    assert!(!second);
    assert_eq!(client.client_id(), first_id);
    assert_eq!(server.server().clients().len(), 1);
}

/// **VALUE**: Verifies unregistering without registering sends nothing.
///
/// **BUG THIS CATCHES**: Would catch a request being sent with a missing id.
#[tokio::test]
async fn given_unregistered_client_when_unregister_then_returns_false_without_traffic() {
    let bus = LocalBus::new();
    let mut observer = Observer::attach(&bus);
    let client = start_client(bus.connect(), ClientOptions::new("renderer-1"));

    let removed = client.unregister().await.expect("unregister");

    assert!(!removed);
    observer.assert_quiet().await;
}

/// **VALUE**: Verifies a full register/unregister cycle.
///
/// **BUG THIS CATCHES**: Would catch the local id surviving a successful unregister,
/// or the server keeping the record.
#[tokio::test]
async fn given_registered_client_when_unregister_then_server_forgets_it() {
    let bus = LocalBus::new();
    let server = start_server(&bus, ServerOptions::default());
    let client = start_client(
        bus.connect(),
        ClientOptions::new("renderer-1").with_actions(["settings/open"]),
    );
    client.register().await.expect("register");
    assert!(server.server().action_owner("settings/open").is_some());

    let removed = client.unregister().await.expect("unregister");

    assert!(removed);
    assert_eq!(client.client_id(), None);
    assert!(server.server().clients().is_empty());
    assert_eq!(server.server().action_owner("settings/open"), None);
}

/// **VALUE**: Verifies the server reports failure for an id it does not know.
///
/// **WHY THIS MATTERS**: A process restarting with a stale id must learn that the
/// server no longer knows it.
///
/// **BUG THIS CATCHES**: Would catch the server answering `successful: true` when
/// nothing was removed.
#[tokio::test]
async fn given_stale_client_id_when_unregister_then_server_responds_unsuccessful() {
    // GIVEN: A server and a raw handler
    let bus = LocalBus::new();
    let _server = start_server(&bus, ServerOptions::default());
    let (handler, _inbox) = MessageHandler::initialize(bus.connect(), &RequestConfig::default());

    // WHEN: Unregistering an id the server never issued
    let stale = ClientId::from(Uuid::new_v4());
    let result = handler
        .send_request_await_response(
            Body::UnregisterClient(UnregisterClientRequest { client_id: stale }),
            MessageType::UnregisterClientResponse,
        )
        .await;

    // THEN: The server refused
    let error = result.expect_err("stale id is refused");
    let message = error.remote_message().expect("remote failure");
    assert!(message.contains(&stale.to_string()));
}

/// **VALUE**: Verifies dispatch before registration fails locally.
///
/// **BUG THIS CATCHES**: Would catch a dispatch going out with no client id.
#[tokio::test]
async fn given_unregistered_client_when_dispatch_then_fails_without_traffic() {
    let bus = LocalBus::new();
    let mut observer = Observer::attach(&bus);
    let client = start_client(bus.connect(), ClientOptions::new("renderer-1"));

    let result = client
        .dispatch_action("game-info/setGameName", json!("Celeste"), None)
        .await;

    assert!(matches!(result, Err(IpcError::NotRegistered { .. })));
    observer.assert_quiet().await;
}

/// **VALUE**: Verifies an action error comes back as a failed dispatch.
///
/// **WHY THIS MATTERS**: Application errors are failed responses, never transport faults.
///
/// **BUG THIS CATCHES**: Would catch the server publishing commits for a failed
/// action, dropping the response, or leaking its source location into the
/// wire `error.message`.
#[tokio::test]
async fn given_failing_action_when_dispatched_then_client_receives_error() {
    let bus = LocalBus::new();
    let server = start_server(&bus, ServerOptions::default());
    let client = start_client(bus.connect(), ClientOptions::new("renderer-1"));
    client.register().await.expect("register");

    let failed = client
        .dispatch_action("game-info/setGameName", json!(42), None)
        .await;
    let unknown = client.dispatch_action("game-info/delete", Value::Null, None).await;

    let message = failed
        .expect_err("action refused")
        .remote_message()
        .map(str::to_owned)
        .expect("remote failure");
    assert_eq!(
        message,
        "Action 'game-info/setGameName' failed: Game name must be a string"
    );
    assert_eq!(
        unknown.expect_err("no such action").remote_message(),
        Some("Unknown Action: game-info/delete")
    );
    assert!(server.server().store().snapshot()["gameInfo"]["name"].is_null());

    let versions = client.get_available_versions().await.expect("still serving");
    assert_eq!(versions, vec![ApiVersion::V1]);
}

/// **VALUE**: Verifies an unknown request type gets an invalid-request response.
///
/// **WHY THIS MATTERS**: Protocol errors are recoverable; the server must answer
/// and keep running.
///
/// **BUG THIS CATCHES**: Would catch the server ignoring the request, crashing on
/// it, or omitting the type from the error.
#[tokio::test]
async fn given_unknown_request_type_when_sent_then_server_answers_invalid_request() {
    // GIVEN: A server and a raw observer
    let bus = LocalBus::new();
    let server = start_server(&bus, ServerOptions::default());
    let mut observer = Observer::attach(&bus);

    // WHEN: The observer sends a type the protocol does not define
    let request_id = MessageId::new();
    let frame = json!({ "id": request_id, "type": "fly-to-moon" }).to_string();
    observer.sender.send(frame).expect("send");

    // THEN: The server answers with a failed invalid-request response naming the type
    let response = observer.next().await;
    assert_eq!(
        response.message_type(),
        Some(MessageType::InvalidRequestResponse)
    );
    let status = response.body.response_status().expect("is a response");
    assert_eq!(status.responds_to, request_id);
    assert!(!status.successful);
    let error = status.error.as_ref().expect("has error");
    assert!(error.message.contains("fly-to-moon"));

    // THEN: The server is still serving
    let ping = Message::new(Body::GetAvailableVersions);
    observer
        .sender
        .send(encode(&ping).expect("encode"))
        .expect("send");
    let versions = observer.next().await;
    assert_eq!(
        versions.body.response_status().map(|status| status.responds_to),
        Some(ping.id)
    );
    assert_eq!(server.server().handler().pending_requests(), 0);
}

/// **VALUE**: Verifies `sync_store_state` pulls the canonical snapshot into the replica.
///
/// **BUG THIS CATCHES**: Would catch a replica that joined late never catching up.
#[tokio::test]
async fn given_late_client_when_sync_store_state_then_replica_matches_canonical_store() {
    // GIVEN: A server whose canonical store already changed
    let bus = LocalBus::new();
    let server = start_server(&bus, ServerOptions::default());
    server
        .server()
        .store()
        .commit("game-info/setName", json!("Celeste"), None)
        .expect("commit");

    // WHEN: A new client syncs
    let client = start_client(bus.connect(), ClientOptions::new("renderer-2"));
    client.sync_store_state().await.expect("sync");

    // THEN: Its replica matches
    assert_eq!(client.store().snapshot(), server.server().store().snapshot());
}

/// **VALUE**: Verifies commits reach every replica, not only the requester's.
///
/// **BUG THIS CATCHES**: Would catch the server replying to the requester only.
#[tokio::test]
async fn given_two_clients_when_one_dispatches_then_both_replicas_follow() {
    let bus = LocalBus::new();
    let _server = start_server(&bus, ServerOptions::default());
    let first = start_client(bus.connect(), ClientOptions::new("renderer-1"));
    let second = start_client(bus.connect(), ClientOptions::new("renderer-2"));
    first.register().await.expect("register");
    second.register().await.expect("register");

    first
        .dispatch_action("counter/increment", Value::Null, None)
        .await
        .expect("dispatch");

    let first_store = first.store().clone();
    let second_store = second.store().clone();
    assert!(eventually(|| first_store.snapshot()["count"] == 1).await);
    assert!(eventually(|| second_store.snapshot()["count"] == 1).await);
}

/// **VALUE**: Verifies a burst of concurrent requests is answered in full.
///
/// **WHY THIS MATTERS**: Every renderer fires requests without waiting on each
/// other; the server works through its inbox one message at a time, so a burst
/// has to queue behind it.
///
/// **BUG THIS CATCHES**: Would catch:
/// - The server's inbox dropping requests it has not reached yet
/// - Responses lost on their way back through the bus
/// - Pending entries left behind after the burst
#[tokio::test]
async fn given_request_burst_when_sent_concurrently_then_every_request_is_answered() {
    // GIVEN: A server and one handler with a timeout so a lost request fails the test
    let bus = LocalBus::new();
    let _server = start_server(&bus, ServerOptions::default());
    let config = RequestConfig::default().with_timeout(Duration::from_secs(10));
    let (handler, _) = MessageHandler::initialize(bus.connect(), &config);

    // WHEN: Thousands of requests are in flight at once
    let mut requests = JoinSet::new();
    for _ in 0..BURST {
        let handler = handler.clone();
        requests.spawn(async move {
            handler
                .send_request_await_response(
                    Body::GetAvailableVersions,
                    MessageType::GetAvailableVersionsResponse,
                )
                .await
        });
    }

    // THEN: Each one got its response
    let mut answered = 0;
    while let Some(outcome) = requests.join_next().await {
        outcome.expect("request task").expect("request answered");
        answered += 1;
    }
    assert_eq!(answered, BURST);
    assert_eq!(handler.pending_requests(), 0);
}

/// **VALUE**: Verifies a client applies every commit in a burst of pushes.
///
/// **BUG THIS CATCHES**: Would catch a lagging client skipping `commit-mutation`
/// pushes and its replica silently drifting from the canonical store.
#[tokio::test]
async fn given_commit_burst_when_pushed_to_client_then_replica_applies_every_commit() {
    // GIVEN: A client and a raw participant standing in for the server
    let bus = LocalBus::new();
    let observer = Observer::attach(&bus);
    let client = start_client(bus.connect(), ClientOptions::new("renderer-1"));

    // WHEN: The participant pushes thousands of commits back to back
    for _ in 0..BURST {
        let push = Message::new(Body::CommitMutation(CommitMutation {
            mutation: String::from("counter/add"),
            payload: json!(1),
            options: None,
            source_client_id: None,
        }));
        observer
            .sender
            .send(encode(&push).expect("encode"))
            .expect("send");
    }

    // THEN: The replica counted every one of them
    let store = client.store().clone();
    assert!(eventually(|| store.snapshot()["count"] == json!(BURST)).await);
}
