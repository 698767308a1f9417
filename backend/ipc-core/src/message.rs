//! Wire model for the cross-process protocol.
//!
//! Every frame on the wire is one JSON object: an `id`, a `type` tag, and the
//! fields that belong to that tag. [`Body`] is the closed set of tags; adding
//! a message type means adding a variant, and every `match` on [`Body`] that
//! has to handle it stops compiling until it does.
//!
//! ```text
//! {"id":"7c1e...","type":"register-client","name":"renderer-1","actions":[],"windowId":1}
//! {"id":"a90f...","type":"register-client-response","respondsTo":"7c1e...","successful":true,"clientId":"..."}
//! ```

use crate::error::ipc::IpcError;

use std::fmt::{Display, Formatter, Result as FormatResult};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Unique identifier of a single message instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(Uuid);

impl MessageId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for MessageId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FormatResult {
        write!(formatter, "{}", self.0)
    }
}

/// Server-assigned identifier of a registered client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(Uuid);

impl ClientId {
    /// Only the server allocates client ids.
    pub(crate) fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl From<Uuid> for ClientId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Display for ClientId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FormatResult {
        write!(formatter, "{}", self.0)
    }
}

/// Identity of the window/process a client runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WindowId(pub u32);

impl Display for WindowId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FormatResult {
        write!(formatter, "{}", self.0)
    }
}

/// Protocol versions the server accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ApiVersion {
    #[serde(rename = "v1")]
    V1,
}

impl ApiVersion {
    pub const CURRENT: ApiVersion = ApiVersion::V1;
    pub const ALL: &'static [ApiVersion] = &[ApiVersion::V1];
}

/// A single frame on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    #[serde(flatten)]
    pub body: Body,
}

impl Message {
    /// Wraps `body` in a message with a fresh id.
    pub fn new(body: Body) -> Self {
        Self {
            id: MessageId::new(),
            body,
        }
    }

    pub fn message_type(&self) -> Option<MessageType> {
        self.body.message_type()
    }

    /// True for messages that carry `respondsTo`.
    pub fn is_response(&self) -> bool {
        self.body.response_status().is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Body {
    GetAvailableVersions,
    RegisterClient(RegisterClientRequest),
    UnregisterClient(UnregisterClientRequest),
    GetStoreState,
    DispatchAction(DispatchActionRequest),
    /// Sent by the server to the client that owns an action.
    DispatchClientAction(DispatchActionRequest),
    /// Pushed by the server after a mutation was applied to the canonical store.
    CommitMutation(CommitMutation),

    GetAvailableVersionsResponse(Response<VersionsResult>),
    RegisterClientResponse(Response<RegisterResult>),
    UnregisterClientResponse(Response<NoResult>),
    GetStoreStateResponse(Response<StateResult>),
    DispatchActionResponse(Response<ReturnValueResult>),
    DispatchClientActionResponse(Response<ClientActionResult>),
    InvalidRequestResponse(Response<NoResult>),

    /// A frame whose `type` tag is not part of this protocol version. Produced by
    /// [`decode`] only; it is never written to the wire.
    #[serde(skip)]
    Unrecognized(UnrecognizedMessage),
}

impl Body {
    pub fn message_type(&self) -> Option<MessageType> {
        let message_type = match self {
            Body::GetAvailableVersions => MessageType::GetAvailableVersions,
            Body::RegisterClient(_) => MessageType::RegisterClient,
            Body::UnregisterClient(_) => MessageType::UnregisterClient,
            Body::GetStoreState => MessageType::GetStoreState,
            Body::DispatchAction(_) => MessageType::DispatchAction,
            Body::DispatchClientAction(_) => MessageType::DispatchClientAction,
            Body::CommitMutation(_) => MessageType::CommitMutation,
            Body::GetAvailableVersionsResponse(_) => MessageType::GetAvailableVersionsResponse,
            Body::RegisterClientResponse(_) => MessageType::RegisterClientResponse,
            Body::UnregisterClientResponse(_) => MessageType::UnregisterClientResponse,
            Body::GetStoreStateResponse(_) => MessageType::GetStoreStateResponse,
            Body::DispatchActionResponse(_) => MessageType::DispatchActionResponse,
            Body::DispatchClientActionResponse(_) => MessageType::DispatchClientActionResponse,
            Body::InvalidRequestResponse(_) => MessageType::InvalidRequestResponse,
            Body::Unrecognized(_) => return None,
        };
        Some(message_type)
    }

    /// The wire tag, including the tag of an unrecognized frame.
    pub fn type_name(&self) -> &str {
        match self {
            Body::Unrecognized(unrecognized) => &unrecognized.type_name,
            other => other.message_type().map_or("", MessageType::as_str),
        }
    }

    pub fn response_status(&self) -> Option<&ResponseStatus> {
        match self {
            Body::GetAvailableVersionsResponse(response) => Some(&response.status),
            Body::RegisterClientResponse(response) => Some(&response.status),
            Body::UnregisterClientResponse(response) => Some(&response.status),
            Body::GetStoreStateResponse(response) => Some(&response.status),
            Body::DispatchActionResponse(response) => Some(&response.status),
            Body::DispatchClientActionResponse(response) => Some(&response.status),
            Body::InvalidRequestResponse(response) => Some(&response.status),
            Body::GetAvailableVersions
            | Body::RegisterClient(_)
            | Body::UnregisterClient(_)
            | Body::GetStoreState
            | Body::DispatchAction(_)
            | Body::DispatchClientAction(_)
            | Body::CommitMutation(_)
            | Body::Unrecognized(_) => None,
        }
    }
}

/// Fieldless mirror of the [`Body`] tags, used to name the response a request waits for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    GetAvailableVersions,
    RegisterClient,
    UnregisterClient,
    GetStoreState,
    DispatchAction,
    DispatchClientAction,
    CommitMutation,
    GetAvailableVersionsResponse,
    RegisterClientResponse,
    UnregisterClientResponse,
    GetStoreStateResponse,
    DispatchActionResponse,
    DispatchClientActionResponse,
    InvalidRequestResponse,
}

impl MessageType {
    pub const ALL: &'static [MessageType] = &[
        MessageType::GetAvailableVersions,
        MessageType::RegisterClient,
        MessageType::UnregisterClient,
        MessageType::GetStoreState,
        MessageType::DispatchAction,
        MessageType::DispatchClientAction,
        MessageType::CommitMutation,
        MessageType::GetAvailableVersionsResponse,
        MessageType::RegisterClientResponse,
        MessageType::UnregisterClientResponse,
        MessageType::GetStoreStateResponse,
        MessageType::DispatchActionResponse,
        MessageType::DispatchClientActionResponse,
        MessageType::InvalidRequestResponse,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            MessageType::GetAvailableVersions => "get-available-versions",
            MessageType::RegisterClient => "register-client",
            MessageType::UnregisterClient => "unregister-client",
            MessageType::GetStoreState => "get-store-state",
            MessageType::DispatchAction => "dispatch-action",
            MessageType::DispatchClientAction => "dispatch-client-action",
            MessageType::CommitMutation => "commit-mutation",
            MessageType::GetAvailableVersionsResponse => "get-available-versions-response",
            MessageType::RegisterClientResponse => "register-client-response",
            MessageType::UnregisterClientResponse => "unregister-client-response",
            MessageType::GetStoreStateResponse => "get-store-state-response",
            MessageType::DispatchActionResponse => "dispatch-action-response",
            MessageType::DispatchClientActionResponse => "dispatch-client-action-response",
            MessageType::InvalidRequestResponse => "invalid-request-response",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|kind| kind.as_str() == tag)
    }
}

impl Display for MessageType {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FormatResult {
        formatter.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterClientRequest {
    pub name: String,
    #[serde(default)]
    pub actions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_id: Option<WindowId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnregisterClientRequest {
    pub client_id: ClientId,
}

/// Reads a field that is present on the wire, keeping an explicit `null` as
/// `Some(Value::Null)`. An absent field is `None` through `#[serde(default)]`.
fn present_value<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

/// Shared by `dispatch-action` (client to server) and `dispatch-client-action`
/// (server to owning client). In the latter `client_id` names the addressee.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchActionRequest {
    pub client_id: ClientId,
    pub action: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "present_value"
    )]
    pub options: Option<Value>,
}

/// One mutation applied to a store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Commit {
    pub mutation: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "present_value"
    )]
    pub options: Option<Value>,
}

impl Commit {
    pub fn new(mutation: impl Into<String>, payload: Value, options: Option<Value>) -> Self {
        Self {
            mutation: mutation.into(),
            payload,
            options,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitMutation {
    pub mutation: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "present_value"
    )]
    pub options: Option<Value>,
    /// Client whose local execution produced this commit; that client skips it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_client_id: Option<ClientId>,
}

impl CommitMutation {
    pub fn from_commit(commit: Commit, source_client_id: Option<ClientId>) -> Self {
        Self {
            mutation: commit.mutation,
            payload: commit.payload,
            options: commit.options,
            source_client_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseStatus {
    pub responds_to: MessageId,
    pub successful: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
}

/// A response: the correlation/status header plus the result fields for its tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response<R> {
    #[serde(flatten)]
    pub status: ResponseStatus,
    #[serde(flatten)]
    pub result: R,
}

impl<R> Response<R> {
    pub fn ok(responds_to: MessageId, result: R) -> Self {
        Self {
            status: ResponseStatus {
                responds_to,
                successful: true,
                error: None,
            },
            result,
        }
    }

    pub fn failed(responds_to: MessageId, message: impl Into<String>) -> Self
    where
        R: Default,
    {
        Self {
            status: ResponseStatus {
                responds_to,
                successful: false,
                error: Some(ErrorInfo {
                    message: message.into(),
                }),
            },
            result: R::default(),
        }
    }

    /// `successful` with no error, used for outcomes like "nothing was removed".
    pub fn with_success(responds_to: MessageId, successful: bool, result: R) -> Self {
        Self {
            status: ResponseStatus {
                responds_to,
                successful,
                error: None,
            },
            result,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NoResult {}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VersionsResult {
    #[serde(default)]
    pub versions: Vec<ApiVersion>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<ClientId>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateResult {
    #[serde(default)]
    pub state: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReturnValueResult {
    #[serde(default)]
    pub return_value: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientActionResult {
    #[serde(default)]
    pub return_value: Value,
    #[serde(default)]
    pub commits: Vec<Commit>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnrecognizedMessage {
    pub type_name: String,
}

/// Builds the reply to a request whose type the receiver does not serve.
pub fn invalid_request(responds_to: MessageId, type_name: &str) -> Body {
    Body::InvalidRequestResponse(Response::failed(
        responds_to,
        format!("Invalid request type: {type_name}"),
    ))
}

/// Encodes a message as one JSON text frame.
///
/// # Errors
///
/// Returns [`IpcError::Encode`] for [`Body::Unrecognized`], which has no wire form.
pub fn encode(message: &Message) -> Result<String, IpcError> {
    serde_json::to_string(message)
        .map_err(|e| IpcError::encode(format!("Failed to encode {}: {e}", message.body.type_name())))
}

#[derive(Deserialize)]
struct Envelope {
    id: MessageId,
    #[serde(rename = "type")]
    type_name: String,
}

/// Decodes one JSON text frame.
///
/// A well-formed frame with an unknown `type` tag becomes [`Body::Unrecognized`].
///
/// # Errors
///
/// Returns [`IpcError::Decode`] when the frame is not a JSON object with `id` and
/// `type`, or when the fields do not match the shape its tag requires.
pub fn decode(frame: &str) -> Result<Message, IpcError> {
    let envelope: Envelope = serde_json::from_str(frame)
        .map_err(|e| IpcError::decode(format!("Malformed message frame: {e}")))?;

    if MessageType::from_tag(&envelope.type_name).is_none() {
        return Ok(Message {
            id: envelope.id,
            body: Body::Unrecognized(UnrecognizedMessage {
                type_name: envelope.type_name,
            }),
        });
    }

    serde_json::from_str(frame).map_err(|e| {
        IpcError::decode(format!(
            "Invalid '{}' message: {e}",
            envelope.type_name
        ))
    })
}
