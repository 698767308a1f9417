use common::ErrorLocation;

use std::io::Error as IoError;
use std::panic::Location;

use thiserror::Error as ThisError;

/// Errors raised by the transport, the message handler, and the client/server
/// request wrappers.
///
/// `Clone` because a single transport failure is fanned out to every pending
/// request and every inbox subscriber.
#[derive(Debug, Clone, ThisError)]
pub enum IpcError {
    #[error("Handshake Error: {message} {location}")]
    Handshake {
        message: String,
        location: ErrorLocation,
    },

    #[error("Send Error: {message} {location}")]
    Send {
        message: String,
        location: ErrorLocation,
    },

    #[error("Read Error: {message} {location}")]
    Read {
        message: String,
        location: ErrorLocation,
    },

    #[error("IO Error: {message} {location}")]
    Io {
        message: String,
        location: ErrorLocation,
    },

    #[error("Encode Error: {message} {location}")]
    Encode {
        message: String,
        location: ErrorLocation,
    },

    #[error("Decode Error: {message} {location}")]
    Decode {
        message: String,
        location: ErrorLocation,
    },

    /// The peer answered with `successful: false`; `message` is the peer's error text.
    #[error("Remote Error: {message} {location}")]
    Remote {
        message: String,
        location: ErrorLocation,
    },

    #[error("Client is not registered {location}")]
    NotRegistered { location: ErrorLocation },

    #[error("Unexpected Response: expected {expected}, got {actual} {location}")]
    UnexpectedResponse {
        expected: String,
        actual: String,
        location: ErrorLocation,
    },

    #[error("Request {request_id} timed out after {timeout_ms}ms {location}")]
    Timeout {
        request_id: String,
        timeout_ms: u64,
        location: ErrorLocation,
    },

    #[error("Channel Closed: {message} {location}")]
    Closed {
        message: String,
        location: ErrorLocation,
    },
}

impl IpcError {
    #[track_caller]
    pub fn send(message: impl Into<String>) -> Self {
        IpcError::Send {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn read(message: impl Into<String>) -> Self {
        IpcError::Read {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn encode(message: impl Into<String>) -> Self {
        IpcError::Encode {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn decode(message: impl Into<String>) -> Self {
        IpcError::Decode {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn remote(message: impl Into<String>) -> Self {
        IpcError::Remote {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn not_registered() -> Self {
        IpcError::NotRegistered {
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn unexpected_response(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        IpcError::UnexpectedResponse {
            expected: expected.into(),
            actual: actual.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn timeout(request_id: impl Into<String>, timeout_ms: u64) -> Self {
        IpcError::Timeout {
            request_id: request_id.into(),
            timeout_ms,
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn closed(message: impl Into<String>) -> Self {
        IpcError::Closed {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    /// The error text a peer sent back, if this error came from a failed response.
    pub fn remote_message(&self) -> Option<&str> {
        match self {
            IpcError::Remote { message, .. } => Some(message),
            _ => None,
        }
    }

    /// Text to relay to another participant: a peer's own text passes through
    /// unchanged, and no variant carries its source location.
    pub fn message(&self) -> String {
        match self {
            IpcError::Remote { message, .. } => message.clone(),
            IpcError::Handshake { message, .. } => format!("Handshake Error: {message}"),
            IpcError::Send { message, .. } => format!("Send Error: {message}"),
            IpcError::Read { message, .. } => format!("Read Error: {message}"),
            IpcError::Io { message, .. } => format!("IO Error: {message}"),
            IpcError::Encode { message, .. } => format!("Encode Error: {message}"),
            IpcError::Decode { message, .. } => format!("Decode Error: {message}"),
            IpcError::NotRegistered { .. } => String::from("Client is not registered"),
            IpcError::UnexpectedResponse {
                expected, actual, ..
            } => format!("Unexpected Response: expected {expected}, got {actual}"),
            IpcError::Timeout {
                request_id,
                timeout_ms,
                ..
            } => format!("Request {request_id} timed out after {timeout_ms}ms"),
            IpcError::Closed { message, .. } => format!("Channel Closed: {message}"),
        }
    }
}

impl From<IoError> for IpcError {
    #[track_caller]
    fn from(error: IoError) -> Self {
        IpcError::Io {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}
