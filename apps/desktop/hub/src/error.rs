use common::ErrorLocation;

use ipc_core::error::CoreError;
use ipc_core::error::config::ConfigError;
use ipc_core::error::ipc::IpcError;

use std::panic::Location;

use thiserror::Error;

/// Errors that stop the main process.
#[derive(Debug, Error)]
pub enum HubError {
    /// Error from this app (directories, logging, signals)
    #[error("Hub Error: {message} {location}")]
    Hub {
        message: String,
        location: ErrorLocation,
    },

    /// Error from ipc-core (transport, config)
    #[error(transparent)]
    Core(#[from] CoreError),
}

impl HubError {
    #[track_caller]
    pub fn hub(message: impl Into<String>) -> Self {
        HubError::Hub {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<IpcError> for HubError {
    fn from(error: IpcError) -> Self {
        HubError::Core(CoreError::from(error))
    }
}

impl From<ConfigError> for HubError {
    fn from(error: ConfigError) -> Self {
        HubError::Core(CoreError::from(error))
    }
}
