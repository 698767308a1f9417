pub mod config;
pub mod ipc;
pub mod store;

pub use config::ConfigError;
pub use ipc::IpcError;
pub use store::StoreError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Ipc(#[from] ipc::IpcError),

    #[error(transparent)]
    Store(#[from] store::StoreError),

    #[error(transparent)]
    Config(#[from] config::ConfigError),
}
