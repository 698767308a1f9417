//! The main process: binds the hub and serves the canonical store.

use crate::error::HubError;
use crate::store::canonical_store;

use ipc_core::config::IpcConfig;
use ipc_core::server::{Server, ServerHandle};
use ipc_core::store::ModuleStore;
use ipc_core::transport::{HubHandle, WsHub};

use std::sync::Arc;

use log::info;

/// A running hub with its server.
pub struct App {
    hub: HubHandle,
    server: ServerHandle<ModuleStore>,
}

impl App {
    /// Binds the hub at the configured address and starts the server on it.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Core`] if the config is invalid or the address cannot be bound.
    pub async fn start(config: &IpcConfig) -> Result<Self, HubError> {
        config.validate()?;

        let (channel, hub) = WsHub::bind(&config.transport.address()).await?;

        let server = Server::start(
            channel,
            Arc::new(canonical_store()),
            config.server.clone(),
            &config.requests,
        );

        info!("Hub serving on {}", hub.url());
        Ok(Self { hub, server })
    }

    /// URL clients connect to.
    pub fn url(&self) -> String {
        self.hub.url()
    }

    pub fn store(&self) -> &Arc<ModuleStore> {
        self.server.server().store()
    }

    /// Stops accepting clients, stops the server, and tears down the store.
    pub fn shutdown(self) {
        self.hub.shutdown();
        self.server.shutdown();
        self.store().shutdown();
        info!("Hub stopped");
    }
}
