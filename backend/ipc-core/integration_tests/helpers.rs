//! Test helpers for client/server integration tests.
//!
//! - A fixture store with the game-info and counter modules
//! - Starting a server and clients on one in-process bus
//! - A raw observer that records every frame on the bus

use ipc_core::client::{Client, ClientOptions};
use ipc_core::config::{RequestConfig, ServerOptions};
use ipc_core::error::store::StoreError;
use ipc_core::message::{Message, decode};
use ipc_core::server::{Server, ServerHandle};
use ipc_core::store::ModuleStore;
use ipc_core::transport::{Channel, FrameReceiver, FrameSender, LocalBus};

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};

pub const WAIT: Duration = Duration::from_secs(2);

/// Quiet period after which a raw observer concludes nothing was sent.
pub const QUIET: Duration = Duration::from_millis(150);

/// Store with a game-info module and a counter module.
pub fn fixture_store() -> Arc<ModuleStore> {
    Arc::new(
        ModuleStore::builder(json!({ "gameInfo": { "name": null }, "count": 0 }))
            .mutation("game-info/setName", |state, payload, _| {
                state["gameInfo"]["name"] = payload;
                Ok(())
            })
            .mutation("counter/add", |state, payload, _| {
                let amount = payload
                    .as_i64()
                    .ok_or_else(|| StoreError::mutation("counter/add", "not an integer"))?;
                let current = state["count"].as_i64().unwrap_or(0);
                state["count"] = json!(current + amount);
                Ok(())
            })
            .action("game-info/setGameName", |context, payload, _| {
                if !payload.is_string() {
                    return Err(StoreError::action(
                        "game-info/setGameName",
                        "Game name must be a string",
                    ));
                }
                context.commit("game-info/setName", payload, None)?;
                Ok(Value::Bool(true))
            })
            .action("counter/increment", |context, _, _| {
                context.commit("counter/add", json!(1), None)?;
                Ok(context.state()["count"].clone())
            })
            .build(),
    )
}

pub fn start_server(bus: &LocalBus, options: ServerOptions) -> ServerHandle<ModuleStore> {
    Server::start(
        bus.connect(),
        fixture_store(),
        options,
        &RequestConfig::default(),
    )
}

pub fn start_client(channel: Channel, options: ClientOptions) -> Client<ModuleStore> {
    let (client, _listener) = Client::start(
        channel,
        fixture_store(),
        options,
        &RequestConfig::default(),
    );
    client
}

/// Polls `condition` until it holds or [`WAIT`] elapses.
pub async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + WAIT;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

/// A bus participant that only watches (and occasionally writes raw frames).
pub struct Observer {
    pub sender: FrameSender,
    receiver: FrameReceiver,
}

impl Observer {
    pub fn attach(bus: &LocalBus) -> Self {
        let (sender, receiver) = bus.connect().split();
        Self { sender, receiver }
    }

    /// Next frame, or `None` if the bus stays quiet for [`QUIET`].
    pub async fn next_within(&mut self, quiet: Duration) -> Option<Message> {
        match tokio::time::timeout(quiet, self.receiver.recv()).await {
            Ok(Some(Ok(frame))) => Some(decode(&frame).expect("observer decodes frame")),
            Ok(Some(Err(e))) => panic!("observer transport error: {e}"),
            Ok(None) | Err(_) => None,
        }
    }

    pub async fn next(&mut self) -> Message {
        self.next_within(WAIT)
            .await
            .expect("observer timed out waiting for a frame")
    }

    pub async fn assert_quiet(&mut self) {
        if let Some(message) = self.next_within(QUIET).await {
            panic!("expected no traffic, saw {}", message.body.type_name());
        }
    }
}
