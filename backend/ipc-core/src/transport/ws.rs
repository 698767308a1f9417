//! WebSocket hub for participants in separate processes.
//!
//! The main process binds the hub on a loopback address. Every connection is
//! attached to an internal [`LocalBus`] as its own peer, so a frame received
//! on one connection is written to every other connection and delivered to
//! the hub owner's channel.
//!
//! # Security
//!
//! - Binds to a loopback address only (validated by the config layer)
//! - Non-loopback connections are dropped before the WebSocket handshake

use crate::error::ipc::IpcError;
use crate::transport::{Channel, LocalBus, pipes};

use common::ErrorLocation;

use std::net::SocketAddr;
use std::panic::Location;

use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use tokio::net::{TcpListener, TcpStream};
use tokio::spawn as TokioSpawn;
use tokio::sync::watch;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{accept_async, connect_async};

/// Entry point for binding the main-process side of the transport.
pub struct WsHub;

impl WsHub {
    /// Binds the hub to `address` and returns the hub owner's channel.
    ///
    /// # Errors
    ///
    /// Returns [`IpcError::Io`] if the address cannot be bound (port in use,
    /// insufficient permissions).
    pub async fn bind(address: &str) -> Result<(Channel, HubHandle), IpcError> {
        let listener = TcpListener::bind(address).await?;
        let local_addr = listener.local_addr()?;
        let bus = LocalBus::new();
        let owner = bus.connect();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        info!("IPC hub listening on {local_addr}");

        TokioSpawn(accept_loop(listener, bus, shutdown_rx));

        Ok((
            owner,
            HubHandle {
                local_addr,
                shutdown: shutdown_tx,
            },
        ))
    }
}

/// Handle to a bound hub.
///
/// The hub runs while the handle is alive; dropping it has the same effect as
/// [`HubHandle::shutdown`].
#[derive(Debug)]
pub struct HubHandle {
    local_addr: SocketAddr,
    shutdown: watch::Sender<bool>,
}

impl HubHandle {
    /// Address the hub is bound to (useful when binding port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// WebSocket URL participants connect to.
    pub fn url(&self) -> String {
        format!("ws://{}", self.local_addr)
    }

    /// Stops accepting connections and closes every relayed connection.
    pub fn shutdown(&self) {
        if self.shutdown.send(true).is_err() {
            debug!("IPC hub already stopped");
        }
    }
}

async fn accept_loop(listener: TcpListener, bus: LocalBus, mut shutdown: watch::Receiver<bool>) {
    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, addr)) => {
                    info!("Participant connecting from {addr}");
                    let bus = bus.clone();
                    let shutdown = shutdown.clone();
                    TokioSpawn(async move {
                        if let Err(e) = relay_connection(stream, addr, bus, shutdown).await {
                            error!("Connection from {addr} failed: {e}");
                        }
                    });
                }
                Err(e) => {
                    error!("Failed to accept connection: {e}");
                    break;
                }
            },
            _ = shutdown.changed() => break,
        }
    }

    info!("IPC hub stopped accepting connections");
}

/// Bridges one WebSocket connection onto the bus.
///
/// The bus subscription is taken before the handshake completes, so a frame
/// published in reply to this participant's first request cannot be missed.
async fn relay_connection(
    stream: TcpStream,
    addr: SocketAddr,
    bus: LocalBus,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), IpcError> {
    // SECURITY: Reject non-loopback connections
    if !addr.ip().is_loopback() {
        warn!("Rejected non-loopback connection from {addr}");
        return Ok(());
    }

    let (peer, mut bus_rx) = bus.attach();

    let ws_stream = accept_async(stream).await.map_err(|e| IpcError::Handshake {
        message: format!("WebSocket handshake failed: {e}"),
        location: ErrorLocation::from(Location::caller()),
    })?;

    let (mut write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            inbound = read.next() => match inbound {
                Some(Ok(WsMessage::Text(text))) => bus.publish(peer, text.as_str().into()),
                Some(Ok(WsMessage::Binary(data))) => match String::from_utf8(data.to_vec()) {
                    Ok(text) => bus.publish(peer, text.into()),
                    Err(_) => warn!("Dropping non-UTF-8 binary frame from {addr}"),
                },
                Some(Ok(WsMessage::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    return Err(IpcError::read(format!("Error reading from {addr}: {e}")));
                }
            },
            outbound = bus_rx.recv() => match outbound {
                Some(text) => write
                    .send(WsMessage::Text(text.to_string().into()))
                    .await
                    .map_err(|e| IpcError::send(format!("Failed to relay frame to {addr}: {e}")))?,
                None => break,
            },
            _ = shutdown.changed() => break,
        }
    }

    info!("Participant {addr} disconnected");
    Ok(())
}

/// Connects a participant to a hub at `url` (for example `ws://127.0.0.1:19876`).
///
/// # Errors
///
/// Returns [`IpcError::Handshake`] if the connection or WebSocket upgrade fails.
pub async fn connect(url: &str) -> Result<Channel, IpcError> {
    let (ws_stream, _) = connect_async(url).await.map_err(|e| IpcError::Handshake {
        message: format!("Failed to connect to {url}: {e}"),
        location: ErrorLocation::from(Location::caller()),
    })?;

    info!("Connected to IPC hub at {url}");

    let (mut write, mut read) = ws_stream.split();
    let (sender, mut out_rx, in_tx, receiver) = pipes();

    TokioSpawn(async move {
        while let Some(text) = out_rx.recv().await {
            if let Err(e) = write.send(WsMessage::Text(text.into())).await {
                error!("Failed to send frame to hub: {e}");
                break;
            }
        }
        if let Err(e) = write.close().await {
            debug!("Closing hub connection: {e}");
        }
    });

    TokioSpawn(async move {
        while let Some(inbound) = read.next().await {
            let frame = match inbound {
                Ok(WsMessage::Text(text)) => Ok(text.as_str().to_owned()),
                Ok(WsMessage::Binary(data)) => String::from_utf8(data.to_vec())
                    .map_err(|e| IpcError::decode(format!("Non-UTF-8 frame from hub: {e}"))),
                Ok(WsMessage::Close(_)) => break,
                Ok(_) => continue,
                Err(e) => Err(IpcError::read(format!("Error reading from hub: {e}"))),
            };
            let terminal = frame.is_err();
            if in_tx.send(frame).is_err() || terminal {
                break;
            }
        }
        debug!("Hub connection reader stopped");
    });

    Ok(Channel::new(sender, receiver))
}
