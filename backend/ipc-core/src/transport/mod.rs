//! Frame transport shared by every participant.
//!
//! A [`Channel`] is one participant's attachment to the broadcast topology: frames
//! written to its [`FrameSender`] reach every *other* participant, and its
//! [`FrameReceiver`] yields every frame the other participants publish, in the
//! order they were published. Delivery is fire-and-forget, and every queue is
//! unbounded, so a participant that falls behind is never skipped ahead.
//!
//! Two attachments exist:
//!
//! - [`LocalBus`] for participants living in the same process
//! - [`WsHub`] / [`connect`] for participants in separate processes: the main
//!   process binds the hub, every UI process connects to it over a loopback
//!   WebSocket, and the hub relays frames between all of them.
//!
//! Dropping either half of a channel disconnects the participant.

mod local;
mod ws;

pub use local::LocalBus;
pub use ws::{HubHandle, WsHub, connect};

use crate::error::ipc::IpcError;

use tokio::sync::mpsc;

/// A participant's duplex attachment to the bus.
pub struct Channel {
    sender: FrameSender,
    receiver: FrameReceiver,
}

impl Channel {
    pub(crate) fn new(sender: FrameSender, receiver: FrameReceiver) -> Self {
        Self { sender, receiver }
    }

    pub fn split(self) -> (FrameSender, FrameReceiver) {
        (self.sender, self.receiver)
    }
}

/// Publishing half of a [`Channel`].
#[derive(Debug, Clone)]
pub struct FrameSender {
    tx: mpsc::UnboundedSender<String>,
}

impl FrameSender {
    /// Publishes one text frame.
    ///
    /// Succeeds as long as the participant is attached, whether or not anyone is
    /// listening.
    ///
    /// # Errors
    ///
    /// Returns [`IpcError::Send`] once the underlying connection has shut down.
    pub fn send(&self, frame: String) -> Result<(), IpcError> {
        self.tx
            .send(frame)
            .map_err(|_| IpcError::send("Transport is closed"))
    }
}

/// Receiving half of a [`Channel`].
#[derive(Debug)]
pub struct FrameReceiver {
    rx: mpsc::UnboundedReceiver<Result<String, IpcError>>,
}

impl FrameReceiver {
    /// Next inbound frame; `None` once the connection is gone.
    ///
    /// An `Err` item is terminal: the transport yields nothing after it.
    pub async fn recv(&mut self) -> Option<Result<String, IpcError>> {
        self.rx.recv().await
    }
}

type Pipes = (
    FrameSender,
    mpsc::UnboundedReceiver<String>,
    mpsc::UnboundedSender<Result<String, IpcError>>,
    FrameReceiver,
);

/// Creates the two queues behind a [`Channel`] and returns the ends the
/// transport task pumps: outbound frames to drain, inbound frames to fill.
fn pipes() -> Pipes {
    let (out_tx, out_rx) = mpsc::unbounded_channel();
    let (in_tx, in_rx) = mpsc::unbounded_channel();
    (
        FrameSender { tx: out_tx },
        out_rx,
        in_tx,
        FrameReceiver { rx: in_rx },
    )
}
