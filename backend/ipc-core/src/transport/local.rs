//! In-process broadcast bus.
//!
//! Every attached peer owns an unbounded queue. Publishing appends the frame
//! to every queue except the publisher's own, under one lock, so all peers see
//! frames in the same order and a slow reader never loses any.

use crate::transport::{Channel, pipes};

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::debug;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PeerId(u64);

/// Queue a peer reads frames from; dropping it detaches the peer.
pub(crate) type BusReceiver = mpsc::UnboundedReceiver<Arc<str>>;

#[derive(Default)]
struct Peers {
    next: u64,
    queues: Vec<(PeerId, mpsc::UnboundedSender<Arc<str>>)>,
}

/// Broadcast bus connecting participants that share one tokio runtime.
///
/// Also used by [`WsHub`](crate::transport::WsHub) as the relay between its
/// WebSocket connections.
#[derive(Clone, Default)]
pub struct LocalBus {
    peers: Arc<Mutex<Peers>>,
}

impl LocalBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches a new participant.
    ///
    /// The participant is subscribed before this returns, so it sees every
    /// frame published afterwards.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn connect(&self) -> Channel {
        let (peer, mut bus_rx) = self.attach();
        let bus = self.clone();
        let (sender, mut out_rx, in_tx, receiver) = pipes();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    outbound = out_rx.recv() => match outbound {
                        Some(text) => bus.publish(peer, text.into()),
                        None => break,
                    },
                    inbound = bus_rx.recv() => match inbound {
                        Some(text) => {
                            if in_tx.send(Ok(text.to_string())).is_err() {
                                break;
                            }
                        }
                        None => break,
                    },
                }
            }
            debug!("Bus peer {} detached", peer.0);
        });

        Channel::new(sender, receiver)
    }

    /// Number of participants currently attached.
    pub fn peer_count(&self) -> usize {
        let mut peers = self.lock();
        peers.queues.retain(|(_, queue)| !queue.is_closed());
        peers.queues.len()
    }

    pub(crate) fn attach(&self) -> (PeerId, BusReceiver) {
        let (queue, bus_rx) = mpsc::unbounded_channel();
        let mut peers = self.lock();
        peers.next += 1;
        let peer = PeerId(peers.next);
        peers.queues.push((peer, queue));
        (peer, bus_rx)
    }

    pub(crate) fn publish(&self, origin: PeerId, text: Arc<str>) {
        let mut peers = self.lock();
        peers
            .queues
            .retain(|(id, queue)| *id == origin || queue.send(Arc::clone(&text)).is_ok());
        if peers.queues.len() <= 1 {
            debug!("No other bus peers attached, frame from peer {} dropped", origin.0);
        }
    }

    fn lock(&self) -> MutexGuard<'_, Peers> {
        self.peers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
