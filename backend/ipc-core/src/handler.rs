//! Message handler shared by the client and the server.
//!
//! The handler owns one [`Channel`]. Its receive loop decodes every inbound
//! frame, completes the pending request the frame answers (if any), and then
//! publishes the message to every [`Inbox`] subscriber.
//!
//! # Correlation
//!
//! A request is entered into the pending table *before* it is published. The
//! entry names the response type it waits for and holds a oneshot completion.
//! It leaves the table exactly once, on whichever happens first:
//!
//! - a message of the expected type with `respondsTo == request.id` arrives
//! - the configured timeout fires
//! - the transport fails (every pending entry is failed with that error)
//! - the awaiting future is dropped
//!
//! Responses are matched by id, never by arrival order, so any number of
//! requests may be in flight at once.

use crate::config::RequestConfig;
use crate::error::ipc::IpcError;
use crate::message::{Body, Message, MessageId, MessageType, decode, encode};
use crate::transport::{Channel, FrameReceiver, FrameSender};

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::sync::{mpsc, oneshot};

/// Item of the inbound sequence. An `Err` is terminal: the listener has stopped.
pub type Inbound = Result<Message, IpcError>;

/// Subscription to the inbound sequence. Unbounded: a slow subscriber falls
/// behind but never loses a message.
pub type Inbox = mpsc::UnboundedReceiver<Inbound>;

struct PendingRequest {
    expected: MessageType,
    completion: oneshot::Sender<Result<Message, IpcError>>,
}

#[derive(Default)]
struct PendingTable {
    entries: HashMap<MessageId, PendingRequest>,
    subscribers: Vec<mpsc::UnboundedSender<Inbound>>,
    /// Set once the receive loop has stopped; new requests fail with it.
    closed: Option<IpcError>,
}

impl PendingTable {
    fn subscribe(&mut self) -> Inbox {
        let (subscriber, inbox) = mpsc::unbounded_channel();
        match &self.closed {
            Some(fault) => {
                let _ = subscriber.send(Err(fault.clone()));
            }
            None => self.subscribers.push(subscriber),
        }
        inbox
    }

    /// Delivers `item` to every live subscriber, forgetting the ones that hung up.
    fn notify(&mut self, item: &Inbound) {
        self.subscribers.retain(|subscriber| subscriber.send(item.clone()).is_ok());
    }
}

fn lock(pending: &Mutex<PendingTable>) -> MutexGuard<'_, PendingTable> {
    pending.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Removes a pending entry when the awaiting future finishes or is dropped.
struct PendingGuard<'a> {
    pending: &'a Mutex<PendingTable>,
    id: MessageId,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        lock(self.pending).entries.remove(&self.id);
    }
}

/// Publishes messages and correlates requests with their responses.
///
/// `Clone` and cheap to share; all clones use the same channel and pending table.
#[derive(Clone)]
pub struct MessageHandler {
    sender: FrameSender,
    pending: Arc<Mutex<PendingTable>>,
    request_timeout: Option<Duration>,
}

impl MessageHandler {
    /// Starts the receive loop for `channel`.
    ///
    /// The returned [`Inbox`] is subscribed before the loop starts, so it
    /// observes every inbound message.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn initialize(channel: Channel, config: &RequestConfig) -> (Self, Inbox) {
        let (sender, receiver) = channel.split();
        let mut table = PendingTable::default();
        let inbox = table.subscribe();

        let handler = Self {
            sender,
            pending: Arc::new(Mutex::new(table)),
            request_timeout: config.timeout(),
        };

        tokio::spawn(receive_loop(receiver, Arc::clone(&handler.pending)));

        (handler, inbox)
    }

    /// Adds a subscriber to the inbound sequence. It sees messages received from now on.
    ///
    /// Subscribing after the listener stopped yields the terminal `Err` at once.
    pub fn subscribe(&self) -> Inbox {
        lock(&self.pending).subscribe()
    }

    /// Encodes and publishes `message`. Fire-and-forget.
    ///
    /// # Errors
    ///
    /// Returns [`IpcError::Encode`] or [`IpcError::Send`].
    pub fn send_message(&self, message: &Message) -> Result<(), IpcError> {
        let frame = encode(message)?;
        debug!("Sending {} {}", message.body.type_name(), message.id);
        self.sender.send(frame)
    }

    /// Wraps `body` in a new message, publishes it, and returns its id.
    pub fn publish(&self, body: Body) -> Result<MessageId, IpcError> {
        let message = Message::new(body);
        self.send_message(&message)?;
        Ok(message.id)
    }

    /// Publishes `body` as a request and waits for the response of type `expected`.
    ///
    /// # Errors
    ///
    /// - [`IpcError::Remote`] - the response has `successful: false`
    /// - [`IpcError::Timeout`] - a timeout is configured and elapsed
    /// - the transport error that stopped the listener, if it stops first
    pub async fn send_request_await_response(
        &self,
        body: Body,
        expected: MessageType,
    ) -> Result<Message, IpcError> {
        let request = Message::new(body);
        let (completion, response_rx) = oneshot::channel();

        {
            let mut table = lock(&self.pending);
            if let Some(fault) = &table.closed {
                return Err(fault.clone());
            }
            table.entries.insert(
                request.id,
                PendingRequest {
                    expected,
                    completion,
                },
            );
        }
        let _guard = PendingGuard {
            pending: &self.pending,
            id: request.id,
        };

        self.send_message(&request)?;

        let outcome = match self.request_timeout {
            Some(timeout) => tokio::time::timeout(timeout, response_rx)
                .await
                .map_err(|_| {
                    warn!("{} {} timed out", request.body.type_name(), request.id);
                    IpcError::timeout(
                        request.id.to_string(),
                        u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                    )
                })?,
            None => response_rx.await,
        };

        let response = outcome
            .map_err(|_| IpcError::closed("Listener dropped the pending request"))??;

        match response.body.response_status() {
            Some(status) if !status.successful => {
                let message = status
                    .error
                    .as_ref()
                    .map(|error| error.message.clone())
                    .unwrap_or_else(|| format!("{} reported failure", response.body.type_name()));
                Err(IpcError::remote(message))
            }
            _ => Ok(response),
        }
    }

    /// Number of requests still waiting for a response.
    pub fn pending_requests(&self) -> usize {
        lock(&self.pending).entries.len()
    }

    /// True once the receive loop has stopped.
    pub fn is_closed(&self) -> bool {
        lock(&self.pending).closed.is_some()
    }
}

/// Decodes frames until the transport fails or closes.
///
/// Always ends by publishing one terminal `Err` to subscribers.
async fn receive_loop(mut receiver: FrameReceiver, pending: Arc<Mutex<PendingTable>>) {
    let fault = loop {
        let frame = match receiver.recv().await {
            Some(Ok(frame)) => frame,
            Some(Err(e)) => break e,
            None => break IpcError::closed("Transport closed"),
        };

        let message = match decode(&frame) {
            Ok(message) => message,
            Err(e) => break e,
        };

        debug!("Received {} {}", message.body.type_name(), message.id);
        let mut table = lock(&pending);
        resolve_pending(&mut table, &message);
        table.notify(&Ok(message));
    };

    match &fault {
        IpcError::Closed { .. } => info!("Message listener stopped: {fault}"),
        _ => error!("Message listener failed: {fault}"),
    }

    let mut table = lock(&pending);
    fail_pending(&mut table, &fault);
    table.notify(&Err(fault));
    table.subscribers.clear();
}

fn resolve_pending(table: &mut PendingTable, message: &Message) {
    let Some(status) = message.body.response_status() else {
        return;
    };
    let Some(message_type) = message.message_type() else {
        return;
    };

    match table.entries.remove(&status.responds_to) {
        Some(entry) if entry.expected == message_type => {
            if entry.completion.send(Ok(message.clone())).is_err() {
                debug!("Response {} arrived after its caller gave up", message.id);
            }
        }
        Some(entry) => {
            warn!(
                "Ignoring {} for request {}: waiting for {}",
                message_type, status.responds_to, entry.expected
            );
            table.entries.insert(status.responds_to, entry);
        }
        None => {}
    }
}

fn fail_pending(table: &mut PendingTable, fault: &IpcError) {
    table.closed = Some(fault.clone());
    for (id, entry) in table.entries.drain() {
        debug!("Failing pending request {id}");
        let _ = entry.completion.send(Err(fault.clone()));
    }
}
