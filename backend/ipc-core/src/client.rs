//! A client process's side of the protocol.
//!
//! The client keeps a replica of the server's store. It never changes the
//! replica on its own: commits arrive as `commit-mutation` pushes, and a full
//! snapshot can be pulled with [`Client::sync_store_state`]. The one exception
//! is an action the client owns, which the server may forward for local
//! execution; the commits it makes are reported back and the echoed push is
//! skipped.

use crate::config::RequestConfig;
use crate::error::ipc::IpcError;
use crate::handler::{Inbox, MessageHandler};
use crate::message::{
    ApiVersion, Body, ClientActionResult, ClientId, CommitMutation, DispatchActionRequest,
    Message, MessageId, MessageType, RegisterClientRequest, Response, UnregisterClientRequest,
    WindowId,
};
use crate::store::StateStore;
use crate::transport::Channel;

use std::sync::{Arc, PoisonError, RwLock};

use log::{debug, error, info, warn};
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Supplies the identity of the window the client runs in.
pub trait WindowIdentity: Send + Sync {
    fn window_id(&self) -> Option<WindowId>;
}

impl WindowIdentity for WindowId {
    fn window_id(&self) -> Option<WindowId> {
        Some(*self)
    }
}

#[derive(Clone)]
pub struct ClientOptions {
    pub name: String,
    /// Actions this client executes locally when the server forwards them.
    pub actions: Vec<String>,
    pub identity: Option<Arc<dyn WindowIdentity>>,
}

impl ClientOptions {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            actions: Vec::new(),
            identity: None,
        }
    }

    pub fn with_actions<I, A>(mut self, actions: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<String>,
    {
        self.actions = actions.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_identity(mut self, identity: impl WindowIdentity + 'static) -> Self {
        self.identity = Some(Arc::new(identity));
        self
    }
}

struct ClientInner<S> {
    handler: MessageHandler,
    store: Arc<S>,
    options: ClientOptions,
    /// Serializes register/unregister.
    registration: Mutex<()>,
    client_id: RwLock<Option<ClientId>>,
}

pub struct Client<S> {
    inner: Arc<ClientInner<S>>,
}

impl<S> Clone for Client<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: StateStore> Client<S> {
    pub fn new(handler: MessageHandler, store: Arc<S>, options: ClientOptions) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                handler,
                store,
                options,
                registration: Mutex::new(()),
                client_id: RwLock::new(None),
            }),
        }
    }

    /// Initializes a handler on `channel` and spawns the loop that applies
    /// server pushes. The client is not registered yet.
    pub fn start(
        channel: Channel,
        store: Arc<S>,
        options: ClientOptions,
        config: &RequestConfig,
    ) -> (Self, JoinHandle<Result<(), IpcError>>) {
        let (handler, inbox) = MessageHandler::initialize(channel, config);
        let client = Self::new(handler, store, options);
        let task = tokio::spawn(client.clone().listen(inbox));
        (client, task)
    }

    /// Feeds every inbound message to [`Client::handle_incoming_message`].
    ///
    /// # Errors
    ///
    /// Returns the transport error that stopped the message listener.
    pub async fn listen(self, mut inbox: Inbox) -> Result<(), IpcError> {
        loop {
            match inbox.recv().await {
                Some(Ok(message)) => self.handle_incoming_message(message).await,
                Some(Err(fault)) => {
                    error!("Client '{}' stopped listening: {fault}", self.inner.options.name);
                    return Err(fault);
                }
                None => return Ok(()),
            }
        }
    }

    pub fn client_id(&self) -> Option<ClientId> {
        *self
            .inner
            .client_id
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_registered(&self) -> bool {
        self.client_id().is_some()
    }

    pub fn store(&self) -> &Arc<S> {
        &self.inner.store
    }

    pub fn handler(&self) -> &MessageHandler {
        &self.inner.handler
    }

    /// Registers with the server.
    ///
    /// Returns `false` without sending anything if already registered.
    ///
    /// # Errors
    ///
    /// Returns [`IpcError::Remote`] with the server's error if it refuses.
    pub async fn register(&self) -> Result<bool, IpcError> {
        let _registration = self.inner.registration.lock().await;
        if self.is_registered() {
            return Ok(false);
        }

        let options = &self.inner.options;
        let request = Body::RegisterClient(RegisterClientRequest {
            name: options.name.clone(),
            actions: options.actions.clone(),
            window_id: options
                .identity
                .as_ref()
                .and_then(|identity| identity.window_id()),
        });

        let response = self
            .inner
            .handler
            .send_request_await_response(request, MessageType::RegisterClientResponse)
            .await?;
        let client_id = match response.body {
            Body::RegisterClientResponse(Response { result, .. }) => result
                .client_id
                .ok_or_else(|| IpcError::unexpected_response("clientId", "none"))?,
            other => {
                return Err(IpcError::unexpected_response(
                    MessageType::RegisterClientResponse.as_str(),
                    other.type_name(),
                ));
            }
        };

        self.set_client_id(Some(client_id));
        info!("Client '{}' registered as {client_id}", options.name);
        Ok(true)
    }

    /// Unregisters from the server.
    ///
    /// Returns `false` without sending anything if not registered.
    ///
    /// # Errors
    ///
    /// Returns [`IpcError::Remote`] if the server does not know this client;
    /// the local id is kept in that case.
    pub async fn unregister(&self) -> Result<bool, IpcError> {
        let _registration = self.inner.registration.lock().await;
        let Some(client_id) = self.client_id() else {
            return Ok(false);
        };

        self.inner
            .handler
            .send_request_await_response(
                Body::UnregisterClient(UnregisterClientRequest { client_id }),
                MessageType::UnregisterClientResponse,
            )
            .await?;

        self.set_client_id(None);
        info!("Client '{}' unregistered", self.inner.options.name);
        Ok(true)
    }

    pub async fn get_available_versions(&self) -> Result<Vec<ApiVersion>, IpcError> {
        let response = self
            .inner
            .handler
            .send_request_await_response(
                Body::GetAvailableVersions,
                MessageType::GetAvailableVersionsResponse,
            )
            .await?;
        match response.body {
            Body::GetAvailableVersionsResponse(response) => Ok(response.result.versions),
            other => Err(IpcError::unexpected_response(
                MessageType::GetAvailableVersionsResponse.as_str(),
                other.type_name(),
            )),
        }
    }

    /// Fetches the canonical state snapshot.
    pub async fn get_store_state(&self) -> Result<Value, IpcError> {
        let response = self
            .inner
            .handler
            .send_request_await_response(Body::GetStoreState, MessageType::GetStoreStateResponse)
            .await?;
        match response.body {
            Body::GetStoreStateResponse(response) => Ok(response.result.state),
            other => Err(IpcError::unexpected_response(
                MessageType::GetStoreStateResponse.as_str(),
                other.type_name(),
            )),
        }
    }

    /// Replaces the local replica with the canonical snapshot.
    pub async fn sync_store_state(&self) -> Result<(), IpcError> {
        let state = self.get_store_state().await?;
        self.inner.store.replace_state(state);
        debug!("Client '{}' replica synced", self.inner.options.name);
        Ok(())
    }

    /// Asks the server to run `action` and returns the action's return value.
    ///
    /// # Errors
    ///
    /// - [`IpcError::NotRegistered`] - before [`Client::register`]; nothing is sent
    /// - [`IpcError::Remote`] - the action failed on the server
    pub async fn dispatch_action(
        &self,
        action: &str,
        payload: Value,
        options: Option<Value>,
    ) -> Result<Value, IpcError> {
        let client_id = self.client_id().ok_or_else(IpcError::not_registered)?;

        let request = Body::DispatchAction(DispatchActionRequest {
            client_id,
            action: action.to_owned(),
            payload,
            options,
        });
        let response = self
            .inner
            .handler
            .send_request_await_response(request, MessageType::DispatchActionResponse)
            .await?;
        match response.body {
            Body::DispatchActionResponse(response) => Ok(response.result.return_value),
            other => Err(IpcError::unexpected_response(
                MessageType::DispatchActionResponse.as_str(),
                other.type_name(),
            )),
        }
    }

    /// Reacts to a server push. Every other message is ignored here.
    pub async fn handle_incoming_message(&self, message: Message) {
        let Message { id, body } = message;
        match body {
            Body::CommitMutation(commit) => self.apply_commit(commit),
            Body::DispatchClientAction(request) => {
                if Some(request.client_id) == self.client_id() {
                    self.execute_forwarded_action(id, request).await;
                }
            }

            Body::GetAvailableVersions
            | Body::RegisterClient(_)
            | Body::UnregisterClient(_)
            | Body::GetStoreState
            | Body::DispatchAction(_)
            | Body::GetAvailableVersionsResponse(_)
            | Body::RegisterClientResponse(_)
            | Body::UnregisterClientResponse(_)
            | Body::GetStoreStateResponse(_)
            | Body::DispatchActionResponse(_)
            | Body::DispatchClientActionResponse(_)
            | Body::InvalidRequestResponse(_)
            | Body::Unrecognized(_) => {}
        }
    }

    fn apply_commit(&self, commit: CommitMutation) {
        if commit.source_client_id.is_some() && commit.source_client_id == self.client_id() {
            debug!("Skipping own commit '{}'", commit.mutation);
            return;
        }
        if let Err(e) = self
            .inner
            .store
            .commit(&commit.mutation, commit.payload, commit.options)
        {
            error!(
                "Client '{}' failed to apply '{}': {e}",
                self.inner.options.name, commit.mutation
            );
        }
    }

    async fn execute_forwarded_action(&self, id: MessageId, request: DispatchActionRequest) {
        debug!("Executing forwarded action '{}'", request.action);
        let outcome = self
            .inner
            .store
            .dispatch(&request.action, request.payload, request.options)
            .await;

        let response = match outcome {
            Ok(dispatched) => Response::ok(
                id,
                ClientActionResult {
                    return_value: dispatched.return_value,
                    commits: dispatched.commits,
                },
            ),
            Err(e) => {
                warn!("Forwarded action '{}' failed: {e}", request.action);
                Response::failed(id, e.message())
            }
        };

        if let Err(e) = self
            .inner
            .handler
            .publish(Body::DispatchClientActionResponse(response))
        {
            error!("Failed to answer forwarded action: {e}");
        }
    }

    fn set_client_id(&self, client_id: Option<ClientId>) {
        *self
            .inner
            .client_id
            .write()
            .unwrap_or_else(PoisonError::into_inner) = client_id;
    }
}
