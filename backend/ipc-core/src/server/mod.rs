//! The server: owns the canonical store and answers client requests.
//!
//! Requests are taken from the inbox one at a time, in arrival order. Every
//! request gets exactly one response. The only request that is not answered
//! inline is a forwarded action, which waits on the owning client in its own
//! task so the loop keeps serving everyone else.

mod registry;

pub use registry::{ClientRecord, ClientRegistry};

use crate::config::{RequestConfig, ServerOptions};
use crate::error::ipc::IpcError;
use crate::handler::{Inbox, MessageHandler};
use crate::message::{
    ApiVersion, Body, ClientActionResult, ClientId, CommitMutation, DispatchActionRequest,
    Message, MessageId, MessageType, NoResult, RegisterClientRequest, RegisterResult, Response,
    ReturnValueResult, StateResult, UnregisterClientRequest, VersionsResult, invalid_request,
};
use crate::store::StateStore;
use crate::transport::Channel;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{debug, error, info, warn};
use tokio::task::JoinHandle;

struct ServerInner<S> {
    handler: MessageHandler,
    store: Arc<S>,
    registry: Mutex<ClientRegistry>,
    options: ServerOptions,
}

/// `Clone` and cheap to share; all clones serve the same registry and store.
pub struct Server<S> {
    inner: Arc<ServerInner<S>>,
}

impl<S> Clone for Server<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: StateStore> Server<S> {
    pub fn new(handler: MessageHandler, store: Arc<S>, options: ServerOptions) -> Self {
        Self {
            inner: Arc::new(ServerInner {
                handler,
                store,
                registry: Mutex::new(ClientRegistry::new()),
                options,
            }),
        }
    }

    /// Initializes a handler on `channel` and spawns the request loop.
    pub fn start(
        channel: Channel,
        store: Arc<S>,
        options: ServerOptions,
        config: &RequestConfig,
    ) -> ServerHandle<S> {
        let (handler, inbox) = MessageHandler::initialize(channel, config);
        let server = Self::new(handler, store, options);
        info!(
            "IPC server started (forward_client_actions={})",
            server.inner.options.forward_client_actions
        );
        let task = tokio::spawn(server.clone().run(inbox));
        ServerHandle { server, task }
    }

    /// Serves requests from `inbox` until the transport fails.
    ///
    /// # Errors
    ///
    /// Returns the transport error that stopped the message listener.
    pub async fn run(self, mut inbox: Inbox) -> Result<(), IpcError> {
        loop {
            match inbox.recv().await {
                Some(Ok(message)) => self.handle_message(message).await,
                Some(Err(fault)) => {
                    error!("IPC server stopping: {fault}");
                    return Err(fault);
                }
                None => {
                    info!("IPC server inbox closed");
                    return Ok(());
                }
            }
        }
    }

    /// Performs the work a single inbound message asks for.
    pub async fn handle_message(&self, message: Message) {
        let Message { id, body } = message;
        match body {
            Body::GetAvailableVersions => self.reply(Body::GetAvailableVersionsResponse(
                Response::ok(
                    id,
                    VersionsResult {
                        versions: ApiVersion::ALL.to_vec(),
                    },
                ),
            )),
            Body::RegisterClient(request) => self.register_client(id, request),
            Body::UnregisterClient(request) => self.unregister_client(id, request),
            Body::GetStoreState => self.reply(Body::GetStoreStateResponse(Response::ok(
                id,
                StateResult {
                    state: self.inner.store.snapshot(),
                },
            ))),
            Body::DispatchAction(request) => self.dispatch_action(id, request).await,

            // Only the server sends these; a client sending one is not a request we serve.
            Body::DispatchClientAction(_) => {
                self.reject(id, MessageType::DispatchClientAction.as_str());
            }
            Body::CommitMutation(_) => self.reject(id, MessageType::CommitMutation.as_str()),
            Body::Unrecognized(unrecognized) => self.reject(id, &unrecognized.type_name),

            // Responses are resolved by the handler's pending table.
            Body::GetAvailableVersionsResponse(_)
            | Body::RegisterClientResponse(_)
            | Body::UnregisterClientResponse(_)
            | Body::GetStoreStateResponse(_)
            | Body::DispatchActionResponse(_)
            | Body::DispatchClientActionResponse(_)
            | Body::InvalidRequestResponse(_) => {}
        }
    }

    /// Snapshot of the registered clients, in registration order.
    pub fn clients(&self) -> Vec<ClientRecord> {
        self.registry().clients().to_vec()
    }

    pub fn action_owner(&self, action: &str) -> Option<ClientId> {
        self.registry().action_owner(action)
    }

    pub fn store(&self) -> &Arc<S> {
        &self.inner.store
    }

    pub fn handler(&self) -> &MessageHandler {
        &self.inner.handler
    }

    fn registry(&self) -> MutexGuard<'_, ClientRegistry> {
        self.inner
            .registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn register_client(&self, id: MessageId, request: RegisterClientRequest) {
        let record = self.registry().register(request);
        self.reply(Body::RegisterClientResponse(Response::ok(
            id,
            RegisterResult {
                client_id: Some(record.id),
            },
        )));
    }

    fn unregister_client(&self, id: MessageId, request: UnregisterClientRequest) {
        let removed = self.registry().unregister(request.client_id);
        let response = match removed {
            Some(_) => Response::ok(id, NoResult {}),
            None => {
                warn!("Unregister for unknown client {}", request.client_id);
                Response::failed(
                    id,
                    format!("Client {} is not registered", request.client_id),
                )
            }
        };
        self.reply(Body::UnregisterClientResponse(response));
    }

    async fn dispatch_action(&self, id: MessageId, request: DispatchActionRequest) {
        if self.inner.options.forward_client_actions {
            let owner = self.action_owner(&request.action);
            if let Some(owner) = owner.filter(|owner| *owner != request.client_id) {
                debug!("Forwarding '{}' to owning client {owner}", request.action);
                let server = self.clone();
                tokio::spawn(async move { server.forward_action(id, request, owner).await });
                return;
            }
        }

        self.execute_action(id, request).await;
    }

    /// Runs the action against the canonical store. Its commits are pushed
    /// before the response so the requester's replica is current when its
    /// dispatch resolves.
    async fn execute_action(&self, id: MessageId, request: DispatchActionRequest) {
        let outcome = self
            .inner
            .store
            .dispatch(&request.action, request.payload, request.options)
            .await;

        let response = match outcome {
            Ok(dispatched) => {
                for commit in dispatched.commits {
                    self.push(CommitMutation::from_commit(commit, None));
                }
                Response::ok(
                    id,
                    ReturnValueResult {
                        return_value: dispatched.return_value,
                    },
                )
            }
            Err(e) => {
                warn!("Action '{}' failed: {e}", request.action);
                Response::failed(id, e.message())
            }
        };
        self.reply(Body::DispatchActionResponse(response));
    }

    async fn forward_action(&self, id: MessageId, request: DispatchActionRequest, owner: ClientId) {
        let action = request.action.clone();
        let forwarded = Body::DispatchClientAction(DispatchActionRequest {
            client_id: owner,
            ..request
        });

        let outcome = self
            .inner
            .handler
            .send_request_await_response(forwarded, MessageType::DispatchClientActionResponse)
            .await
            .and_then(|response| match response.body {
                Body::DispatchClientActionResponse(response) => Ok(response.result),
                other => Err(IpcError::unexpected_response(
                    MessageType::DispatchClientActionResponse.as_str(),
                    other.type_name(),
                )),
            });

        let response = match outcome {
            Ok(ClientActionResult {
                return_value,
                commits,
            }) => {
                for commit in commits {
                    if let Err(e) = self.inner.store.commit(
                        &commit.mutation,
                        commit.payload.clone(),
                        commit.options.clone(),
                    ) {
                        error!("Forwarded commit '{}' from {owner} failed: {e}", commit.mutation);
                        continue;
                    }
                    self.push(CommitMutation::from_commit(commit, Some(owner)));
                }
                Response::ok(id, ReturnValueResult { return_value })
            }
            Err(e) => {
                warn!("Forwarded action '{action}' failed: {e}");
                Response::failed(id, e.message())
            }
        };
        self.reply(Body::DispatchActionResponse(response));
    }

    fn reject(&self, id: MessageId, type_name: &str) {
        warn!("Rejecting {type_name} request {id}");
        self.reply(invalid_request(id, type_name));
    }

    fn push(&self, commit: CommitMutation) {
        self.reply(Body::CommitMutation(commit));
    }

    fn reply(&self, body: Body) {
        if let Err(e) = self.inner.handler.publish(body) {
            error!("Failed to publish server message: {e}");
        }
    }
}

/// Running server. Dropping the handle leaves the server running; call
/// [`ServerHandle::shutdown`] to stop it.
pub struct ServerHandle<S> {
    server: Server<S>,
    task: JoinHandle<Result<(), IpcError>>,
}

impl<S: StateStore> ServerHandle<S> {
    pub fn server(&self) -> &Server<S> {
        &self.server
    }

    /// Stops the request loop.
    pub fn shutdown(&self) {
        self.task.abort();
        info!("IPC server shut down");
    }

    /// Waits for the request loop to end.
    ///
    /// # Errors
    ///
    /// Returns the transport error that stopped the loop, or [`IpcError::Closed`]
    /// if it was aborted.
    pub async fn join(self) -> Result<(), IpcError> {
        match self.task.await {
            Ok(result) => result,
            Err(e) => Err(IpcError::closed(format!("IPC server task ended: {e}"))),
        }
    }
}
