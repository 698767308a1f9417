//! State-store capability consumed by the client and the server.
//!
//! The server owns the canonical store; each client holds a replica that is
//! only changed through commits pushed by the server (or, for forwarded
//! actions, through the actions the client itself owns).

mod module_store;
mod registry;

pub use module_store::{ActionContext, ActionHandler, ModuleStore, MutationHandler, StoreBuilder};
pub use registry::Registry;

use crate::error::store::StoreError;
use crate::message::Commit;

use std::future::Future;

use serde_json::Value;

/// Outcome of a dispatched action.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dispatched {
    pub return_value: Value,
    /// Mutations the action applied, in order.
    pub commits: Vec<Commit>,
}

pub trait StateStore: Send + Sync + 'static {
    /// Runs the named action.
    fn dispatch(
        &self,
        action: &str,
        payload: Value,
        options: Option<Value>,
    ) -> impl Future<Output = Result<Dispatched, StoreError>> + Send;

    /// Applies the named mutation directly.
    fn commit(&self, mutation: &str, payload: Value, options: Option<Value>)
    -> Result<(), StoreError>;

    /// Replaces the whole state with `snapshot`.
    fn replace_state(&self, snapshot: Value);

    /// Copy of the current state.
    fn snapshot(&self) -> Value;
}
