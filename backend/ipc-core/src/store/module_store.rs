//! JSON-state store assembled from named mutations and actions.
//!
//! ```
//! use ipc_core::store::{ModuleStore, StateStore};
//! use serde_json::{Value, json};
//!
//! let store = ModuleStore::builder(json!({ "gameInfo": { "name": null } }))
//!     .mutation("game-info/setName", |state, payload, _| {
//!         state["gameInfo"]["name"] = payload;
//!         Ok(())
//!     })
//!     .action("game-info/setGameName", |context, payload, _| {
//!         context.commit("game-info/setName", payload, None)?;
//!         Ok(Value::Bool(true))
//!     })
//!     .build();
//!
//! store.commit("game-info/setName", json!("Celeste"), None).unwrap();
//! assert_eq!(store.snapshot()["gameInfo"]["name"], "Celeste");
//! ```

use crate::error::store::StoreError;
use crate::message::Commit;
use crate::store::{Dispatched, Registry, StateStore};

use std::future::{Future, ready};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use log::{debug, info, warn};
use serde_json::Value;

pub type MutationHandler =
    dyn Fn(&mut Value, Value, Option<Value>) -> Result<(), StoreError> + Send + Sync;

pub type ActionHandler =
    dyn Fn(&mut ActionContext<'_>, Value, Option<Value>) -> Result<Value, StoreError> + Send + Sync;

/// What an action sees while it runs: the state, and a way to commit.
pub struct ActionContext<'a> {
    state: &'a mut Value,
    mutations: &'a Registry<MutationHandler>,
    commits: Vec<Commit>,
}

impl ActionContext<'_> {
    pub fn state(&self) -> &Value {
        self.state
    }

    /// Applies a mutation and records it as part of the action's outcome.
    pub fn commit(
        &mut self,
        mutation: &str,
        payload: Value,
        options: Option<Value>,
    ) -> Result<(), StoreError> {
        let handler = self
            .mutations
            .get(mutation)
            .ok_or_else(|| StoreError::unknown_mutation(mutation))?;
        handler(&mut *self.state, payload.clone(), options.clone())?;
        self.commits.push(Commit::new(mutation, payload, options));
        Ok(())
    }
}

/// Registration phase of a [`ModuleStore`].
pub struct StoreBuilder {
    state: Value,
    mutations: Vec<(String, Arc<MutationHandler>)>,
    actions: Vec<(String, Arc<ActionHandler>)>,
}

impl StoreBuilder {
    pub fn mutation<F>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&mut Value, Value, Option<Value>) -> Result<(), StoreError> + Send + Sync + 'static,
    {
        let handler: Arc<MutationHandler> = Arc::new(handler);
        self.mutations.push((name.into(), handler));
        self
    }

    pub fn action<F>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&mut ActionContext<'_>, Value, Option<Value>) -> Result<Value, StoreError>
            + Send
            + Sync
            + 'static,
    {
        let handler: Arc<ActionHandler> = Arc::new(handler);
        self.actions.push((name.into(), handler));
        self
    }

    pub fn build(self) -> ModuleStore {
        let mutations = Registry::new();
        for (name, handler) in self.mutations {
            if mutations.register(name.clone(), handler).is_some() {
                warn!("Mutation '{name}' registered twice, keeping the last one");
            }
        }

        let actions = Registry::new();
        for (name, handler) in self.actions {
            if actions.register(name.clone(), handler).is_some() {
                warn!("Action '{name}' registered twice, keeping the last one");
            }
        }

        info!(
            "Store initialized with {} mutations and {} actions",
            mutations.len(),
            actions.len()
        );

        ModuleStore {
            state: RwLock::new(self.state),
            mutations,
            actions,
            running: AtomicBool::new(true),
        }
    }
}

/// [`StateStore`] over a `serde_json::Value` state tree.
///
/// An action that fails leaves the state exactly as it was before it ran,
/// including any commits it made before failing.
pub struct ModuleStore {
    state: RwLock<Value>,
    mutations: Registry<MutationHandler>,
    actions: Registry<ActionHandler>,
    running: AtomicBool,
}

impl ModuleStore {
    pub fn builder(initial_state: Value) -> StoreBuilder {
        StoreBuilder {
            state: initial_state,
            mutations: Vec::new(),
            actions: Vec::new(),
        }
    }

    pub fn action_names(&self) -> Vec<String> {
        self.actions.ids()
    }

    pub fn mutation_names(&self) -> Vec<String> {
        self.mutations.ids()
    }

    /// Tears down the registries. Dispatches and commits fail afterwards.
    pub fn shutdown(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            self.actions.clear();
            self.mutations.clear();
            info!("Store shut down");
        }
    }

    fn ensure_running(&self) -> Result<(), StoreError> {
        if self.running.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::shut_down())
        }
    }

    fn run_action(
        &self,
        action: &str,
        payload: Value,
        options: Option<Value>,
    ) -> Result<Dispatched, StoreError> {
        self.ensure_running()?;
        let handler = self
            .actions
            .get(action)
            .ok_or_else(|| StoreError::unknown_action(action))?;

        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let before = state.clone();
        let mut context = ActionContext {
            state: &mut *state,
            mutations: &self.mutations,
            commits: Vec::new(),
        };

        match handler(&mut context, payload, options) {
            Ok(return_value) => {
                let commits = context.commits;
                debug!("Action '{action}' applied {} commits", commits.len());
                Ok(Dispatched {
                    return_value,
                    commits,
                })
            }
            Err(e) => {
                *state = before;
                Err(e)
            }
        }
    }
}

impl StateStore for ModuleStore {
    fn dispatch(
        &self,
        action: &str,
        payload: Value,
        options: Option<Value>,
    ) -> impl Future<Output = Result<Dispatched, StoreError>> + Send {
        ready(self.run_action(action, payload, options))
    }

    fn commit(
        &self,
        mutation: &str,
        payload: Value,
        options: Option<Value>,
    ) -> Result<(), StoreError> {
        self.ensure_running()?;
        let handler = self
            .mutations
            .get(mutation)
            .ok_or_else(|| StoreError::unknown_mutation(mutation))?;
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        handler(&mut *state, payload, options)
    }

    fn replace_state(&self, snapshot: Value) {
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = snapshot;
    }

    fn snapshot(&self) -> Value {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
