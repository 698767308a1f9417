//! Registered clients and the action ownership table.

use crate::message::{ApiVersion, ClientId, RegisterClientRequest, WindowId};

use std::collections::{BTreeSet, HashMap};

use log::{info, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct ClientRecord {
    pub id: ClientId,
    pub name: String,
    pub api_version: ApiVersion,
    /// Actions this client executes locally.
    pub actions: BTreeSet<String>,
    pub window_id: Option<WindowId>,
}

/// Clients in registration order, plus which client owns each action.
///
/// When two clients declare the same action, the most recent registration
/// owns it. Removing a client rebuilds the table from the remaining clients
/// so an action falls back to an earlier owner.
#[derive(Debug, Default)]
pub struct ClientRegistry {
    clients: Vec<ClientRecord>,
    action_table: HashMap<String, ClientId>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a new client with a fresh id.
    pub fn register(&mut self, request: RegisterClientRequest) -> ClientRecord {
        let record = ClientRecord {
            id: ClientId::generate(),
            name: request.name,
            api_version: ApiVersion::CURRENT,
            actions: request.actions.into_iter().collect(),
            window_id: request.window_id,
        };

        for action in &record.actions {
            if let Some(previous) = self.action_table.insert(action.clone(), record.id) {
                warn!(
                    "Action '{action}' was owned by client {previous}, now owned by {} ({})",
                    record.id, record.name
                );
            }
        }

        info!(
            "Registered client {} ({}) with {} actions",
            record.id,
            record.name,
            record.actions.len()
        );
        self.clients.push(record.clone());
        record
    }

    /// Removes a client, returning its record if it was registered.
    pub fn unregister(&mut self, id: ClientId) -> Option<ClientRecord> {
        let index = self.clients.iter().position(|client| client.id == id)?;
        let record = self.clients.remove(index);
        self.rebuild_action_table();
        info!("Unregistered client {} ({})", record.id, record.name);
        Some(record)
    }

    pub fn action_owner(&self, action: &str) -> Option<ClientId> {
        self.action_table.get(action).copied()
    }

    pub fn get(&self, id: ClientId) -> Option<&ClientRecord> {
        self.clients.iter().find(|client| client.id == id)
    }

    pub fn clients(&self) -> &[ClientRecord] {
        &self.clients
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    fn rebuild_action_table(&mut self) {
        self.action_table.clear();
        for client in &self.clients {
            for action in &client.actions {
                self.action_table.insert(action.clone(), client.id);
            }
        }
    }
}
