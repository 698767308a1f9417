use common::ErrorLocation;

use std::panic::Location;

use thiserror::Error as ThisError;

/// Errors raised by a store while running an action or applying a mutation.
#[derive(Debug, Clone, ThisError)]
pub enum StoreError {
    #[error("Unknown Action: {action} {location}")]
    UnknownAction {
        action: String,
        location: ErrorLocation,
    },

    #[error("Unknown Mutation: {mutation} {location}")]
    UnknownMutation {
        mutation: String,
        location: ErrorLocation,
    },

    #[error("Action '{action}' failed: {message} {location}")]
    Action {
        action: String,
        message: String,
        location: ErrorLocation,
    },

    #[error("Mutation '{mutation}' failed: {message} {location}")]
    Mutation {
        mutation: String,
        message: String,
        location: ErrorLocation,
    },

    #[error("Store has been shut down {location}")]
    ShutDown { location: ErrorLocation },
}

impl StoreError {
    #[track_caller]
    pub fn unknown_action(action: impl Into<String>) -> Self {
        StoreError::UnknownAction {
            action: action.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn unknown_mutation(mutation: impl Into<String>) -> Self {
        StoreError::UnknownMutation {
            mutation: mutation.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn action(action: impl Into<String>, message: impl Into<String>) -> Self {
        StoreError::Action {
            action: action.into(),
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn mutation(mutation: impl Into<String>, message: impl Into<String>) -> Self {
        StoreError::Mutation {
            mutation: mutation.into(),
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn shut_down() -> Self {
        StoreError::ShutDown {
            location: ErrorLocation::from(Location::caller()),
        }
    }

    /// The error text without its source location, for `error.message` on the wire.
    pub fn message(&self) -> String {
        match self {
            StoreError::UnknownAction { action, .. } => format!("Unknown Action: {action}"),
            StoreError::UnknownMutation { mutation, .. } => format!("Unknown Mutation: {mutation}"),
            StoreError::Action {
                action, message, ..
            } => format!("Action '{action}' failed: {message}"),
            StoreError::Mutation {
                mutation, message, ..
            } => format!("Mutation '{mutation}' failed: {message}"),
            StoreError::ShutDown { .. } => String::from("Store has been shut down"),
        }
    }
}
