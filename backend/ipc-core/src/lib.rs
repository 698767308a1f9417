//! Cross-process state synchronization.
//!
//! One server process owns the canonical store. Client processes register
//! with it, dispatch actions to it, and keep replicas that follow the commits
//! it pushes. Everything travels as JSON messages over a shared broadcast
//! transport, with requests and responses correlated by message id.

pub mod client;
pub mod config;
pub mod error;
pub mod handler;
pub mod message;
pub mod server;
pub mod store;
pub mod transport;

#[cfg(test)]
mod tests;
