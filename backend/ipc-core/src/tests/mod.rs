mod config;
mod message;
mod registry;
mod store;
mod transport;
