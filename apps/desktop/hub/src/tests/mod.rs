mod error;
mod logger;
mod store;
