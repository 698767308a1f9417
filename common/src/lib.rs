//! Shared primitives used by every crate in the workspace.
//!
//! Currently this is the error-location type that every error variant carries
//! so a failure can be traced back to the exact call site that produced it.

pub mod error;

pub use error::error_location::ErrorLocation;

#[cfg(test)]
mod tests;
