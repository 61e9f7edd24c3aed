//! Common error types for unitplane.
//!
//! This module provides shared error types that are used across multiple crates.

use thiserror::Error;

use crate::rpc::RpcVersion;

/// A result type using `CoreError`.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Core errors that can occur throughout the unitplane system.
#[derive(Debug, Error)]
pub enum CoreError {
    /// An invalid identifier was provided.
    #[error("invalid identifier: {0}")]
    InvalidId(#[from] crate::ids::IdError),

    /// A version tag could not be parsed.
    #[error("invalid version tag: {0}")]
    InvalidVersion(String),

    /// The server does not serve the requested method version.
    #[error("method {method} requested version {requested}, server provides {served}")]
    VersionMismatch {
        /// The RPC method name.
        method: String,
        /// The version the caller asked for.
        requested: RpcVersion,
        /// The version the server implements.
        served: RpcVersion,
    },

    /// RPC arguments or payload could not be (de)serialized.
    #[error("payload error: {0}")]
    Payload(#[from] serde_json::Error),
}
