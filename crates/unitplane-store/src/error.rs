//! Error types for the storage layer.

use thiserror::Error;

use crate::types::Unit;

/// A result type using `StoreError`.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The requested record was not found under the active read view.
    #[error("record not found")]
    NotFound,

    /// A unique field collided with an existing record.
    #[error("conflict on field {field}")]
    Conflict {
        /// The colliding field name.
        field: String,
    },

    /// A compare-and-swap condition did not hold. Carries the current record.
    #[error("update condition not met")]
    ConditionFailed(Box<Unit>),

    /// A database error occurred.
    #[error("database error: {0}")]
    Database(String),

    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),
}
