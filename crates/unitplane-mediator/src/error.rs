//! Error types for the mediator.
//!
//! Storage errors pass through unchanged in `MediatorError::Store`, whether
//! they were raised in-process or decoded from a remote response.

use thiserror::Error;
use unitplane_store::{StoreError, Unit};

/// A result type using `MediatorError`.
pub type Result<T> = std::result::Result<T, MediatorError>;

/// Errors that can occur in mediator operations.
#[derive(Debug, Error)]
pub enum MediatorError {
    /// The storage gateway rejected the operation.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The remote mediator could not be reached in time.
    #[error("mediator unreachable: {0}")]
    Unreachable(String),

    /// The remote mediator cannot serve the requested method version.
    #[error("mediator version mismatch: {0}")]
    VersionMismatch(String),

    /// The remote mediator answered with something that is not a valid response.
    #[error("mediator protocol error: {0}")]
    Protocol(String),

    /// The mediator configuration is invalid.
    #[error("mediator configuration error: {0}")]
    Config(String),
}

impl MediatorError {
    /// Returns true if the record does not exist under the active read view.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::Store(StoreError::NotFound))
    }

    /// Returns the current record if a compare-and-swap update lost.
    #[must_use]
    pub fn condition_failed(&self) -> Option<&Unit> {
        match self {
            Self::Store(StoreError::ConditionFailed(current)) => Some(current),
            _ => None,
        }
    }

    /// Returns true if this error might be resolved by retrying.
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        matches!(self, Self::Unreachable(_))
    }
}
