//! Error types for the agent crate.

use thiserror::Error;
use unitplane_core::UnitId;
use unitplane_mediator::MediatorError;

use crate::action::UnitAction;

/// Errors that can occur in worker operations.
#[derive(Error, Debug)]
pub enum AgentError {
    /// The mediator rejected or failed an operation.
    #[error(transparent)]
    Mediator(#[from] MediatorError),

    /// The transitional work itself failed.
    #[error("{action} work failed for unit {unit_id}: {reason}")]
    WorkFailed {
        /// The unit being transitioned.
        unit_id: UnitId,
        /// The action being performed.
        action: UnitAction,
        /// What went wrong.
        reason: String,
    },

    /// The worker queue is full.
    #[error("worker queue is full")]
    QueueFull,

    /// The worker loop has stopped.
    #[error("worker queue is closed")]
    QueueClosed,

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl AgentError {
    /// Check if this error is retriable.
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        match self {
            Self::Mediator(e) => e.is_retriable(),
            Self::QueueFull => true,
            Self::WorkFailed { .. } | Self::QueueClosed | Self::Config(_) => false,
        }
    }

    /// Get the HTTP status code for this error.
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        match self {
            Self::Mediator(MediatorError::Store(unitplane_store::StoreError::NotFound)) => 404,
            Self::Mediator(MediatorError::Store(
                unitplane_store::StoreError::Conflict { .. }
                | unitplane_store::StoreError::ConditionFailed(_),
            )) => 409,
            Self::Config(_) => 400,
            Self::Mediator(_) | Self::QueueFull | Self::QueueClosed => 503,
            Self::WorkFailed { .. } => 500,
        }
    }
}

/// A specialized Result type for agent operations.
pub type Result<T> = std::result::Result<T, AgentError>;
