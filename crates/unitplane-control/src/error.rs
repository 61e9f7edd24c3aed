//! Error types for the lifecycle client.
//!
//! Mediator errors keep their kind when they cross into `ControlError`:
//! not-found, conflict and unreachable get their own variants, everything
//! else is carried unchanged in `ControlError::Mediator`.

use thiserror::Error;
use unitplane_agent::UnitAction;
use unitplane_core::{HostId, UnitId};
use unitplane_mediator::MediatorError;
use unitplane_store::StoreError;

/// A result type using `ControlError`.
pub type Result<T> = std::result::Result<T, ControlError>;

/// Errors that can occur in lifecycle client operations.
#[derive(Debug, Error)]
pub enum ControlError {
    /// The requested unit was not found.
    #[error("unit not found: {0}")]
    UnitNotFound(UnitId),

    /// The unit's current state does not allow the operation.
    #[error("unit {unit_id} has {attribute} {value}, which does not allow {operation}")]
    InvalidState {
        /// The unit being operated on.
        unit_id: UnitId,
        /// Either `state` or `task_state`.
        attribute: &'static str,
        /// The observed value.
        value: String,
        /// The rejected operation.
        operation: UnitAction,
    },

    /// A unique field already exists in storage.
    #[error("conflict on field {field}")]
    Conflict {
        /// The conflicting field.
        field: String,
    },

    /// The mediator could not be reached in time.
    #[error("backend unreachable: {0}")]
    BackendUnreachable(String),

    /// The command could not be delivered to the unit's worker.
    #[error("dispatch to {host} failed: {reason}")]
    DispatchFailed {
        /// The worker host.
        host: HostId,
        /// What went wrong.
        reason: String,
    },

    /// The command was sent but the worker's answer never arrived, so it may
    /// or may not be running.
    #[error("dispatch to {host} unconfirmed: {reason}")]
    DispatchUnconfirmed {
        /// The worker host.
        host: HostId,
        /// What went wrong.
        reason: String,
    },

    /// The caller's request is malformed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The control configuration is invalid.
    #[error("control configuration error: {0}")]
    Config(String),

    /// Any other mediator error, unchanged.
    #[error(transparent)]
    Mediator(MediatorError),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ControlError {
    /// Translate a mediator error raised while operating on `unit_id`.
    #[must_use]
    pub fn for_unit(unit_id: &UnitId, err: MediatorError) -> Self {
        if err.is_not_found() {
            Self::UnitNotFound(*unit_id)
        } else {
            err.into()
        }
    }

    /// Returns the appropriate HTTP status code for this error.
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        match self {
            Self::UnitNotFound(_) | Self::Mediator(MediatorError::Store(StoreError::NotFound)) => {
                404
            }
            Self::InvalidState { .. } | Self::Conflict { .. } => 409,
            Self::InvalidRequest(_) => 400,
            Self::BackendUnreachable(_) | Self::DispatchFailed { .. } => 503,
            Self::DispatchUnconfirmed { .. } => 504,
            Self::Config(_) | Self::Mediator(_) | Self::Internal(_) => 500,
        }
    }

    /// Returns false only when a dispatched command may have reached its
    /// worker. A claim taken for the command may be released otherwise.
    #[must_use]
    pub const fn is_undelivered(&self) -> bool {
        !matches!(self, Self::DispatchUnconfirmed { .. })
    }

    /// Returns true if this error might be resolved by retrying.
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        matches!(
            self,
            Self::BackendUnreachable(_) | Self::DispatchFailed { .. }
        )
    }
}

impl From<MediatorError> for ControlError {
    fn from(err: MediatorError) -> Self {
        match err {
            MediatorError::Store(StoreError::Conflict { field }) => Self::Conflict { field },
            MediatorError::Unreachable(reason) => Self::BackendUnreachable(reason),
            other => Self::Mediator(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_status_codes() {
        let unit_id = UnitId::generate();
        let host = HostId::new("agent-1").unwrap();

        assert_eq!(ControlError::UnitNotFound(unit_id).http_status_code(), 404);
        assert_eq!(
            ControlError::InvalidState {
                unit_id,
                attribute: "state",
                value: "ready".to_string(),
                operation: UnitAction::Stop,
            }
            .http_status_code(),
            409
        );
        assert_eq!(
            ControlError::Conflict {
                field: "id".to_string()
            }
            .http_status_code(),
            409
        );
        assert_eq!(
            ControlError::BackendUnreachable("timeout".to_string()).http_status_code(),
            503
        );
        assert_eq!(
            ControlError::DispatchFailed {
                host: host.clone(),
                reason: "refused".to_string()
            }
            .http_status_code(),
            503
        );
        assert_eq!(
            ControlError::DispatchUnconfirmed {
                host,
                reason: "timed out".to_string()
            }
            .http_status_code(),
            504
        );
        assert_eq!(
            ControlError::Mediator(MediatorError::Store(StoreError::Database("io".into())))
                .http_status_code(),
            500
        );
    }

    #[test]
    fn mediator_errors_keep_their_kind() {
        let unit_id = UnitId::generate();

        assert!(matches!(
            ControlError::for_unit(&unit_id, MediatorError::Store(StoreError::NotFound)),
            ControlError::UnitNotFound(id) if id == unit_id
        ));
        assert!(matches!(
            ControlError::from(MediatorError::Store(StoreError::Conflict {
                field: "id".to_string()
            })),
            ControlError::Conflict { field } if field == "id"
        ));

        let unreachable = ControlError::from(MediatorError::Unreachable("timeout".into()));
        assert!(unreachable.is_retriable());
        assert!(matches!(unreachable, ControlError::BackendUnreachable(_)));

        assert!(matches!(
            ControlError::from(MediatorError::VersionMismatch("update_if".into())),
            ControlError::Mediator(MediatorError::VersionMismatch(_))
        ));
    }

    #[test]
    fn only_unconfirmed_dispatch_may_have_been_delivered() {
        let host = HostId::new("agent-1").unwrap();

        let refused = ControlError::DispatchFailed {
            host: host.clone(),
            reason: "connection refused".to_string(),
        };
        assert!(refused.is_undelivered());
        assert!(refused.is_retriable());

        let timed_out = ControlError::DispatchUnconfirmed {
            host,
            reason: "timed out".to_string(),
        };
        assert!(!timed_out.is_undelivered());
        assert!(!timed_out.is_retriable());
    }
}
