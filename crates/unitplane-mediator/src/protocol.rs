//! Wire protocol between `RemoteMediator` and the mediator server.
//!
//! Method names, their version tags, argument shapes, and the mapping between
//! storage errors and RPC errors live here so both ends agree on them.

use serde::{Deserialize, Serialize};
use unitplane_core::{RpcError, RpcErrorKind, RpcVersion, UnitId};
use unitplane_store::{
    ListFilter, NewUnit, ReadDeleted, StoreError, Unit, UnitValues, UpdateCondition,
};

use crate::error::MediatorError;

/// Method names.
pub mod method {
    /// List units.
    pub const LIST: &str = "list";
    /// Look up units by display name.
    pub const GET_BY_NAME: &str = "get_by_name";
    /// Look up a unit by id.
    pub const GET_BY_ID: &str = "get_by_id";
    /// Create a unit.
    pub const CREATE: &str = "create";
    /// Partially update a unit.
    pub const UPDATE: &str = "update";
    /// Compare-and-swap update.
    pub const UPDATE_IF: &str = "update_if";
    /// Soft-delete a unit.
    pub const DESTROY: &str = "destroy";
    /// Liveness probe.
    pub const PING: &str = "ping";
}

/// Version served for each method. Minors move independently per method.
pub const METHODS: &[(&str, RpcVersion)] = &[
    (method::LIST, RpcVersion::new(1, 1)),
    (method::GET_BY_NAME, RpcVersion::new(1, 0)),
    (method::GET_BY_ID, RpcVersion::new(1, 1)),
    (method::CREATE, RpcVersion::new(1, 0)),
    (method::UPDATE, RpcVersion::new(1, 2)),
    (method::UPDATE_IF, RpcVersion::new(1, 3)),
    (method::DESTROY, RpcVersion::new(1, 1)),
    (method::PING, RpcVersion::new(1, 0)),
];

/// Look up the version tag for a method.
///
/// # Errors
///
/// Returns `MediatorError::Protocol` for unknown methods.
pub fn version_of(name: &str) -> Result<RpcVersion, MediatorError> {
    METHODS
        .iter()
        .find(|(m, _)| *m == name)
        .map(|(_, v)| *v)
        .ok_or_else(|| MediatorError::Protocol(format!("unknown method: {name}")))
}

/// Arguments for `list`.
///
/// 1.0 callers send only `include_deleted`. Since 1.1 a full `filter` may be
/// sent instead, and it takes precedence.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListArgs {
    /// Include soft-deleted records.
    #[serde(default)]
    pub include_deleted: bool,
    /// Selection criteria.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<ListFilter>,
}

impl ListArgs {
    /// The filter these arguments select by.
    #[must_use]
    pub fn into_filter(self) -> ListFilter {
        self.filter.unwrap_or_else(|| {
            let view = if self.include_deleted {
                ReadDeleted::Yes
            } else {
                ReadDeleted::No
            };
            ListFilter::live().read_deleted(view)
        })
    }
}

impl From<&ListFilter> for ListArgs {
    fn from(filter: &ListFilter) -> Self {
        Self {
            include_deleted: filter.read_deleted != ReadDeleted::No,
            filter: Some(filter.clone()),
        }
    }
}

/// Arguments for `get_by_name`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NameArgs {
    /// Display name to match.
    pub name: String,
}

/// Arguments for `get_by_id` and `destroy`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdArgs {
    /// The unit.
    pub id: UnitId,
}

/// Arguments for `create`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateArgs {
    /// Fields for the new record.
    pub unit: NewUnit,
}

/// Arguments for `update`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateArgs {
    /// The unit.
    pub id: UnitId,
    /// Fields to write.
    pub values: UnitValues,
}

/// Arguments for `update_if`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateIfArgs {
    /// The unit.
    pub id: UnitId,
    /// Guard on the current record.
    pub condition: UpdateCondition,
    /// Fields to write when the guard holds.
    pub values: UnitValues,
}

#[derive(Debug, Serialize, Deserialize)]
struct ConflictDetail {
    field: String,
}

/// Encode a mediator error for the wire.
#[must_use]
pub fn encode_error(err: &MediatorError) -> RpcError {
    match err {
        MediatorError::Store(StoreError::NotFound) => {
            RpcError::new(RpcErrorKind::NotFound, err.to_string())
        }
        MediatorError::Store(StoreError::Conflict { field }) => {
            let error = RpcError::new(RpcErrorKind::Conflict, err.to_string());
            match serde_json::to_value(ConflictDetail {
                field: field.clone(),
            }) {
                Ok(detail) => error.with_detail(detail),
                Err(_) => error,
            }
        }
        MediatorError::Store(StoreError::ConditionFailed(current)) => {
            let error = RpcError::new(RpcErrorKind::ConditionFailed, err.to_string());
            match serde_json::to_value(current.as_ref()) {
                Ok(detail) => error.with_detail(detail),
                Err(_) => error,
            }
        }
        MediatorError::VersionMismatch(_) => {
            RpcError::new(RpcErrorKind::VersionMismatch, err.to_string())
        }
        MediatorError::Store(_)
        | MediatorError::Unreachable(_)
        | MediatorError::Protocol(_)
        | MediatorError::Config(_) => RpcError::new(RpcErrorKind::Internal, err.to_string()),
    }
}

/// Decode a wire error into the error the local backend would have raised.
#[must_use]
pub fn decode_error(err: RpcError) -> MediatorError {
    match err.kind {
        RpcErrorKind::NotFound => MediatorError::Store(StoreError::NotFound),
        RpcErrorKind::Conflict => {
            let field = err
                .detail
                .and_then(|d| serde_json::from_value::<ConflictDetail>(d).ok())
                .map_or_else(|| "unknown".to_string(), |d| d.field);
            MediatorError::Store(StoreError::Conflict { field })
        }
        RpcErrorKind::ConditionFailed => {
            match err.detail.map(serde_json::from_value::<Unit>) {
                Some(Ok(current)) => {
                    MediatorError::Store(StoreError::ConditionFailed(Box::new(current)))
                }
                _ => MediatorError::Protocol(format!(
                    "condition_failed without current record: {}",
                    err.message
                )),
            }
        }
        RpcErrorKind::VersionMismatch => MediatorError::VersionMismatch(err.message),
        RpcErrorKind::BadRequest => MediatorError::Protocol(err.message),
        RpcErrorKind::Internal => MediatorError::Store(StoreError::Database(err.message)),
    }
}
