//! Wire protocol of the agent RPC endpoint.
//!
//! `create_unit` is a call: the response carries the stored record.
//! The per-action methods are casts: the response only confirms the command
//! was queued.

use serde::{Deserialize, Serialize};
use unitplane_core::{RequestContext, RpcVersion, UnitId};

use crate::action::UnitAction;
use crate::types::CreateUnitRequest;

/// Method name for unit creation.
pub const CREATE_UNIT: &str = "create_unit";

/// Version served for each method.
pub const METHODS: &[(&str, RpcVersion)] = &[
    (CREATE_UNIT, RpcVersion::new(1, 0)),
    ("activate_unit", RpcVersion::new(1, 0)),
    ("deactivate_unit", RpcVersion::new(1, 0)),
    ("start_unit", RpcVersion::new(1, 1)),
    ("stop_unit", RpcVersion::new(1, 1)),
    ("destroy_unit", RpcVersion::new(1, 0)),
];

/// The cast method name for an action.
#[must_use]
pub const fn method_for(action: UnitAction) -> &'static str {
    match action {
        UnitAction::Activate => "activate_unit",
        UnitAction::Deactivate => "deactivate_unit",
        UnitAction::Start => "start_unit",
        UnitAction::Stop => "stop_unit",
        UnitAction::Destroy => "destroy_unit",
    }
}

/// The action a cast method name stands for.
#[must_use]
pub fn action_for(method: &str) -> Option<UnitAction> {
    UnitAction::ALL
        .into_iter()
        .find(|action| method_for(*action) == method)
}

/// The version tag callers send for `method`.
#[must_use]
pub fn version_of(method: &str) -> Option<RpcVersion> {
    METHODS
        .iter()
        .find(|(name, _)| *name == method)
        .map(|(_, version)| *version)
}

/// Arguments for `create_unit`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUnitArgs {
    /// The caller.
    pub context: RequestContext,
    /// The new unit's fields.
    pub request: CreateUnitRequest,
}

/// Arguments for the cast methods.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitArgs {
    /// The target unit.
    pub unit_id: UnitId,
}

/// Answer to a cast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Accepted {
    /// Always true; the command is queued.
    pub accepted: bool,
}
