//! Request and command types handled by the worker.

use serde::{Deserialize, Serialize};
use unitplane_core::UnitId;

use crate::action::UnitAction;

/// Caller-supplied fields for a new unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateUnitRequest {
    /// Human-readable name.
    pub display_name: String,
    /// Opaque vendor string.
    #[serde(default)]
    pub vendor_tag: String,
}

impl CreateUnitRequest {
    /// Maximum display name length in characters.
    pub const MAX_NAME_LEN: usize = 255;

    /// Create a request.
    #[must_use]
    pub fn new(display_name: impl Into<String>, vendor_tag: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            vendor_tag: vendor_tag.into(),
        }
    }

    /// Check the display name.
    ///
    /// # Errors
    ///
    /// Returns a description of the problem if the name is empty, too long,
    /// or contains control characters.
    pub fn validate(&self) -> Result<(), String> {
        let name = self.display_name.trim();
        if name.is_empty() {
            return Err("display name must not be empty".to_string());
        }
        if name.chars().count() > Self::MAX_NAME_LEN {
            return Err(format!(
                "display name must be at most {} characters",
                Self::MAX_NAME_LEN
            ));
        }
        if self.display_name.chars().any(char::is_control) {
            return Err("display name must not contain control characters".to_string());
        }
        Ok(())
    }
}

/// A one-way instruction for the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitCommand {
    /// What to do.
    pub action: UnitAction,
    /// The unit to do it to.
    pub unit_id: UnitId,
}

impl UnitCommand {
    /// Create a command.
    #[must_use]
    pub const fn new(action: UnitAction, unit_id: UnitId) -> Self {
        Self { action, unit_id }
    }
}
