//! Precondition guard for unit actions.
//!
//! Each action declares the `state` and `task_state` values it accepts
//! (see `UnitAction::precondition`). The guard checks `state` first, then
//! `task_state`, and names the first attribute that fails.
//!
//! ```text
//!   action       state ∈                  task_state ∈
//!   ──────────   ──────────────────────   ─────────────────────────────────────
//!   activate     ready                    none
//!   deactivate   active, working          none
//!   start        active                   none
//!   stop         working                  none
//!   destroy      ready, active, working   none, deactivating, starting, stopping
//! ```

use unitplane_agent::UnitAction;
use unitplane_store::{Unit, UpdateCondition};

use crate::error::{ControlError, Result};

/// Check that `unit` may receive `action`.
///
/// # Errors
///
/// Returns `ControlError::InvalidState` naming the attribute, its observed
/// value and the action when the precondition does not hold.
pub fn check_preconditions(unit: &Unit, action: UnitAction) -> Result<()> {
    let precondition = action.precondition();

    if !precondition.allows_state(unit.state) {
        return Err(ControlError::InvalidState {
            unit_id: unit.id,
            attribute: "state",
            value: unit.state.to_string(),
            operation: action,
        });
    }

    if !precondition.allows_task_state(unit.task_state) {
        return Err(ControlError::InvalidState {
            unit_id: unit.id,
            attribute: "task_state",
            value: unit
                .task_state
                .map_or_else(|| "none".to_string(), |t| t.to_string()),
            operation: action,
        });
    }

    Ok(())
}

/// The compare-and-swap condition that claims `unit` for `action`.
///
/// Mirrors the precondition so a claim only succeeds while the guard would
/// still pass.
#[must_use]
pub fn claim_condition(action: UnitAction) -> UpdateCondition {
    let precondition = action.precondition();
    UpdateCondition::default()
        .states(precondition.states)
        .task_states(precondition.task_states)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use unitplane_core::{HostId, UnitId};
    use unitplane_store::{Owner, TaskState, UnitState};

    fn unit(state: UnitState, task_state: Option<TaskState>) -> Unit {
        let now = Utc::now();
        Unit {
            id: UnitId::generate(),
            display_name: "unit-1".to_string(),
            owner: Owner {
                user_id: "alice".to_string(),
                project_id: "proj".to_string(),
            },
            vendor_tag: "acme".to_string(),
            state,
            task_state,
            host: HostId::new("agent-1").unwrap(),
            progress: 0,
            created_at: now,
            updated_at: now,
            launched_at: None,
            terminated_at: None,
            deleted: false,
            deleted_at: None,
        }
    }

    fn rejected_attribute(unit: &Unit, action: UnitAction) -> Option<&'static str> {
        match check_preconditions(unit, action) {
            Ok(()) => None,
            Err(ControlError::InvalidState { attribute, .. }) => Some(attribute),
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    #[test]
    fn idle_units_follow_the_table() {
        let cases = [
            (UnitState::Ready, UnitAction::Activate, true),
            (UnitState::Ready, UnitAction::Deactivate, false),
            (UnitState::Ready, UnitAction::Start, false),
            (UnitState::Ready, UnitAction::Stop, false),
            (UnitState::Ready, UnitAction::Destroy, true),
            (UnitState::Active, UnitAction::Activate, false),
            (UnitState::Active, UnitAction::Deactivate, true),
            (UnitState::Active, UnitAction::Start, true),
            (UnitState::Active, UnitAction::Stop, false),
            (UnitState::Working, UnitAction::Deactivate, true),
            (UnitState::Working, UnitAction::Start, false),
            (UnitState::Working, UnitAction::Stop, true),
            (UnitState::Working, UnitAction::Destroy, true),
        ];

        for (state, action, allowed) in cases {
            let result = check_preconditions(&unit(state, None), action);
            assert_eq!(result.is_ok(), allowed, "{action} on {state}");
        }
    }

    #[test]
    fn stop_on_ready_names_state() {
        let err = check_preconditions(&unit(UnitState::Ready, None), UnitAction::Stop).unwrap_err();
        match err {
            ControlError::InvalidState {
                attribute,
                value,
                operation,
                ..
            } => {
                assert_eq!(attribute, "state");
                assert_eq!(value, "ready");
                assert_eq!(operation, UnitAction::Stop);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn busy_units_are_rejected_on_task_state() {
        let busy = unit(UnitState::Ready, Some(TaskState::Activating));
        assert_eq!(rejected_attribute(&busy, UnitAction::Activate), Some("task_state"));
    }

    #[test]
    fn destroy_tolerates_most_markers() {
        for marker in [
            TaskState::Deactivating,
            TaskState::Starting,
            TaskState::Stopping,
        ] {
            let busy = unit(UnitState::Active, Some(marker));
            assert_eq!(rejected_attribute(&busy, UnitAction::Destroy), None);
        }

        let activating = unit(UnitState::Ready, Some(TaskState::Activating));
        assert_eq!(
            rejected_attribute(&activating, UnitAction::Destroy),
            Some("task_state")
        );
    }

    #[test]
    fn deleted_units_are_rejected_on_state() {
        let deleted = unit(UnitState::Deleted, None);
        assert_eq!(rejected_attribute(&deleted, UnitAction::Destroy), Some("state"));
    }

    #[test]
    fn claim_condition_matches_guard() {
        let condition = claim_condition(UnitAction::Start);
        assert!(condition.matches(&unit(UnitState::Active, None)));
        assert!(!condition.matches(&unit(UnitState::Active, Some(TaskState::Starting))));
        assert!(!condition.matches(&unit(UnitState::Working, None)));
    }
}
