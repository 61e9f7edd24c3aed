//! Lifecycle actions and their transition tables.
//!
//! ```text
//!   ready ──activate──► active ──start──► working
//!     ▲                   │ ▲               │
//!     └────deactivate─────┘ └─────stop──────┘
//!     ▲                                     │
//!     └──────────────deactivate─────────────┘
//!
//!   {ready, active, working} ──destroy──► deleted
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use unitplane_store::{TaskState, UnitState};

/// A caller-requested lifecycle action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitAction {
    /// `ready -> active`.
    Activate,
    /// `active|working -> ready`.
    Deactivate,
    /// `active -> working`.
    Start,
    /// `working -> active`.
    Stop,
    /// Soft-delete the unit.
    Destroy,
}

/// The two-phase commit an action performs: the marker written while the
/// work runs, and the steady state written when it finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// Task marker held for the duration of the work.
    pub marker: TaskState,
    /// Steady state committed afterwards.
    pub target: UnitState,
}

/// The `(state, task_state)` combinations an action accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Precondition {
    /// Allowed current states.
    pub states: &'static [UnitState],
    /// Allowed current task markers.
    pub task_states: &'static [Option<TaskState>],
}

impl Precondition {
    /// Returns true if `state` is allowed.
    #[must_use]
    pub fn allows_state(&self, state: UnitState) -> bool {
        self.states.contains(&state)
    }

    /// Returns true if `task_state` is allowed.
    #[must_use]
    pub fn allows_task_state(&self, task_state: Option<TaskState>) -> bool {
        self.task_states.contains(&task_state)
    }
}

const IDLE: &[Option<TaskState>] = &[None];

impl UnitAction {
    /// All actions.
    pub const ALL: [Self; 5] = [
        Self::Activate,
        Self::Deactivate,
        Self::Start,
        Self::Stop,
        Self::Destroy,
    ];

    /// The action's name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Activate => "activate",
            Self::Deactivate => "deactivate",
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Destroy => "destroy",
        }
    }

    /// The marker/target pair, or `None` for destroy which skips task bookkeeping.
    #[must_use]
    pub const fn transition(self) -> Option<Transition> {
        let (marker, target) = match self {
            Self::Activate => (TaskState::Activating, UnitState::Active),
            Self::Deactivate => (TaskState::Deactivating, UnitState::Ready),
            Self::Start => (TaskState::Starting, UnitState::Working),
            Self::Stop => (TaskState::Stopping, UnitState::Active),
            Self::Destroy => return None,
        };
        Some(Transition { marker, target })
    }

    /// The states in which the action may be requested.
    #[must_use]
    pub const fn precondition(self) -> Precondition {
        match self {
            Self::Activate => Precondition {
                states: &[UnitState::Ready],
                task_states: IDLE,
            },
            Self::Deactivate => Precondition {
                states: &[UnitState::Active, UnitState::Working],
                task_states: IDLE,
            },
            Self::Start => Precondition {
                states: &[UnitState::Active],
                task_states: IDLE,
            },
            Self::Stop => Precondition {
                states: &[UnitState::Working],
                task_states: IDLE,
            },
            Self::Destroy => Precondition {
                states: &[UnitState::Ready, UnitState::Active, UnitState::Working],
                task_states: &[
                    None,
                    Some(TaskState::Deactivating),
                    Some(TaskState::Starting),
                    Some(TaskState::Stopping),
                ],
            },
        }
    }
}

impl fmt::Display for UnitAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UnitAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| format!("unknown action: {s}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transitions() {
        let activate = UnitAction::Activate.transition().unwrap();
        assert_eq!(activate.marker, TaskState::Activating);
        assert_eq!(activate.target, UnitState::Active);

        let stop = UnitAction::Stop.transition().unwrap();
        assert_eq!(stop.marker, TaskState::Stopping);
        assert_eq!(stop.target, UnitState::Active);

        assert!(UnitAction::Destroy.transition().is_none());
    }

    #[test]
    fn transitional_actions_need_idle_units() {
        for action in [
            UnitAction::Activate,
            UnitAction::Deactivate,
            UnitAction::Start,
            UnitAction::Stop,
        ] {
            let pre = action.precondition();
            assert!(pre.allows_task_state(None), "{action}");
            assert!(!pre.allows_task_state(Some(TaskState::Activating)), "{action}");
        }
    }

    #[test]
    fn stop_requires_working() {
        let pre = UnitAction::Stop.precondition();
        assert!(pre.allows_state(UnitState::Working));
        assert!(!pre.allows_state(UnitState::Ready));
        assert!(!pre.allows_state(UnitState::Active));
    }

    #[test]
    fn destroy_tolerates_most_markers() {
        let pre = UnitAction::Destroy.precondition();
        assert!(pre.allows_task_state(Some(TaskState::Stopping)));
        assert!(!pre.allows_task_state(Some(TaskState::Activating)));
        assert!(!pre.allows_state(UnitState::Deleted));
    }

    #[test]
    fn parse_roundtrip() {
        for action in UnitAction::ALL {
            assert_eq!(action.as_str().parse::<UnitAction>().unwrap(), action);
        }
        assert!("reboot".parse::<UnitAction>().is_err());
    }
}
