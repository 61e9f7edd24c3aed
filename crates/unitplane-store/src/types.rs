//! Domain types stored in the database.
//!
//! These types represent the persisted state of managed units together with
//! the patch, filter, and condition shapes the storage gateway accepts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use unitplane_core::{HostId, RequestContext, UnitId};

/// A managed unit record stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    /// Unique identifier, immutable after creation.
    pub id: UnitId,
    /// Human-readable name.
    pub display_name: String,
    /// Owning user/project pair.
    pub owner: Owner,
    /// Opaque caller-supplied vendor string.
    pub vendor_tag: String,
    /// Current steady state.
    pub state: UnitState,
    /// In-flight transition marker, `None` when idle.
    pub task_state: Option<TaskState>,
    /// Worker host that owns this unit; set once at creation.
    pub host: HostId,
    /// Advisory transition progress, 0-100.
    pub progress: u8,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp.
    pub updated_at: DateTime<Utc>,
    /// First time the unit reached `Active`.
    #[serde(default)]
    pub launched_at: Option<DateTime<Utc>>,
    /// When the unit was destroyed.
    #[serde(default)]
    pub terminated_at: Option<DateTime<Utc>>,
    /// Soft-delete marker.
    #[serde(default)]
    pub deleted: bool,
    /// When the soft-delete marker was set.
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Unit {
    /// Returns true while a transition is in flight.
    #[must_use]
    pub const fn is_busy(&self) -> bool {
        self.task_state.is_some()
    }

    /// Apply a partial update. Fields absent from `values` are left untouched.
    pub fn apply(&mut self, values: &UnitValues) {
        if let Some(name) = &values.display_name {
            self.display_name.clone_from(name);
        }
        if let Some(vendor) = &values.vendor_tag {
            self.vendor_tag.clone_from(vendor);
        }
        if let Some(state) = values.state {
            self.state = state;
        }
        if let Some(task_state) = values.task_state {
            self.task_state = task_state;
        }
        if let Some(progress) = values.progress {
            self.progress = progress.min(100);
        }
        if let Some(launched_at) = values.launched_at {
            self.launched_at = Some(launched_at);
        }
    }
}

/// The user/project pair that owns a unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Owner {
    /// Owning user.
    pub user_id: String,
    /// Owning project.
    pub project_id: String,
}

impl From<&RequestContext> for Owner {
    fn from(ctx: &RequestContext) -> Self {
        Self {
            user_id: ctx.user_id.clone(),
            project_id: ctx.project_id.clone(),
        }
    }
}

/// Steady states of a managed unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitState {
    /// Created, not yet activated.
    Ready,
    /// Activated and idle.
    Active,
    /// Activated and doing work.
    Working,
    /// Soft-deleted; absorbing.
    Deleted,
}

impl UnitState {
    /// The persisted name of this state.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::Active => "active",
            Self::Working => "working",
            Self::Deleted => "deleted",
        }
    }
}

impl fmt::Display for UnitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transition markers written while a worker is busy with a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// `ready -> active` in progress.
    Activating,
    /// `active|working -> ready` in progress.
    Deactivating,
    /// `active -> working` in progress.
    Starting,
    /// `working -> active` in progress.
    Stopping,
}

impl TaskState {
    /// The persisted name of this marker.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Activating => "activating",
            Self::Deactivating => "deactivating",
            Self::Starting => "starting",
            Self::Stopping => "stopping",
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fields for creating a unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUnit {
    /// Caller-chosen identity; generated when absent.
    #[serde(default)]
    pub id: Option<UnitId>,
    /// Human-readable name.
    pub display_name: String,
    /// Opaque vendor string.
    #[serde(default)]
    pub vendor_tag: String,
    /// Owning user/project pair.
    pub owner: Owner,
    /// Worker host that will own the unit.
    pub host: HostId,
    /// Initial state; defaults to `Ready`.
    #[serde(default)]
    pub state: Option<UnitState>,
}

/// A partial update. Only present fields are written.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitValues {
    /// New display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// New vendor tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor_tag: Option<String>,
    /// New steady state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<UnitState>,
    /// New task marker. `Some(None)` clears it, `None` leaves it alone.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "present_nullable"
    )]
    pub task_state: Option<Option<TaskState>>,
    /// New progress value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
    /// First-activation timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub launched_at: Option<DateTime<Utc>>,
}

impl UnitValues {
    /// Values that mark a transition as in flight.
    #[must_use]
    pub fn begin_task(marker: TaskState) -> Self {
        Self {
            task_state: Some(Some(marker)),
            progress: Some(0),
            ..Self::default()
        }
    }

    /// Values that commit a finished transition.
    #[must_use]
    pub fn finish_task(state: UnitState) -> Self {
        Self {
            state: Some(state),
            task_state: Some(None),
            progress: Some(100),
            ..Self::default()
        }
    }

    /// Values that clear a marker without changing the steady state.
    #[must_use]
    pub fn clear_task() -> Self {
        Self {
            task_state: Some(None),
            ..Self::default()
        }
    }
}

/// Keeps an explicit `null` distinct from an absent field.
fn present_nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Compare-and-swap guard for `Store::update_if`.
///
/// `None` leaves an attribute unconstrained.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateCondition {
    /// Allowed current `state` values.
    #[serde(default)]
    pub states: Option<Vec<UnitState>>,
    /// Allowed current `task_state` values.
    #[serde(default)]
    pub task_states: Option<Vec<Option<TaskState>>>,
}

impl UpdateCondition {
    /// Require the current state to be one of `states`.
    #[must_use]
    pub fn states(mut self, states: &[UnitState]) -> Self {
        self.states = Some(states.to_vec());
        self
    }

    /// Require the current task marker to be one of `task_states`.
    #[must_use]
    pub fn task_states(mut self, task_states: &[Option<TaskState>]) -> Self {
        self.task_states = Some(task_states.to_vec());
        self
    }

    /// Returns true if `unit` satisfies the condition.
    #[must_use]
    pub fn matches(&self, unit: &Unit) -> bool {
        let state_ok = self
            .states
            .as_ref()
            .map_or(true, |allowed| allowed.contains(&unit.state));
        let task_ok = self
            .task_states
            .as_ref()
            .map_or(true, |allowed| allowed.contains(&unit.task_state));
        state_ok && task_ok
    }
}

/// Which soft-deleted records a read may see.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadDeleted {
    /// Hide soft-deleted records.
    #[default]
    No,
    /// Include soft-deleted records.
    Yes,
    /// Only soft-deleted records.
    Only,
}

impl ReadDeleted {
    /// Returns true if `unit` is visible under this view.
    #[must_use]
    pub const fn admits(self, unit: &Unit) -> bool {
        match self {
            Self::No => !unit.deleted,
            Self::Yes => true,
            Self::Only => unit.deleted,
        }
    }
}

/// Selection criteria for `Store::list`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListFilter {
    /// Soft-delete visibility.
    #[serde(default)]
    pub read_deleted: ReadDeleted,
    /// Exact display name.
    #[serde(default)]
    pub display_name: Option<String>,
    /// Owning project.
    #[serde(default)]
    pub project_id: Option<String>,
    /// Owning host.
    #[serde(default)]
    pub host: Option<HostId>,
}

impl ListFilter {
    /// All live records.
    #[must_use]
    pub fn live() -> Self {
        Self::default()
    }

    /// Set the soft-delete view.
    #[must_use]
    pub const fn read_deleted(mut self, read_deleted: ReadDeleted) -> Self {
        self.read_deleted = read_deleted;
        self
    }

    /// Restrict to an exact display name.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Restrict to one project.
    #[must_use]
    pub fn in_project(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    /// Restrict to one host.
    #[must_use]
    pub fn on_host(mut self, host: HostId) -> Self {
        self.host = Some(host);
        self
    }

    /// Returns true if `unit` passes every criterion.
    #[must_use]
    pub fn matches(&self, unit: &Unit) -> bool {
        self.read_deleted.admits(unit)
            && self
                .display_name
                .as_ref()
                .map_or(true, |name| *name == unit.display_name)
            && self
                .project_id
                .as_ref()
                .map_or(true, |project| *project == unit.owner.project_id)
            && self.host.as_ref().map_or(true, |host| *host == unit.host)
    }
}

/// Fields `Store::get_by_field` can look up by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LookupField {
    /// The unit identity.
    Id,
    /// The display name.
    DisplayName,
    /// The owning host.
    Host,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit() -> Unit {
        let now = Utc::now();
        Unit {
            id: UnitId::generate(),
            display_name: "unit-1".to_string(),
            owner: Owner {
                user_id: "alice".to_string(),
                project_id: "proj".to_string(),
            },
            vendor_tag: "acme".to_string(),
            state: UnitState::Ready,
            task_state: None,
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

    #[test]
    fn apply_preserves_absent_fields() {
        let mut u = unit();
        u.apply(&UnitValues {
            state: Some(UnitState::Active),
            ..UnitValues::default()
        });
        assert_eq!(u.state, UnitState::Active);
        assert_eq!(u.display_name, "unit-1");
        assert_eq!(u.vendor_tag, "acme");
        assert_eq!(u.task_state, None);
    }

    #[test]
    fn apply_clears_task_state_only_when_explicit() {
        let mut u = unit();
        u.apply(&UnitValues::begin_task(TaskState::Activating));
        assert_eq!(u.task_state, Some(TaskState::Activating));

        u.apply(&UnitValues {
            vendor_tag: Some("other".to_string()),
            ..UnitValues::default()
        });
        assert_eq!(u.task_state, Some(TaskState::Activating));

        u.apply(&UnitValues::clear_task());
        assert_eq!(u.task_state, None);
    }

    #[test]
    fn task_state_patch_json() {
        let absent: UnitValues = serde_json::from_str("{}").unwrap();
        assert_eq!(absent.task_state, None);

        let cleared: UnitValues = serde_json::from_str(r#"{"task_state":null}"#).unwrap();
        assert_eq!(cleared.task_state, Some(None));

        let set: UnitValues = serde_json::from_str(r#"{"task_state":"stopping"}"#).unwrap();
        assert_eq!(set.task_state, Some(Some(TaskState::Stopping)));

        let json = serde_json::to_value(UnitValues::clear_task()).unwrap();
        assert_eq!(json, serde_json::json!({"task_state": null}));
    }

    #[test]
    fn condition_matching() {
        let mut u = unit();
        let cond = UpdateCondition::default()
            .states(&[UnitState::Ready])
            .task_states(&[None]);
        assert!(cond.matches(&u));

        u.task_state = Some(TaskState::Activating);
        assert!(!cond.matches(&u));

        assert!(UpdateCondition::default().matches(&u));
    }

    #[test]
    fn read_deleted_views() {
        let mut u = unit();
        assert!(ReadDeleted::No.admits(&u));
        assert!(!ReadDeleted::Only.admits(&u));

        u.deleted = true;
        assert!(!ReadDeleted::No.admits(&u));
        assert!(ReadDeleted::Yes.admits(&u));
        assert!(ReadDeleted::Only.admits(&u));
    }

    #[test]
    fn list_filter_matching() {
        let u = unit();
        assert!(ListFilter::live().named("unit-1").matches(&u));
        assert!(!ListFilter::live().named("unit-2").matches(&u));
        assert!(!ListFilter::live().in_project("other").matches(&u));
        assert!(ListFilter::live()
            .on_host(HostId::new("agent-1").unwrap())
            .matches(&u));
    }

    #[test]
    fn progress_is_capped() {
        let mut u = unit();
        u.apply(&UnitValues {
            progress: Some(250),
            ..UnitValues::default()
        });
        assert_eq!(u.progress, 100);
    }
}
