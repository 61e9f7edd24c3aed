//! The work performed between a transition's two commits.

use std::time::Duration;

use async_trait::async_trait;
use unitplane_store::Unit;

use crate::action::UnitAction;

/// The slow part of a transition, run while the task marker is held.
///
/// Returning `Err` aborts the transition; the reason is reported in
/// `AgentError::WorkFailed`.
#[async_trait]
pub trait TransitionWork: Send + Sync {
    /// Perform `action` on `unit`.
    async fn perform(&self, unit: &Unit, action: UnitAction) -> Result<(), String>;
}

/// How long each simulated transition takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkDurations {
    /// `ready -> active`.
    pub activate: Duration,
    /// `active|working -> ready`.
    pub deactivate: Duration,
    /// `active -> working`.
    pub start: Duration,
    /// `working -> active`.
    pub stop: Duration,
}

impl Default for WorkDurations {
    fn default() -> Self {
        Self {
            activate: Duration::from_secs(10),
            deactivate: Duration::from_secs(20),
            start: Duration::from_secs(20),
            stop: Duration::from_secs(20),
        }
    }
}

impl WorkDurations {
    /// The same duration for every action.
    #[must_use]
    pub const fn uniform(duration: Duration) -> Self {
        Self {
            activate: duration,
            deactivate: duration,
            start: duration,
            stop: duration,
        }
    }

    /// The duration for `action`. Destroy does no simulated work.
    #[must_use]
    pub const fn for_action(&self, action: UnitAction) -> Duration {
        match action {
            UnitAction::Activate => self.activate,
            UnitAction::Deactivate => self.deactivate,
            UnitAction::Start => self.start,
            UnitAction::Stop => self.stop,
            UnitAction::Destroy => Duration::ZERO,
        }
    }
}

/// Work that just waits for a configured interval.
#[derive(Debug, Clone, Default)]
pub struct SimulatedWork {
    durations: WorkDurations,
}

impl SimulatedWork {
    /// Create simulated work with the given durations.
    #[must_use]
    pub const fn new(durations: WorkDurations) -> Self {
        Self { durations }
    }

    /// The configured durations.
    #[must_use]
    pub const fn durations(&self) -> &WorkDurations {
        &self.durations
    }
}

#[async_trait]
impl TransitionWork for SimulatedWork {
    async fn perform(&self, unit: &Unit, action: UnitAction) -> Result<(), String> {
        let duration = self.durations.for_action(action);
        tracing::debug!(
            unit_id = %unit.id,
            action = %action,
            duration_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
            "Simulating transition work"
        );
        tokio::time::sleep(duration).await;
        Ok(())
    }
}
