//! Per-unit lifecycle state machine.
//!
//! The manager only touches records through the mediator. A transition is
//! committed in two steps:
//!
//! 1. Conditionally write the task marker (state must still satisfy the
//!    action's precondition and the marker must be unset or already ours).
//! 2. Run the transitional work, then write the target state and clear the
//!    marker.

use std::sync::Arc;

use chrono::Utc;
use unitplane_core::{HostId, RequestContext, UnitId};
use unitplane_mediator::Mediator;
use unitplane_store::{ListFilter, NewUnit, Owner, Unit, UnitState, UnitValues, UpdateCondition};

use crate::action::{Transition, UnitAction};
use crate::error::{AgentError, Result};
use crate::types::{CreateUnitRequest, UnitCommand};
use crate::work::TransitionWork;

/// Drives units owned by one host through their transitions.
pub struct LifecycleManager {
    mediator: Arc<dyn Mediator>,
    host: HostId,
    work: Arc<dyn TransitionWork>,
}

impl LifecycleManager {
    /// Create a manager for `host`.
    #[must_use]
    pub fn new(mediator: Arc<dyn Mediator>, host: HostId, work: Arc<dyn TransitionWork>) -> Self {
        Self {
            mediator,
            host,
            work,
        }
    }

    /// The host this manager owns units for.
    #[must_use]
    pub const fn host(&self) -> &HostId {
        &self.host
    }

    /// The mediator used for every record access.
    #[must_use]
    pub fn mediator(&self) -> &Arc<dyn Mediator> {
        &self.mediator
    }

    /// Create a unit owned by this host in the `ready` state.
    ///
    /// # Errors
    ///
    /// Returns an error if the mediator rejects the record.
    pub async fn create_unit(&self, ctx: &RequestContext, req: CreateUnitRequest) -> Result<Unit> {
        let unit = self
            .mediator
            .create(NewUnit {
                id: None,
                display_name: req.display_name,
                vendor_tag: req.vendor_tag,
                owner: Owner::from(ctx),
                host: self.host.clone(),
                state: Some(UnitState::Ready),
            })
            .await?;

        tracing::info!(
            unit_id = %unit.id,
            host = %self.host,
            user_id = %ctx.user_id,
            project_id = %ctx.project_id,
            "Created unit"
        );
        Ok(unit)
    }

    /// Execute a command to completion.
    ///
    /// # Errors
    ///
    /// Returns an error if any step of the action fails.
    pub async fn execute(&self, command: UnitCommand) -> Result<()> {
        match command.action.transition() {
            Some(transition) => self
                .run_transition(&command.unit_id, command.action, transition)
                .await
                .map(|_| ()),
            None => self.destroy_unit(&command.unit_id).await,
        }
    }

    /// Run a two-phase transition and return the committed record.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::ConditionFailed` (via the mediator) if the unit is
    /// no longer in a state the action accepts, `AgentError::WorkFailed` if
    /// the work fails, or any mediator error from the final commit.
    pub async fn run_transition(
        &self,
        unit_id: &UnitId,
        action: UnitAction,
        transition: Transition,
    ) -> Result<Unit> {
        let precondition = action.precondition();
        let condition = UpdateCondition::default()
            .states(precondition.states)
            .task_states(&[None, Some(transition.marker)]);

        let unit = self
            .mediator
            .update_if(unit_id, &condition, &UnitValues::begin_task(transition.marker))
            .await?;

        tracing::info!(
            unit_id = %unit_id,
            action = %action,
            task_state = %transition.marker,
            "Transition started"
        );

        if let Err(reason) = self.work.perform(&unit, action).await {
            self.release_marker(unit_id, transition).await;
            return Err(AgentError::WorkFailed {
                unit_id: *unit_id,
                action,
                reason,
            });
        }

        let mut values = UnitValues::finish_task(transition.target);
        if transition.target == UnitState::Active && unit.launched_at.is_none() {
            values.launched_at = Some(Utc::now());
        }

        let unit = self.mediator.update(unit_id, &values).await.map_err(|e| {
            if e.is_not_found() {
                tracing::info!(
                    unit_id = %unit_id,
                    action = %action,
                    "Unit was destroyed during transition"
                );
            }
            e
        })?;

        tracing::info!(
            unit_id = %unit_id,
            action = %action,
            state = %unit.state,
            "Transition committed"
        );
        Ok(unit)
    }

    /// Soft-delete a unit. No task bookkeeping is done.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` (via the mediator) if the unit is
    /// missing or already deleted.
    pub async fn destroy_unit(&self, unit_id: &UnitId) -> Result<()> {
        self.mediator.destroy(unit_id).await?;
        tracing::info!(unit_id = %unit_id, host = %self.host, "Destroyed unit");
        Ok(())
    }

    /// Live units assigned to this host, read through the host index.
    ///
    /// # Errors
    ///
    /// Returns an error if the mediator cannot list records.
    pub async fn owned_units(&self) -> Result<Vec<Unit>> {
        let filter = ListFilter::live().on_host(self.host.clone());
        Ok(self.mediator.list_filtered(&filter).await?)
    }

    /// Log and return this host's units that still carry a task marker.
    ///
    /// A marker found at startup was left by a worker that stopped
    /// mid-transition. Such units are not resumed; they wait for an operator.
    ///
    /// # Errors
    ///
    /// Returns an error if the mediator cannot list records.
    pub async fn interrupted_units(&self) -> Result<Vec<Unit>> {
        let interrupted: Vec<Unit> = self
            .owned_units()
            .await?
            .into_iter()
            .filter(Unit::is_busy)
            .collect();

        for unit in &interrupted {
            tracing::warn!(
                unit_id = %unit.id,
                host = %self.host,
                state = %unit.state,
                task_state = ?unit.task_state,
                "Unit left mid-transition"
            );
        }
        Ok(interrupted)
    }

    /// Clear our marker after failed work, leaving any other writer's value alone.
    async fn release_marker(&self, unit_id: &UnitId, transition: Transition) {
        let condition = UpdateCondition::default().task_states(&[Some(transition.marker)]);
        if let Err(e) = self
            .mediator
            .update_if(unit_id, &condition, &UnitValues::clear_task())
            .await
        {
            tracing::warn!(
                unit_id = %unit_id,
                task_state = %transition.marker,
                error = %e,
                "Failed to release task marker"
            );
        }
    }
}
