//! Lifecycle client implementation.
//!
//! This module provides the `UnitControl` trait and the `LifecycleService`
//! implementation that guards every action before handing it to a worker.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use unitplane_agent::{CreateUnitRequest, UnitAction, UnitCommand};
use unitplane_core::{RequestContext, UnitId};
use unitplane_mediator::Mediator;
use unitplane_store::{ListFilter, TaskState, Unit, UnitValues, UpdateCondition};

use crate::config::ControlConfig;
use crate::dispatcher::Dispatcher;
use crate::error::{ControlError, Result};
use crate::lifecycle;

/// Trait defining the caller-facing unit operations.
///
/// Transition methods return once the owning worker has accepted the
/// command. Completion is observed by reading the unit.
#[async_trait]
pub trait UnitControl: Send + Sync {
    // =========================================================================
    // Unit CRUD Operations
    // =========================================================================

    /// Create a unit owned by the caller.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::InvalidRequest` if the name is invalid.
    async fn create_unit(&self, ctx: &RequestContext, request: CreateUnitRequest) -> Result<Unit>;

    /// Get a unit by ID.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::UnitNotFound` if the unit doesn't exist or is deleted.
    async fn get_unit(&self, unit_id: &UnitId) -> Result<Unit>;

    /// List live units in the caller's project.
    async fn list_units(&self, ctx: &RequestContext) -> Result<Vec<Unit>>;

    /// Find live units in the caller's project by display name.
    async fn find_units_by_name(&self, ctx: &RequestContext, name: &str) -> Result<Vec<Unit>>;

    // =========================================================================
    // Lifecycle Operations
    // =========================================================================

    /// Activate a ready unit.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::InvalidState` if the unit is not ready and idle.
    async fn activate_unit(&self, unit_id: &UnitId) -> Result<()>;

    /// Deactivate an active or working unit.
    async fn deactivate_unit(&self, unit_id: &UnitId) -> Result<()>;

    /// Start work on an active unit.
    async fn start_unit(&self, unit_id: &UnitId) -> Result<()>;

    /// Stop work on a working unit.
    async fn stop_unit(&self, unit_id: &UnitId) -> Result<()>;

    /// Soft-delete a unit.
    async fn destroy_unit(&self, unit_id: &UnitId) -> Result<()>;

    // =========================================================================
    // Operational
    // =========================================================================

    /// Units whose task marker has not changed for longer than `older_than`.
    ///
    /// These are left for an operator; nothing is retried automatically.
    async fn stuck_units(&self, older_than: Duration) -> Result<Vec<Unit>>;
}

/// The main lifecycle client implementation.
pub struct LifecycleService<D: Dispatcher> {
    mediator: Arc<dyn Mediator>,
    dispatcher: D,
    config: ControlConfig,
}

impl<D: Dispatcher> LifecycleService<D> {
    /// Create a new lifecycle service.
    #[must_use]
    pub fn new(mediator: Arc<dyn Mediator>, dispatcher: D, config: ControlConfig) -> Self {
        Self {
            mediator,
            dispatcher,
            config,
        }
    }

    /// Create with default configuration.
    #[must_use]
    pub fn with_defaults(mediator: Arc<dyn Mediator>, dispatcher: D) -> Self {
        Self::new(mediator, dispatcher, ControlConfig::default())
    }

    /// Get the mediator.
    #[must_use]
    pub fn mediator(&self) -> &Arc<dyn Mediator> {
        &self.mediator
    }

    /// Get the dispatcher.
    #[must_use]
    pub const fn dispatcher(&self) -> &D {
        &self.dispatcher
    }

    /// Get the configuration.
    #[must_use]
    pub const fn config(&self) -> &ControlConfig {
        &self.config
    }

    /// Guard, claim and dispatch one action.
    async fn request(&self, unit_id: &UnitId, action: UnitAction) -> Result<()> {
        let unit = self.get_unit(unit_id).await?;

        if let Err(e) = lifecycle::check_preconditions(&unit, action) {
            tracing::debug!(
                unit_id = %unit_id,
                action = %action,
                error = %e,
                "Rejected unit action"
            );
            return Err(e);
        }

        let command = UnitCommand::new(action, *unit_id);
        let Some(transition) = action.transition() else {
            // Destroy is guarded but never claimed.
            self.dispatcher.cast(&unit.host, command).await?;
            tracing::info!(
                unit_id = %unit_id,
                host = %unit.host,
                action = %action,
                "Unit action accepted"
            );
            return Ok(());
        };

        self.claim(&unit, action, transition.marker).await?;

        if let Err(e) = self.dispatcher.cast(&unit.host, command).await {
            if e.is_undelivered() {
                tracing::warn!(
                    unit_id = %unit_id,
                    host = %unit.host,
                    action = %action,
                    error = %e,
                    "Dispatch failed, releasing claim"
                );
                self.release(unit_id, transition.marker).await;
            } else {
                // The worker may own the marker now; only it or an operator clears it.
                tracing::warn!(
                    unit_id = %unit_id,
                    host = %unit.host,
                    action = %action,
                    task_state = %transition.marker,
                    error = %e,
                    "Dispatch unconfirmed, keeping claim"
                );
            }
            return Err(e);
        }

        tracing::info!(
            unit_id = %unit_id,
            host = %unit.host,
            action = %action,
            task_state = %transition.marker,
            "Unit action accepted"
        );
        Ok(())
    }

    /// Atomically write the task marker if the guard still holds.
    async fn claim(&self, unit: &Unit, action: UnitAction, marker: TaskState) -> Result<()> {
        let condition = lifecycle::claim_condition(action);
        match self
            .mediator
            .update_if(&unit.id, &condition, &UnitValues::begin_task(marker))
            .await
        {
            Ok(_) => Ok(()),
            Err(e) => match e.condition_failed() {
                Some(current) => {
                    lifecycle::check_preconditions(current, action)?;
                    Err(ControlError::Internal(format!(
                        "claim on unit {} failed although its state allows {action}",
                        unit.id
                    )))
                }
                None => Err(ControlError::for_unit(&unit.id, e)),
            },
        }
    }

    /// Clear our marker after a dispatch that certainly never reached a
    /// worker, leaving other writers alone.
    async fn release(&self, unit_id: &UnitId, marker: TaskState) {
        let condition = UpdateCondition::default().task_states(&[Some(marker)]);
        if let Err(e) = self
            .mediator
            .update_if(unit_id, &condition, &UnitValues::clear_task())
            .await
        {
            tracing::error!(
                unit_id = %unit_id,
                task_state = %marker,
                error = %e,
                "Failed to release claim"
            );
        }
    }
}

#[async_trait]
impl<D: Dispatcher> UnitControl for LifecycleService<D> {
    // =========================================================================
    // Unit CRUD Operations
    // =========================================================================

    async fn create_unit(&self, ctx: &RequestContext, request: CreateUnitRequest) -> Result<Unit> {
        request.validate().map_err(ControlError::InvalidRequest)?;

        let unit = self.dispatcher.create_unit(ctx, request).await?;

        tracing::info!(
            unit_id = %unit.id,
            host = %unit.host,
            project_id = %ctx.project_id,
            "Created unit"
        );
        Ok(unit)
    }

    async fn get_unit(&self, unit_id: &UnitId) -> Result<Unit> {
        self.mediator
            .get_by_id(unit_id)
            .await
            .map_err(|e| ControlError::for_unit(unit_id, e))
    }

    async fn list_units(&self, ctx: &RequestContext) -> Result<Vec<Unit>> {
        let filter = ListFilter::live().in_project(&ctx.project_id);
        Ok(self.mediator.list_filtered(&filter).await?)
    }

    async fn find_units_by_name(&self, ctx: &RequestContext, name: &str) -> Result<Vec<Unit>> {
        let filter = ListFilter::live().named(name).in_project(&ctx.project_id);
        Ok(self.mediator.list_filtered(&filter).await?)
    }

    // =========================================================================
    // Lifecycle Operations
    // =========================================================================

    async fn activate_unit(&self, unit_id: &UnitId) -> Result<()> {
        self.request(unit_id, UnitAction::Activate).await
    }

    async fn deactivate_unit(&self, unit_id: &UnitId) -> Result<()> {
        self.request(unit_id, UnitAction::Deactivate).await
    }

    async fn start_unit(&self, unit_id: &UnitId) -> Result<()> {
        self.request(unit_id, UnitAction::Start).await
    }

    async fn stop_unit(&self, unit_id: &UnitId) -> Result<()> {
        self.request(unit_id, UnitAction::Stop).await
    }

    async fn destroy_unit(&self, unit_id: &UnitId) -> Result<()> {
        self.request(unit_id, UnitAction::Destroy).await
    }

    // =========================================================================
    // Operational
    // =========================================================================

    async fn stuck_units(&self, older_than: Duration) -> Result<Vec<Unit>> {
        let age = chrono::Duration::from_std(older_than)
            .map_err(|e| ControlError::InvalidRequest(format!("threshold out of range: {e}")))?;
        let cutoff = Utc::now()
            .checked_sub_signed(age)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        let stuck: Vec<Unit> = self
            .mediator
            .list(false)
            .await?
            .into_iter()
            .filter(|u| u.is_busy() && u.updated_at < cutoff)
            .collect();

        for unit in &stuck {
            tracing::warn!(
                unit_id = %unit.id,
                host = %unit.host,
                state = %unit.state,
                task_state = ?unit.task_state,
                updated_at = %unit.updated_at,
                "Unit stuck in transition"
            );
        }
        Ok(stuck)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use unitplane_core::HostId;
    use unitplane_mediator::RemoteMediator;
    use unitplane_store::{NewUnit, Owner, UnitState};
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::dispatcher::{HttpDispatcher, LocalDispatcher};
    use crate::testing::{spawn_worker, test_mediator, wait_for_state};

    fn ctx() -> RequestContext {
        RequestContext::new("alice", "proj")
    }

    fn setup(work_ms: u64) -> (LifecycleService<LocalDispatcher>, tempfile::TempDir) {
        let (mediator, dir) = test_mediator();
        let worker = spawn_worker(Arc::clone(&mediator), "agent-1", work_ms);
        (
            LifecycleService::with_defaults(mediator, LocalDispatcher::new(worker)),
            dir,
        )
    }

    fn expect_invalid(result: Result<()>) -> &'static str {
        match result {
            Err(ControlError::InvalidState { attribute, .. }) => attribute,
            other => panic!("expected invalid state, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn create_and_get() {
        let (service, _dir) = setup(1);

        let unit = service
            .create_unit(&ctx(), CreateUnitRequest::new("unit-1", "acme"))
            .await
            .unwrap();
        assert_eq!(unit.state, UnitState::Ready);
        assert!(unit.task_state.is_none());
        assert_eq!(unit.host.as_str(), "agent-1");
        assert_eq!(unit.owner.user_id, "alice");

        let other = service
            .create_unit(&ctx(), CreateUnitRequest::new("unit-1", "acme"))
            .await
            .unwrap();
        assert_ne!(unit.id, other.id);

        assert_eq!(service.get_unit(&unit.id).await.unwrap(), unit);
        assert_eq!(
            service
                .find_units_by_name(&ctx(), "unit-1")
                .await
                .unwrap()
                .len(),
            2
        );
    }

    #[tokio::test]
    async fn create_rejects_bad_names() {
        let (service, _dir) = setup(1);
        let err = service
            .create_unit(&ctx(), CreateUnitRequest::new("   ", "acme"))
            .await
            .unwrap_err();
        assert!(matches!(err, ControlError::InvalidRequest(_)));
        assert!(service.list_units(&ctx()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn list_is_scoped_to_project() {
        let (service, _dir) = setup(1);
        service
            .create_unit(&ctx(), CreateUnitRequest::new("mine", "acme"))
            .await
            .unwrap();
        service
            .create_unit(
                &RequestContext::new("bob", "other"),
                CreateUnitRequest::new("theirs", "acme"),
            )
            .await
            .unwrap();

        let units = service.list_units(&ctx()).await.unwrap();
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].display_name, "mine");

        assert!(service
            .find_units_by_name(&ctx(), "theirs")
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn project_scope_travels_with_the_list_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rpc"))
            .and(body_partial_json(serde_json::json!({
                "method": "list",
                "version": "1.1",
                "args": {"filter": {"project_id": "proj", "display_name": "unit-1"}},
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"result": []})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let mediator: Arc<dyn Mediator> =
            Arc::new(RemoteMediator::new(server.uri(), Duration::from_secs(2)).unwrap());
        let dispatcher = HttpDispatcher::new(BTreeMap::new(), Duration::from_secs(1)).unwrap();
        let service = LifecycleService::with_defaults(mediator, dispatcher);

        assert!(service
            .find_units_by_name(&ctx(), "unit-1")
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn activate_deactivate_cycle() {
        let (service, _dir) = setup(5);
        let unit = service
            .create_unit(&ctx(), CreateUnitRequest::new("unit-1", "acme"))
            .await
            .unwrap();

        service.activate_unit(&unit.id).await.unwrap();
        let active = wait_for_state(service.mediator(), &unit.id, UnitState::Active).await;
        assert!(active.launched_at.is_some());

        service.start_unit(&unit.id).await.unwrap();
        wait_for_state(service.mediator(), &unit.id, UnitState::Working).await;

        service.stop_unit(&unit.id).await.unwrap();
        wait_for_state(service.mediator(), &unit.id, UnitState::Active).await;

        service.deactivate_unit(&unit.id).await.unwrap();
        let ready = wait_for_state(service.mediator(), &unit.id, UnitState::Ready).await;
        assert!(ready.task_state.is_none());
        assert_eq!(ready.progress, 100);
    }

    #[tokio::test]
    async fn second_activate_while_busy_names_task_state() {
        let (service, _dir) = setup(300);
        let unit = service
            .create_unit(&ctx(), CreateUnitRequest::new("unit-1", "acme"))
            .await
            .unwrap();

        service.activate_unit(&unit.id).await.unwrap();
        let claimed = service.get_unit(&unit.id).await.unwrap();
        assert_eq!(claimed.task_state, Some(TaskState::Activating));

        assert_eq!(
            expect_invalid(service.activate_unit(&unit.id).await),
            "task_state"
        );

        let active = wait_for_state(service.mediator(), &unit.id, UnitState::Active).await;
        assert!(active.task_state.is_none());
    }

    #[tokio::test]
    async fn stop_on_ready_is_rejected() {
        let (service, _dir) = setup(1);
        let unit = service
            .create_unit(&ctx(), CreateUnitRequest::new("unit-1", "acme"))
            .await
            .unwrap();

        let err = service.stop_unit(&unit.id).await.unwrap_err();
        assert_eq!(err.http_status_code(), 409);
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

    #[tokio::test]
    async fn rejected_requests_leave_record_unchanged() {
        let (service, _dir) = setup(1);
        let unit = service
            .create_unit(&ctx(), CreateUnitRequest::new("unit-1", "acme"))
            .await
            .unwrap();

        for result in [
            service.deactivate_unit(&unit.id).await,
            service.start_unit(&unit.id).await,
            service.stop_unit(&unit.id).await,
        ] {
            assert_eq!(expect_invalid(result), "state");
        }
        assert_eq!(service.get_unit(&unit.id).await.unwrap(), unit);
    }

    #[tokio::test]
    async fn destroy_twice_is_not_found() {
        let (service, _dir) = setup(1);
        let unit = service
            .create_unit(&ctx(), CreateUnitRequest::new("unit-1", "acme"))
            .await
            .unwrap();

        service.destroy_unit(&unit.id).await.unwrap();
        for _ in 0..200 {
            if service.get_unit(&unit.id).await.is_err() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let err = service.destroy_unit(&unit.id).await.unwrap_err();
        assert!(matches!(err, ControlError::UnitNotFound(id) if id == unit.id));
        assert_eq!(err.http_status_code(), 404);

        let all = service.mediator().list(true).await.unwrap();
        assert!(all[0].deleted);
        assert_eq!(all[0].state, UnitState::Deleted);
    }

    #[tokio::test]
    async fn destroy_during_activation_is_rejected() {
        let (service, _dir) = setup(300);
        let unit = service
            .create_unit(&ctx(), CreateUnitRequest::new("unit-1", "acme"))
            .await
            .unwrap();

        service.activate_unit(&unit.id).await.unwrap();
        assert_eq!(
            expect_invalid(service.destroy_unit(&unit.id).await),
            "task_state"
        );
    }

    #[tokio::test]
    async fn unknown_unit_is_not_found() {
        let (service, _dir) = setup(1);
        let id = UnitId::generate();
        assert!(matches!(
            service.activate_unit(&id).await,
            Err(ControlError::UnitNotFound(_))
        ));
    }

    #[tokio::test]
    async fn concurrent_activates_have_one_winner() {
        let (service, _dir) = setup(300);
        let unit = service
            .create_unit(&ctx(), CreateUnitRequest::new("unit-1", "acme"))
            .await
            .unwrap();

        let results =
            futures::future::join_all((0..8).map(|_| service.activate_unit(&unit.id))).await;

        let accepted = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(accepted, 1);
        for result in results.into_iter().filter(Result::is_err) {
            assert_eq!(expect_invalid(result), "task_state");
        }
    }

    async fn unit_on(mediator: &Arc<dyn Mediator>, host: &str) -> Unit {
        mediator
            .create(NewUnit {
                id: None,
                display_name: "unit-1".to_string(),
                vendor_tag: "acme".to_string(),
                owner: Owner::from(&ctx()),
                host: HostId::new(host).unwrap(),
                state: None,
            })
            .await
            .unwrap()
    }

    /// Answers every agent request only after the dispatch timeout has fired.
    async fn reply_late(
        request: axum::extract::Request,
        next: axum::middleware::Next,
    ) -> axum::response::Response {
        let response = next.run(request).await;
        tokio::time::sleep(Duration::from_millis(300)).await;
        response
    }

    #[tokio::test]
    async fn failed_dispatch_releases_claim() {
        let (mediator, _dir) = test_mediator();
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let dead = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);

        let routes = BTreeMap::from([(HostId::new("agent-2").unwrap(), dead)]);
        let dispatcher = HttpDispatcher::new(routes, Duration::from_secs(1)).unwrap();
        let service = LifecycleService::with_defaults(Arc::clone(&mediator), dispatcher);
        let unit = unit_on(&mediator, "agent-2").await;

        let err = service.activate_unit(&unit.id).await.unwrap_err();
        assert!(matches!(err, ControlError::DispatchFailed { .. }));

        let after = service.get_unit(&unit.id).await.unwrap();
        assert_eq!(after.state, UnitState::Ready);
        assert!(after.task_state.is_none());
    }

    #[tokio::test]
    async fn late_agent_answer_keeps_claim() {
        let (mediator, _dir) = test_mediator();
        let worker = spawn_worker(Arc::clone(&mediator), "agent-2", 500);
        let agent_app = unitplane_agent::create_router(unitplane_agent::AppState::new(worker))
            .layer(axum::middleware::from_fn(reply_late));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let agent_url = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            axum::serve(listener, agent_app).await.unwrap();
        });

        let routes = BTreeMap::from([(HostId::new("agent-2").unwrap(), agent_url)]);
        let dispatcher = HttpDispatcher::new(routes, Duration::from_millis(100)).unwrap();
        let service = LifecycleService::with_defaults(Arc::clone(&mediator), dispatcher);
        let unit = unit_on(&mediator, "agent-2").await;

        let err = service.activate_unit(&unit.id).await.unwrap_err();
        assert!(matches!(err, ControlError::DispatchUnconfirmed { .. }));

        // The agent queued the command, so the record must still read busy.
        let after = service.get_unit(&unit.id).await.unwrap();
        assert_eq!(after.state, UnitState::Ready);
        assert_eq!(after.task_state, Some(TaskState::Activating));
        assert_eq!(
            expect_invalid(service.activate_unit(&unit.id).await),
            "task_state"
        );

        let active = wait_for_state(&mediator, &unit.id, UnitState::Active).await;
        assert!(active.launched_at.is_some());
    }

    #[tokio::test]
    async fn stuck_units_are_reported() {
        let (mediator, _dir) = test_mediator();
        let worker = spawn_worker(Arc::clone(&mediator), "agent-1", 1);
        let service =
            LifecycleService::with_defaults(Arc::clone(&mediator), LocalDispatcher::new(worker));
        assert_eq!(service.config().stuck_threshold(), Duration::from_secs(300));

        let unit = service
            .create_unit(&ctx(), CreateUnitRequest::new("unit-1", "acme"))
            .await
            .unwrap();
        // A worker that died after writing its marker.
        mediator
            .update(&unit.id, &UnitValues::begin_task(TaskState::Starting))
            .await
            .unwrap();
        service
            .create_unit(&ctx(), CreateUnitRequest::new("idle", "acme"))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;

        let stuck = service.stuck_units(Duration::from_millis(10)).await.unwrap();
        assert_eq!(stuck.len(), 1);
        assert_eq!(stuck[0].id, unit.id);
        assert_eq!(stuck[0].task_state, Some(TaskState::Starting));

        assert!(service
            .stuck_units(service.config().stuck_threshold())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn remote_mediator_timeout_is_backend_unreachable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;

        let mediator: Arc<dyn Mediator> =
            Arc::new(RemoteMediator::new(server.uri(), Duration::from_millis(50)).unwrap());
        let dispatcher = HttpDispatcher::new(BTreeMap::new(), Duration::from_secs(1)).unwrap();
        let service = LifecycleService::with_defaults(mediator, dispatcher);

        let err = service.get_unit(&UnitId::generate()).await.unwrap_err();
        assert!(matches!(err, ControlError::BackendUnreachable(_)));
        assert_eq!(err.http_status_code(), 503);
        assert!(err.is_retriable());
    }

    #[tokio::test]
    async fn distributed_cycle_over_rpc() {
        // Mediator process.
        let (local, _dir) = test_mediator();
        let mediator_app =
            unitplane_mediator::create_router(unitplane_mediator::AppState::new(local));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let mediator_url = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            axum::serve(listener, mediator_app).await.unwrap();
        });

        // Agent process, reaching storage only through the remote mediator.
        let agent_mediator: Arc<dyn Mediator> =
            Arc::new(RemoteMediator::new(mediator_url.clone(), Duration::from_secs(5)).unwrap());
        let worker = spawn_worker(agent_mediator, "agent-2", 5);
        let agent_app = unitplane_agent::create_router(unitplane_agent::AppState::new(worker));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let agent_url = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            axum::serve(listener, agent_app).await.unwrap();
        });

        // Lifecycle client with no local worker.
        let mediator: Arc<dyn Mediator> =
            Arc::new(RemoteMediator::new(mediator_url, Duration::from_secs(5)).unwrap());
        let routes = BTreeMap::from([(HostId::new("agent-2").unwrap(), agent_url)]);
        let dispatcher = HttpDispatcher::new(routes, Duration::from_secs(5)).unwrap();
        let service = LifecycleService::with_defaults(Arc::clone(&mediator), dispatcher);

        let unit = service
            .create_unit(&ctx(), CreateUnitRequest::new("unit-1", "acme"))
            .await
            .unwrap();
        assert_eq!(unit.host.as_str(), "agent-2");

        service.activate_unit(&unit.id).await.unwrap();
        wait_for_state(&mediator, &unit.id, UnitState::Active).await;

        assert_eq!(expect_invalid(service.activate_unit(&unit.id).await), "state");

        service.destroy_unit(&unit.id).await.unwrap();
        for _ in 0..200 {
            if matches!(
                service.get_unit(&unit.id).await,
                Err(ControlError::UnitNotFound(_))
            ) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("unit was never destroyed");
    }
}
