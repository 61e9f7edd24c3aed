//! Routing of unit commands to the worker that owns the unit.
//!
//! Creation is a call: the caller waits for the stored record. Every other
//! action is a cast: the caller only learns that the worker accepted the
//! command, and completion is observed by reading the unit back.
//!
//! ```text
//!                        ┌────────────────────┐
//!                        │ RoutingDispatcher  │
//!                        └─────────┬──────────┘
//!              host == local       │        other hosts
//!            ┌─────────────────────┴─────────────────────┐
//!            ▼                                           ▼
//!   ┌─────────────────┐                        ┌──────────────────┐
//!   │ LocalDispatcher │                        │  HttpDispatcher  │
//!   │  (WorkerHandle) │                        │ POST {agent}/rpc │
//!   └─────────────────┘                        └──────────────────┘
//! ```

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use unitplane_agent::protocol::{self, Accepted, CreateUnitArgs, UnitArgs, CREATE_UNIT};
use unitplane_agent::{AgentError, CreateUnitRequest, UnitCommand, WorkerHandle};
use unitplane_core::{HostId, RequestContext, RpcError, RpcErrorKind, RpcRequest, RpcResponse};
use unitplane_mediator::protocol::decode_error;
use unitplane_store::Unit;

use crate::config::ControlConfig;
use crate::error::{ControlError, Result};

/// Trait for delivering commands to workers.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    /// Create a unit on some worker and wait for the stored record.
    ///
    /// # Errors
    ///
    /// Returns the worker's error, or `ControlError::DispatchFailed` if no
    /// worker could be reached.
    async fn create_unit(&self, ctx: &RequestContext, request: CreateUnitRequest) -> Result<Unit>;

    /// Hand `command` to the worker for `host` without waiting for it to run.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::DispatchFailed` if the worker did not accept
    /// the command, or `ControlError::DispatchUnconfirmed` if it may have.
    async fn cast(&self, host: &HostId, command: UnitCommand) -> Result<()>;
}

fn agent_error(host: &HostId, err: AgentError) -> ControlError {
    match err {
        AgentError::Mediator(e) => e.into(),
        other => ControlError::DispatchFailed {
            host: host.clone(),
            reason: other.to_string(),
        },
    }
}

// ============================================================================
// In-process
// ============================================================================

/// Dispatcher for the worker running in this process.
#[derive(Clone)]
pub struct LocalDispatcher {
    worker: WorkerHandle,
}

impl LocalDispatcher {
    /// Create a dispatcher around a worker handle.
    #[must_use]
    pub const fn new(worker: WorkerHandle) -> Self {
        Self { worker }
    }

    /// The host served by the local worker.
    #[must_use]
    pub fn host(&self) -> &HostId {
        self.worker.host()
    }
}

#[async_trait]
impl Dispatcher for LocalDispatcher {
    async fn create_unit(&self, ctx: &RequestContext, request: CreateUnitRequest) -> Result<Unit> {
        self.worker
            .create(ctx, request)
            .await
            .map_err(|e| agent_error(self.host(), e))
    }

    async fn cast(&self, host: &HostId, command: UnitCommand) -> Result<()> {
        if host != self.host() {
            return Err(ControlError::DispatchFailed {
                host: host.clone(),
                reason: format!("local worker serves {}", self.host()),
            });
        }
        self.worker.cast(command).map_err(|e| agent_error(host, e))
    }
}

// ============================================================================
// Over the RPC channel
// ============================================================================

/// Dispatcher that posts agent RPC requests over HTTP.
#[derive(Debug)]
pub struct HttpDispatcher {
    client: reqwest::Client,
    routes: BTreeMap<HostId, String>,
    timeout: Duration,
    next: AtomicUsize,
}

impl HttpDispatcher {
    /// Create a dispatcher for the given host → base URL table.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::Internal` if the HTTP client cannot be created.
    pub fn new(routes: BTreeMap<HostId, String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5).min(timeout))
            .build()
            .map_err(|e| ControlError::Internal(format!("failed to create HTTP client: {e}")))?;

        Ok(Self::with_client(client, routes, timeout))
    }

    /// Create a dispatcher with a custom reqwest client.
    #[must_use]
    pub fn with_client(
        client: reqwest::Client,
        routes: BTreeMap<HostId, String>,
        timeout: Duration,
    ) -> Self {
        let routes = routes
            .into_iter()
            .map(|(host, url)| (host, url.trim_end_matches('/').to_string()))
            .collect();
        Self {
            client,
            routes,
            timeout,
            next: AtomicUsize::new(0),
        }
    }

    /// The host → base URL table.
    #[must_use]
    pub const fn routes(&self) -> &BTreeMap<HostId, String> {
        &self.routes
    }

    fn url_for(&self, host: &HostId) -> Result<&str> {
        self.routes
            .get(host)
            .map(String::as_str)
            .ok_or_else(|| ControlError::DispatchFailed {
                host: host.clone(),
                reason: "no route to host".to_string(),
            })
    }

    /// Round-robin choice of the agent that receives the next creation.
    fn next_host(&self) -> Result<&HostId> {
        if self.routes.is_empty() {
            return Err(ControlError::Internal("no agent routes configured".to_string()));
        }
        let index = self.next.fetch_add(1, Ordering::Relaxed) % self.routes.len();
        self.routes
            .keys()
            .nth(index)
            .ok_or_else(|| ControlError::Internal("agent route table changed".to_string()))
    }

    /// Post one request. The outer error is a delivery failure; the inner
    /// one is the agent's answer.
    ///
    /// A request that never got a connection fails with `DispatchFailed`.
    /// Once it may have reached the agent, a timeout or an unreadable answer
    /// fails with `DispatchUnconfirmed`.
    async fn post<A, T>(
        &self,
        host: &HostId,
        method: &str,
        args: &A,
    ) -> Result<std::result::Result<T, RpcError>>
    where
        A: Serialize + Sync,
        T: DeserializeOwned,
    {
        let url = format!("{}/rpc", self.url_for(host)?);
        let version = protocol::version_of(method)
            .ok_or_else(|| ControlError::Internal(format!("unknown agent method: {method}")))?;
        let request = RpcRequest::new(method, version, args)
            .map_err(|e| ControlError::Internal(e.to_string()))?;

        tracing::debug!(host = %host, method = %method, url = %url, "Agent RPC call");

        let unconfirmed = |reason: String| ControlError::DispatchUnconfirmed {
            host: host.clone(),
            reason,
        };

        let response = self
            .client
            .post(&url)
            .timeout(self.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                let reason = format!("{method}: {e}");
                if e.is_connect() || e.is_builder() {
                    ControlError::DispatchFailed {
                        host: host.clone(),
                        reason,
                    }
                } else {
                    unconfirmed(reason)
                }
            })?;

        let status = response.status();
        let body = response.json::<RpcResponse>().await.map_err(|e| {
            unconfirmed(format!(
                "{method}: undecodable response (status {status}): {e}"
            ))
        })?;

        Ok(body.into_result())
    }
}

#[async_trait]
impl Dispatcher for HttpDispatcher {
    async fn create_unit(&self, ctx: &RequestContext, request: CreateUnitRequest) -> Result<Unit> {
        let host = self.next_host()?;
        let args = CreateUnitArgs {
            context: ctx.clone(),
            request,
        };

        self.post::<_, Unit>(host, CREATE_UNIT, &args)
            .await?
            .map_err(|e| match e.kind {
                RpcErrorKind::BadRequest => ControlError::InvalidRequest(e.message),
                _ => decode_error(e).into(),
            })
    }

    async fn cast(&self, host: &HostId, command: UnitCommand) -> Result<()> {
        let method = protocol::method_for(command.action);
        let args = UnitArgs {
            unit_id: command.unit_id,
        };

        let accepted = self
            .post::<_, Accepted>(host, method, &args)
            .await?
            .map_err(|e| {
                tracing::warn!(
                    host = %host,
                    unit_id = %command.unit_id,
                    kind = %e.kind,
                    error = %e.message,
                    "Agent rejected command"
                );
                ControlError::DispatchFailed {
                    host: host.clone(),
                    reason: format!("{method}: {}", e.message),
                }
            })?;

        if accepted.accepted {
            Ok(())
        } else {
            Err(ControlError::DispatchFailed {
                host: host.clone(),
                reason: format!("{method}: not accepted"),
            })
        }
    }
}

// ============================================================================
// Routing
// ============================================================================

/// Sends commands for the local host in-process and everything else over HTTP.
///
/// Creations rotate over the local worker and every routed agent, so with
/// `n` routes the local worker receives one creation in `n + 1`. The remote
/// share is itself spread round-robin by the `HttpDispatcher`.
pub struct RoutingDispatcher {
    local: Option<LocalDispatcher>,
    remote: HttpDispatcher,
    next: AtomicUsize,
}

impl RoutingDispatcher {
    /// Create a routing dispatcher.
    #[must_use]
    pub const fn new(local: Option<LocalDispatcher>, remote: HttpDispatcher) -> Self {
        Self {
            local,
            remote,
            next: AtomicUsize::new(0),
        }
    }

    /// Build from configuration, using `worker` for the local host if given.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::Internal` if the HTTP client cannot be created.
    pub fn from_config(config: &ControlConfig, worker: Option<WorkerHandle>) -> Result<Self> {
        let remote = HttpDispatcher::new(config.agent_routes.clone(), config.dispatch_timeout())?;
        Ok(Self::new(worker.map(LocalDispatcher::new), remote))
    }

    fn local_for(&self, host: &HostId) -> Option<&LocalDispatcher> {
        self.local.as_ref().filter(|local| local.host() == host)
    }
}

#[async_trait]
impl Dispatcher for RoutingDispatcher {
    async fn create_unit(&self, ctx: &RequestContext, request: CreateUnitRequest) -> Result<Unit> {
        let Some(local) = &self.local else {
            return self.remote.create_unit(ctx, request).await;
        };

        let slots = self.remote.routes().len() + 1;
        if self.next.fetch_add(1, Ordering::Relaxed) % slots == 0 {
            local.create_unit(ctx, request).await
        } else {
            self.remote.create_unit(ctx, request).await
        }
    }

    async fn cast(&self, host: &HostId, command: UnitCommand) -> Result<()> {
        match self.local_for(host) {
            Some(local) => local.cast(host, command).await,
            None => self.remote.cast(host, command).await,
        }
    }
}
