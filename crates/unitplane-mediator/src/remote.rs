//! HTTP client for a mediator running in another process.
//!
//! Each call posts an `RpcRequest` to `{base_url}/rpc`. A call that does not
//! complete within the configured timeout, or cannot connect at all, fails
//! with `MediatorError::Unreachable` and never takes the caller down.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use unitplane_core::{RpcRequest, RpcResponse, UnitId};
use unitplane_store::{ListFilter, NewUnit, Unit, UnitValues, UpdateCondition};

use crate::error::{MediatorError, Result};
use crate::protocol::{
    self, method, CreateArgs, IdArgs, ListArgs, NameArgs, UpdateArgs, UpdateIfArgs,
};
use crate::Mediator;

/// Mediator that forwards every operation over the RPC channel.
#[derive(Debug, Clone)]
pub struct RemoteMediator {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl RemoteMediator {
    /// Create a remote mediator.
    ///
    /// # Arguments
    ///
    /// * `base_url` - The base URL of the mediator service (e.g., "http://mediator:8090")
    /// * `timeout` - Upper bound on each call, including the response body
    ///
    /// # Errors
    ///
    /// Returns `MediatorError::Config` if the HTTP client cannot be created.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5).min(timeout))
            .build()
            .map_err(|e| MediatorError::Config(format!("failed to create HTTP client: {e}")))?;

        Ok(Self::with_client(client, base_url, timeout))
    }

    /// Create a remote mediator with a custom reqwest client.
    #[must_use]
    pub fn with_client(
        client: reqwest::Client,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        }
    }

    /// Get the base URL of the mediator service.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Get the per-call timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Ping with an explicit timeout instead of the configured one.
    ///
    /// # Errors
    ///
    /// Returns `MediatorError::Unreachable` if the server does not answer in time.
    pub async fn ping_with_timeout(&self, timeout: Duration) -> Result<()> {
        self.call_with_timeout(method::PING, &(), timeout).await
    }

    async fn call<A, T>(&self, name: &str, args: &A) -> Result<T>
    where
        A: Serialize + Sync,
        T: DeserializeOwned,
    {
        self.call_with_timeout(name, args, self.timeout).await
    }

    async fn call_with_timeout<A, T>(&self, name: &str, args: &A, timeout: Duration) -> Result<T>
    where
        A: Serialize + Sync,
        T: DeserializeOwned,
    {
        let version = protocol::version_of(name)?;
        let request = RpcRequest::new(name, version, args)
            .map_err(|e| MediatorError::Protocol(e.to_string()))?;
        let url = format!("{}/rpc", self.base_url);

        tracing::debug!(method = %name, version = %version, url = %url, "Mediator RPC call");

        let response = self
            .client
            .post(&url)
            .timeout(timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| MediatorError::Unreachable(format!("{name}: {e}")))?;

        let status = response.status();
        let body = response.json::<RpcResponse>().await.map_err(|e| {
            if e.is_timeout() {
                MediatorError::Unreachable(format!("{name}: {e}"))
            } else {
                MediatorError::Protocol(format!(
                    "{name}: undecodable response (status {status}): {e}"
                ))
            }
        })?;

        body.into_result().map_err(|e| {
            tracing::debug!(method = %name, kind = %e.kind, "Mediator RPC returned error");
            protocol::decode_error(e)
        })
    }
}

#[async_trait]
impl Mediator for RemoteMediator {
    async fn list_filtered(&self, filter: &ListFilter) -> Result<Vec<Unit>> {
        self.call(method::LIST, &ListArgs::from(filter)).await
    }

    async fn get_by_name(&self, name: &str) -> Result<Vec<Unit>> {
        self.call(
            method::GET_BY_NAME,
            &NameArgs {
                name: name.to_string(),
            },
        )
        .await
    }

    async fn get_by_id(&self, unit_id: &UnitId) -> Result<Unit> {
        self.call(method::GET_BY_ID, &IdArgs { id: *unit_id }).await
    }

    async fn create(&self, unit: NewUnit) -> Result<Unit> {
        self.call(method::CREATE, &CreateArgs { unit }).await
    }

    async fn update(&self, unit_id: &UnitId, values: &UnitValues) -> Result<Unit> {
        self.call(
            method::UPDATE,
            &UpdateArgs {
                id: *unit_id,
                values: values.clone(),
            },
        )
        .await
    }

    async fn update_if(
        &self,
        unit_id: &UnitId,
        condition: &UpdateCondition,
        values: &UnitValues,
    ) -> Result<Unit> {
        self.call(
            method::UPDATE_IF,
            &UpdateIfArgs {
                id: *unit_id,
                condition: condition.clone(),
                values: values.clone(),
            },
        )
        .await
    }

    async fn destroy(&self, unit_id: &UnitId) -> Result<u32> {
        self.call(method::DESTROY, &IdArgs { id: *unit_id }).await
    }

    async fn ping(&self) -> Result<()> {
        self.call(method::PING, &()).await
    }
}
