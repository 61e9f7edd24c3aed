//! Mediator backend configuration and factory.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use unitplane_store::Store;

use crate::error::{MediatorError, Result};
use crate::local::LocalMediator;
use crate::readiness::{wait_until_ready, ReadinessConfig};
use crate::remote::RemoteMediator;
use crate::Mediator;

/// Which mediator implementation to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MediatorBackend {
    /// Call the store in-process.
    #[default]
    Local,
    /// Call a mediator server over RPC.
    Remote,
}

impl FromStr for MediatorBackend {
    type Err = MediatorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "remote" | "rpc" => Ok(Self::Remote),
            other => Err(MediatorError::Config(format!(
                "unknown mediator backend: {other:?} (expected \"local\" or \"remote\")"
            ))),
        }
    }
}

impl fmt::Display for MediatorBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Local => "local",
            Self::Remote => "remote",
        })
    }
}

/// Configuration for building a mediator.
#[derive(Debug, Clone)]
pub struct MediatorConfig {
    /// Backend selection.
    pub backend: MediatorBackend,
    /// Base URL of the mediator server (remote backend only).
    pub url: String,
    /// Per-call timeout in seconds (remote backend only).
    pub timeout_secs: u64,
    /// Wait for the remote mediator to answer a ping before returning it.
    pub wait_for_ready: bool,
    /// Readiness retry policy.
    pub readiness: ReadinessConfig,
}

impl Default for MediatorConfig {
    fn default() -> Self {
        Self {
            backend: MediatorBackend::Local,
            url: "http://127.0.0.1:8090".to_string(),
            timeout_secs: 60,
            wait_for_ready: true,
            readiness: ReadinessConfig::default(),
        }
    }
}

impl MediatorConfig {
    /// Load configuration from environment variables.
    ///
    /// Unparseable numeric values keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns `MediatorError::Config` if `MEDIATOR_BACKEND` names an unknown backend.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("MEDIATOR_BACKEND") {
            config.backend = val.parse()?;
        }
        if let Ok(val) = std::env::var("MEDIATOR_URL") {
            config.url = val;
        }
        if let Ok(val) = std::env::var("MEDIATOR_TIMEOUT_SECS") {
            if let Ok(n) = val.parse() {
                config.timeout_secs = n;
                config.readiness.timeout = Duration::from_secs(n);
            }
        }
        if let Ok(val) = std::env::var("MEDIATOR_EARLY_TIMEOUT_SECS") {
            if let Ok(n) = val.parse() {
                config.readiness.early_timeout = Duration::from_secs(n);
            }
        }
        if let Ok(val) = std::env::var("MEDIATOR_EARLY_ATTEMPTS") {
            if let Ok(n) = val.parse() {
                config.readiness.early_attempts = n;
            }
        }
        if let Ok(val) = std::env::var("MEDIATOR_MAX_ATTEMPTS") {
            if let Ok(n) = val.parse() {
                config.readiness.max_attempts = Some(n);
            }
        }
        if let Ok(val) = std::env::var("MEDIATOR_WAIT_FOR_READY") {
            config.wait_for_ready = !matches!(val.to_lowercase().as_str(), "0" | "false" | "no");
        }

        Ok(config)
    }

    /// Per-call timeout as a `Duration`.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Build the configured mediator.
///
/// `open_store` is only called for the local backend. For the remote backend
/// the call waits for the server to answer a ping when `wait_for_ready` is set.
///
/// # Errors
///
/// Returns the store's open error for the local backend, and
/// `MediatorError::Unreachable` if a remote mediator never became ready.
pub async fn build_mediator<S, F>(config: &MediatorConfig, open_store: F) -> Result<Arc<dyn Mediator>>
where
    S: Store + 'static,
    F: FnOnce() -> unitplane_store::Result<S>,
{
    tracing::info!(backend = %config.backend, "Building mediator");

    match config.backend {
        MediatorBackend::Local => {
            let store = Arc::new(open_store()?);
            Ok(Arc::new(LocalMediator::new(store)))
        }
        MediatorBackend::Remote => {
            let remote = RemoteMediator::new(config.url.clone(), config.timeout())?;
            if config.wait_for_ready {
                wait_until_ready(&remote, &config.readiness).await?;
            }
            Ok(Arc::new(remote))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use unitplane_store::RocksStore;

    #[test]
    fn backend_parse() {
        assert_eq!("local".parse::<MediatorBackend>().unwrap(), MediatorBackend::Local);
        assert_eq!(" Remote ".parse::<MediatorBackend>().unwrap(), MediatorBackend::Remote);
        assert!(matches!(
            "conductor.Plugin".parse::<MediatorBackend>(),
            Err(MediatorError::Config(_))
        ));
    }

    #[test]
    fn defaults() {
        let config = MediatorConfig::default();
        assert_eq!(config.backend, MediatorBackend::Local);
        assert_eq!(config.timeout(), Duration::from_secs(60));
        assert_eq!(config.readiness.early_attempts, 10);
        assert_eq!(config.readiness.early_timeout, Duration::from_secs(10));
    }

    #[tokio::test]
    async fn builds_local_backend() {
        let dir = TempDir::new().unwrap();
        let config = MediatorConfig::default();

        let mediator = build_mediator(&config, || RocksStore::open(dir.path()))
            .await
            .unwrap();
        mediator.ping().await.unwrap();
        assert!(mediator.list(false).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn remote_backend_does_not_open_store() {
        let config = MediatorConfig {
            backend: MediatorBackend::Remote,
            url: "http://127.0.0.1:9".to_string(),
            wait_for_ready: false,
            ..MediatorConfig::default()
        };

        let mediator = build_mediator(&config, || -> unitplane_store::Result<RocksStore> {
            panic!("store must not be opened for the remote backend")
        })
        .await
        .unwrap();
        drop(mediator);
    }
}
