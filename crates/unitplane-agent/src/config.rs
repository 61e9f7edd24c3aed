//! Agent configuration.

use std::time::Duration;

use unitplane_core::HostId;

use crate::error::{AgentError, Result};
use crate::work::WorkDurations;
use crate::worker::DEFAULT_QUEUE_CAPACITY;

/// Configuration for the agent process.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Host name units created here are assigned to.
    pub host: HostId,
    /// Address the RPC server binds to.
    pub listen_addr: String,
    /// Database directory for the local mediator backend.
    pub data_dir: String,
    /// Worker queue capacity.
    pub queue_capacity: usize,
    /// Simulated transition durations.
    pub durations: WorkDurations,
}

impl AgentConfig {
    /// Load configuration from environment variables.
    ///
    /// `AGENT_HOST` falls back to the `HOSTNAME` variable, then to `localhost`.
    ///
    /// # Errors
    ///
    /// Returns `AgentError::Config` if the host name is invalid.
    pub fn from_env() -> Result<Self> {
        let host = std::env::var("AGENT_HOST")
            .or_else(|_| std::env::var("HOSTNAME"))
            .unwrap_or_else(|_| "localhost".to_string());
        let host = HostId::new(host).map_err(|e| AgentError::Config(e.to_string()))?;

        let mut config = Self {
            host,
            listen_addr: "0.0.0.0:8081".to_string(),
            data_dir: "/data".to_string(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            durations: WorkDurations::default(),
        };

        if let Ok(val) = std::env::var("LISTEN_ADDR") {
            config.listen_addr = val;
        }
        if let Ok(val) = std::env::var("DATA_DIR") {
            config.data_dir = val;
        }
        if let Ok(val) = std::env::var("WORKER_QUEUE_CAPACITY") {
            if let Ok(n) = val.parse() {
                config.queue_capacity = n;
            }
        }
        if let Some(d) = secs_var("ACTIVATE_SECS") {
            config.durations.activate = d;
        }
        if let Some(d) = secs_var("DEACTIVATE_SECS") {
            config.durations.deactivate = d;
        }
        if let Some(d) = secs_var("START_SECS") {
            config.durations.start = d;
        }
        if let Some(d) = secs_var("STOP_SECS") {
            config.durations.stop = d;
        }

        Ok(config)
    }
}

fn secs_var(name: &str) -> Option<Duration> {
    std::env::var(name)
        .ok()
        .and_then(|val| val.parse::<f64>().ok())
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map(Duration::from_secs_f64)
}
