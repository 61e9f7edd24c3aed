//! Lifecycle client configuration.

use std::collections::BTreeMap;
use std::time::Duration;

use unitplane_core::HostId;

use crate::error::{ControlError, Result};

/// Configuration for the lifecycle client and its dispatcher.
#[derive(Debug, Clone)]
pub struct ControlConfig {
    /// Host of the worker running in this process, if any.
    pub local_host: Option<HostId>,
    /// Base URL of the agent serving each remote host.
    pub agent_routes: BTreeMap<HostId, String>,
    /// Per-request timeout for agent RPC calls in seconds.
    pub dispatch_timeout_secs: u64,
    /// Age after which a unit still carrying a task marker counts as stuck.
    pub stuck_threshold_secs: u64,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            local_host: None,
            agent_routes: BTreeMap::new(),
            dispatch_timeout_secs: 10,
            stuck_threshold_secs: 300,
        }
    }
}

impl ControlConfig {
    /// Load configuration from environment variables.
    ///
    /// `AGENT_ROUTES` has the form `host=url,host=url`.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::Config` if a host name or route entry is invalid.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("AGENT_HOST") {
            config.local_host =
                Some(HostId::new(val).map_err(|e| ControlError::Config(e.to_string()))?);
        }
        if let Ok(val) = std::env::var("AGENT_ROUTES") {
            config.agent_routes = parse_routes(&val)?;
        }
        if let Ok(val) = std::env::var("DISPATCH_TIMEOUT_SECS") {
            if let Ok(secs) = val.parse() {
                config.dispatch_timeout_secs = secs;
            }
        }
        if let Ok(val) = std::env::var("STUCK_THRESHOLD_SECS") {
            if let Ok(secs) = val.parse() {
                config.stuck_threshold_secs = secs;
            }
        }

        Ok(config)
    }

    /// Get the dispatch timeout as a `Duration`.
    #[must_use]
    pub const fn dispatch_timeout(&self) -> Duration {
        Duration::from_secs(self.dispatch_timeout_secs)
    }

    /// Get the stuck threshold as a `Duration`.
    #[must_use]
    pub const fn stuck_threshold(&self) -> Duration {
        Duration::from_secs(self.stuck_threshold_secs)
    }
}

/// Parse a `host=url,host=url` route table. Empty entries are skipped.
///
/// # Errors
///
/// Returns `ControlError::Config` for an entry without `=`, with an empty
/// URL, or with an invalid host name.
pub fn parse_routes(value: &str) -> Result<BTreeMap<HostId, String>> {
    let mut routes = BTreeMap::new();

    for entry in value.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (host, url) = entry
            .split_once('=')
            .ok_or_else(|| ControlError::Config(format!("route without '=': {entry}")))?;
        let url = url.trim();
        if url.is_empty() {
            return Err(ControlError::Config(format!("route without url: {entry}")));
        }
        let host = HostId::new(host.trim()).map_err(|e| ControlError::Config(e.to_string()))?;
        routes.insert(host, url.to_string());
    }

    Ok(routes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ControlConfig::default();
        assert!(config.local_host.is_none());
        assert!(config.agent_routes.is_empty());
        assert_eq!(config.dispatch_timeout(), Duration::from_secs(10));
        assert_eq!(config.stuck_threshold(), Duration::from_secs(300));
    }

    #[test]
    fn routes_parse() {
        let routes =
            parse_routes("agent-1=http://10.0.0.1:8081, agent-2 = http://10.0.0.2:8081 ,").unwrap();
        assert_eq!(routes.len(), 2);
        assert_eq!(
            routes[&HostId::new("agent-2").unwrap()],
            "http://10.0.0.2:8081"
        );
        assert!(parse_routes("").unwrap().is_empty());
    }

    #[test]
    fn bad_routes_are_rejected() {
        assert!(matches!(
            parse_routes("agent-1"),
            Err(ControlError::Config(_))
        ));
        assert!(matches!(
            parse_routes("agent-1="),
            Err(ControlError::Config(_))
        ));
        assert!(matches!(
            parse_routes("=http://x"),
            Err(ControlError::Config(_))
        ));
    }
}
