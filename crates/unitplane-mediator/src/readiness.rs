//! Startup readiness wait for a remote mediator.
//!
//! The first few pings use a short timeout so a mediator that is already up
//! is detected quickly. After that the full timeout applies, with an
//! exponential backoff between attempts.

use std::time::Duration;

use crate::error::{MediatorError, Result};
use crate::remote::RemoteMediator;

/// Readiness retry policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadinessConfig {
    /// Ping timeout for the first `early_attempts` tries.
    pub early_timeout: Duration,
    /// Number of tries that use `early_timeout`.
    pub early_attempts: u32,
    /// Ping timeout once the early tries are used up.
    pub timeout: Duration,
    /// Give up after this many tries; `None` waits forever.
    pub max_attempts: Option<u32>,
    /// Pause after the first failed try.
    pub initial_backoff: Duration,
    /// Upper bound on the pause between tries.
    pub max_backoff: Duration,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            early_timeout: Duration::from_secs(10),
            early_attempts: 10,
            timeout: Duration::from_secs(60),
            max_attempts: None,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
        }
    }
}

impl ReadinessConfig {
    /// The ping timeout for the given 1-based attempt number.
    #[must_use]
    pub const fn timeout_for(&self, attempt: u32) -> Duration {
        if attempt <= self.early_attempts {
            self.early_timeout
        } else {
            self.timeout
        }
    }
}

/// Ping `mediator` until it answers. Returns the number of attempts used.
///
/// # Errors
///
/// Returns `MediatorError::Unreachable` once `max_attempts` is exhausted, or
/// any non-retriable error (such as a version mismatch) immediately.
pub async fn wait_until_ready(mediator: &RemoteMediator, config: &ReadinessConfig) -> Result<u32> {
    let mut backoff = config.initial_backoff;
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        match mediator.ping_with_timeout(config.timeout_for(attempt)).await {
            Ok(()) => {
                tracing::info!(
                    url = %mediator.base_url(),
                    attempts = attempt,
                    "Mediator is ready"
                );
                return Ok(attempt);
            }
            Err(e) if e.is_retriable() => {
                if config.max_attempts.is_some_and(|max| attempt >= max) {
                    return Err(MediatorError::Unreachable(format!(
                        "mediator at {} not ready after {attempt} attempts: {e}",
                        mediator.base_url()
                    )));
                }
                tracing::warn!(
                    url = %mediator.base_url(),
                    attempt,
                    retry_in_ms = u64::try_from(backoff.as_millis()).unwrap_or(u64::MAX),
                    error = %e,
                    "Mediator not ready, retrying"
                );
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(config.max_backoff);
            }
            Err(e) => return Err(e),
        }
    }
}
