use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::assets::providers::FetchError;

/// Retry policy shared by image and speech lookups.
///
/// Attempt `n` (1-based) that fails with a retryable error waits
/// `initial × multiplier^(n-1)` capped at `max_backoff`, or longer when the server asked for it.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    /// Wait after the first failed attempt, in milliseconds.
    pub initial_backoff_ms: u64,
    /// Growth factor between consecutive waits.
    pub multiplier: f64,
    /// Upper bound for computed waits, in milliseconds.
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_backoff_ms: 500,
            multiplier: 2.0,
            max_backoff_ms: 8_000,
        }
    }
}

impl RetryPolicy {
    /// A policy that tries exactly once.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Computed wait after failed attempt `attempt` (1-based).
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(63) as i32;
        let mult = if self.multiplier.is_finite() && self.multiplier >= 1.0 {
            self.multiplier
        } else {
            1.0
        };
        let ms = (self.initial_backoff_ms as f64) * mult.powi(exp);
        let ms = ms.min(self.max_backoff_ms as f64).max(0.0);
        Duration::from_millis(ms as u64)
    }

    /// Run `op` until it succeeds, fails permanently or runs out of attempts.
    ///
    /// `op` receives the 1-based attempt number. The last error is returned unchanged.
    pub async fn run<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T, FetchError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        let max = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Ok(v) => return Ok(v),
                Err(e) if !e.is_retryable() || attempt >= max => return Err(e),
                Err(e) => {
                    let mut wait = self.backoff_for(attempt);
                    if let Some(server) = e.retry_after() {
                        wait = wait.max(server);
                    }
                    warn!(
                        what,
                        attempt,
                        max_attempts = max,
                        wait_ms = wait.as_millis() as u64,
                        error = %e,
                        "retrying upstream fetch"
                    );
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/assets/retry.rs"]
mod tests;
