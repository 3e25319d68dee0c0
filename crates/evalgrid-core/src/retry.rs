//! Bounded retry with exponential backoff.
//!
//! Eligibility is decided by [`CallError::is_retryable`], so the policy works
//! for any fallible async operation, not just HTTP.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::CallError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Treated as at least 1.
    pub max_attempts: u32,
    /// Wait after the first failure; doubles after each further failure.
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    /// Randomize each wait into `[backoff / 2, backoff]`.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(10),
            jitter: false,
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no waiting.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub fn with_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_backoff = initial;
        self.max_backoff = max;
        self
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Wait before the attempt following failed attempt `failed_attempt` (1-based).
    pub fn backoff_for(&self, failed_attempt: u32) -> Duration {
        let exp = failed_attempt.saturating_sub(1).min(31);
        let base = self
            .initial_backoff
            .saturating_mul(1u32 << exp)
            .min(self.max_backoff);
        if self.jitter && !base.is_zero() {
            use rand::Rng;
            let ms = base.as_millis() as u64;
            Duration::from_millis(rand::thread_rng().gen_range(ms / 2..=ms))
        } else {
            base
        }
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or the
    /// attempt budget is spent. The last error is returned unchanged.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T, CallError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, CallError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    let mut backoff = self.backoff_for(attempt);
                    if let Some(retry_after) = e.retry_after {
                        backoff = backoff.max(retry_after.min(self.max_backoff));
                    }
                    warn!(
                        error = %e,
                        kind = %e.kind,
                        attempt = attempt,
                        max_attempts = max_attempts,
                        backoff_ms = backoff.as_millis() as u64,
                        "retrying request"
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
