//! Call pacing. The runner awaits [`RateLimiter::acquire`] before every call.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::warn;

use crate::config::{ExperimentConfig, ThrottleConfig};

#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Wait until the next call may be sent.
    async fn acquire(&self);
}

/// Never waits.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unlimited;

#[async_trait]
impl RateLimiter for Unlimited {
    async fn acquire(&self) {}
}

/// Fixed pause between consecutive calls. The first call is not delayed.
#[derive(Debug)]
pub struct FixedDelay {
    delay: Duration,
    primed: Mutex<bool>,
}

impl FixedDelay {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            primed: Mutex::new(false),
        }
    }
}

#[async_trait]
impl RateLimiter for FixedDelay {
    async fn acquire(&self) {
        let mut primed = self.primed.lock().await;
        if *primed && !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        *primed = true;
    }
}

/// Token bucket: bursts up to `capacity`, then `refill_per_s` calls per second.
#[derive(Debug)]
pub struct TokenBucket {
    capacity: f64,
    refill_per_s: f64,
    state: Mutex<BucketState>,
}

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    /// Starts full. `capacity` is clamped to at least 1.
    pub fn new(capacity: u32, refill_per_s: f64) -> Self {
        let capacity = f64::from(capacity.max(1));
        Self {
            capacity,
            refill_per_s,
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
        }
    }
}

#[async_trait]
impl RateLimiter for TokenBucket {
    async fn acquire(&self) {
        let mut state = self.state.lock().await;
        loop {
            let now = Instant::now();
            let elapsed = now.saturating_duration_since(state.last_refill).as_secs_f64();
            state.tokens = (state.tokens + elapsed * self.refill_per_s).min(self.capacity);
            state.last_refill = now;

            if state.tokens >= 1.0 {
                state.tokens -= 1.0;
                return;
            }
            if self.refill_per_s <= 0.0 {
                // validated configs never get here; don't spin forever
                return;
            }
            let wait = (1.0 - state.tokens) / self.refill_per_s;
            match Duration::try_from_secs_f64(wait) {
                Ok(wait) => tokio::time::sleep(wait).await,
                Err(_) => {
                    warn!(refill_per_s = self.refill_per_s, "refill wait out of range, not pacing");
                    return;
                }
            }
        }
    }
}

/// Build the limiter selected by the config. No `throttle` section means a
/// fixed delay of `defaults.request_delay_s`.
pub fn limiter_for(cfg: &ExperimentConfig) -> Arc<dyn RateLimiter> {
    match &cfg.throttle {
        Some(ThrottleConfig::None) => Arc::new(Unlimited),
        Some(ThrottleConfig::TokenBucket {
            capacity,
            refill_per_s,
        }) => Arc::new(TokenBucket::new(*capacity, *refill_per_s)),
        Some(ThrottleConfig::Fixed { .. }) | None => {
            let delay = cfg.request_delay();
            if delay.is_zero() {
                Arc::new(Unlimited)
            } else {
                Arc::new(FixedDelay::new(delay))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn fixed_delay_skips_first_call() {
        let limiter = FixedDelay::new(Duration::from_secs(1));
        let start = Instant::now();
        limiter.acquire().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
        limiter.acquire().await;
        limiter.acquire().await;
        assert_eq!(start.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn zero_delay_never_waits() {
        let limiter = FixedDelay::new(Duration::ZERO);
        let start = Instant::now();
        for _ in 0..5 {
            limiter.acquire().await;
        }
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn token_bucket_bursts_then_paces() {
        let limiter = TokenBucket::new(3, 2.0);
        let start = Instant::now();
        for _ in 0..3 {
            limiter.acquire().await;
        }
        assert_eq!(start.elapsed(), Duration::ZERO);

        limiter.acquire().await;
        assert_eq!(start.elapsed(), Duration::from_millis(500));
        limiter.acquire().await;
        assert_eq!(start.elapsed(), Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn token_bucket_with_unrepresentable_wait_does_not_panic() {
        let limiter = TokenBucket::new(1, 1.0e-30);
        let start = Instant::now();
        limiter.acquire().await;
        limiter.acquire().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn token_bucket_refills_while_idle() {
        let limiter = TokenBucket::new(2, 1.0);
        limiter.acquire().await;
        limiter.acquire().await;
        tokio::time::sleep(Duration::from_secs(5)).await;

        let start = Instant::now();
        limiter.acquire().await;
        limiter.acquire().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    fn cfg_with(throttle: Option<ThrottleConfig>, delay: serde_json::Value) -> ExperimentConfig {
        let mut defaults = crate::config::Params::new();
        defaults.insert("request_delay_s".into(), delay);
        ExperimentConfig {
            base_url: "http://localhost".into(),
            api_key_env: "K".into(),
            models: vec![],
            defaults,
            replications: 1,
            scenarios: vec![],
            throttle,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn limiter_for_defaults_to_request_delay() {
        let limiter = limiter_for(&cfg_with(None, serde_json::json!(0.5)));
        let start = Instant::now();
        limiter.acquire().await;
        limiter.acquire().await;
        assert_eq!(start.elapsed(), Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn limiter_for_none_strategy_ignores_delay() {
        let limiter = limiter_for(&cfg_with(Some(ThrottleConfig::None), serde_json::json!(3)));
        let start = Instant::now();
        limiter.acquire().await;
        limiter.acquire().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }
}
