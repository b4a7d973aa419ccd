use std::time::Duration;

use scatter_core::config::RetryConfig;

/// Bounded exponential backoff for provider calls.
///
/// Delay for attempt `n` is `base * multiplier^n`, clamped to `max`.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retry attempts after the initial call.
    pub max_retries: u32,
    /// Initial delay before the first retry.
    pub base: Duration,
    /// Upper bound on the computed delay.
    pub max: Duration,
    /// Factor applied on each successive attempt.
    pub multiplier: f64,
}

impl RetryPolicy {
    /// Compute the delay duration for the given zero-based `attempt` number.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base_secs = self.base.as_secs_f64();
        // `attempt` is a small retry count, far below i32::MAX.
        #[allow(clippy::cast_possible_wrap)]
        let raw = base_secs * self.multiplier.powi(attempt as i32);
        let clamped = raw.min(self.max.as_secs_f64());
        Duration::from_secs_f64(clamped)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base: Duration::from_millis(200),
            max: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(cfg: &RetryConfig) -> Self {
        Self {
            max_retries: cfg.max_retries,
            base: Duration::from_millis(cfg.base_delay_ms),
            max: Duration::from_millis(cfg.max_delay_ms),
            multiplier: 2.0,
        }
    }
}
