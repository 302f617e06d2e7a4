//! Jittered exponential backoff for optimistic-concurrency retries

use crate::config::RetryPolicyConfig;
use rand::Rng;
use std::time::Duration;

/// Computes per-attempt delays bounded by the configured windows
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryPolicyConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryPolicyConfig) -> Self {
        Self { config }
    }

    pub fn max_attempts(&self) -> u32 {
        self.config.maximum_attempts
    }

    /// Delay before retrying after the given zero-based attempt.
    ///
    /// Doubles from the minimum window, capped at the maximum, then jittered
    /// by ±`window_jitter` and clamped back into [min, max].
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let min = self.config.minimum_retry_window_ms as f64;
        let max = self.config.maximum_retry_window_ms as f64;
        let base = (min * 2f64.powi(attempt.min(32) as i32)).min(max);

        let jitter = self.config.window_jitter;
        let factor = if jitter > 0.0 {
            let mut rng = rand::thread_rng();
            1.0 + rng.gen_range(-jitter..=jitter)
        } else {
            1.0
        };
        let delayed = (base * factor).clamp(min, max);
        Duration::from_millis(delayed.round() as u64)
    }
}
