//! Attempt budget and backoff for widget mutations.

use std::time::Duration;

use canvas_pilot_core::config::MacrosConfig;
use rand::Rng;

/// Jitter spread around the nominal delay (±25%).
const JITTER_FACTOR: f64 = 0.25;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts per mutation, including the first.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&MacrosConfig::default())
    }
}

impl From<&MacrosConfig> for RetryPolicy {
    fn from(config: &MacrosConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.retry_base_delay_ms),
            max_delay: Duration::from_millis(config.retry_max_delay_ms),
        }
    }
}

impl RetryPolicy {
    /// Retry immediately; used where timing is irrelevant.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Wait before retry number `retry` (0 for the wait after the first failure).
    pub fn delay(&self, retry: u32) -> Duration {
        let random = rand::rng().random::<f64>();
        Duration::from_millis(backoff_delay_ms(
            retry,
            self.base_delay.as_millis() as u64,
            self.max_delay.as_millis() as u64,
            random,
        ))
    }
}

/// `base * 2^retry`, capped at `max`, then spread by ±[`JITTER_FACTOR`].
///
/// `random` is a value in `[0.0, 1.0)`.
pub fn backoff_delay_ms(retry: u32, base_ms: u64, max_ms: u64, random: f64) -> u64 {
    let exponential = base_ms.saturating_mul(1u64 << retry.min(31));
    let capped = exponential.min(max_ms);
    let jitter = 1.0 + (random * 2.0 - 1.0) * JITTER_FACTOR;
    ((capped as f64) * jitter).round().max(0.0) as u64
}
