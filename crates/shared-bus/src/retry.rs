//! # Retry Policy
//!
//! One config type for every retry loop in the gateway: the bounded
//! fixed-delay `connect()` at startup and the unbounded exponential
//! reconnect loop of the consumer.
//!
//! - `max_attempts`: total attempts, `None` = unlimited
//! - `initial_interval` / `max_interval`: first delay and the cap
//! - `multiplier`: growth per attempt (`1.0` = fixed delay)

use std::time::Duration;

use backoff::ExponentialBackoff;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: Option<u32>,
    #[serde(with = "humantime_serde")]
    pub initial_interval: Duration,
    #[serde(with = "humantime_serde")]
    pub max_interval: Duration,
    pub multiplier: f64,
    /// Jitter in `[0.0, 1.0]`; `0.2` means ±20%.
    pub randomization_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(Duration::from_secs(1), 5)
    }
}

impl RetryPolicy {
    /// Constant delay between a bounded number of attempts.
    pub fn fixed(delay: Duration, max_attempts: u32) -> Self {
        Self {
            max_attempts: Some(max_attempts),
            initial_interval: delay,
            max_interval: delay,
            multiplier: 1.0,
            randomization_factor: 0.0,
        }
    }

    /// Doubling delay capped at `max`, retrying forever.
    pub fn exponential(initial: Duration, max: Duration) -> Self {
        Self {
            max_attempts: None,
            initial_interval: initial,
            max_interval: max.max(initial),
            multiplier: 2.0,
            randomization_factor: 0.0,
        }
    }

    /// No delay at all. Used to drive retry paths in tests.
    pub fn immediate(max_attempts: Option<u32>) -> Self {
        Self {
            max_attempts,
            initial_interval: Duration::ZERO,
            max_interval: Duration::ZERO,
            multiplier: 1.0,
            randomization_factor: 0.0,
        }
    }

    /// Whether another attempt may follow attempt number `attempt` (1-based).
    pub fn allows_retry_after(&self, attempt: u32) -> bool {
        self.max_attempts.map_or(true, |max| attempt < max)
    }

    /// Build the delay generator for one retry loop.
    ///
    /// The generator never runs out; callers enforce `max_attempts`.
    pub fn build_backoff(&self) -> ExponentialBackoff {
        let initial = self.initial_interval;
        ExponentialBackoff {
            current_interval: initial,
            initial_interval: initial,
            max_interval: self.max_interval.max(initial),
            randomization_factor: self.randomization_factor.clamp(0.0, 1.0),
            multiplier: self.multiplier.max(1.0),
            max_elapsed_time: None,
            ..ExponentialBackoff::default()
        }
    }
}
