//! Endpoint and retry configuration.
//!
//! Interval selection between reconnect attempts is configured here and
//! applied by the retry timer; the connection state machines never compute
//! backoff growth themselves. This keeps jitter/growth policy tunable
//! without touching lifecycle logic.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::addr::IpcAddr;

/// Strategy used to pick the delay before a reconnect attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RetryStrategy {
    /// Fixed delay between attempts.
    Fixed {
        /// Delay duration.
        #[serde(with = "humantime_serde")]
        delay: Duration,
    },

    /// Exponential backoff, bounded by `max_delay`.
    Exponential {
        /// Delay before the first retry.
        #[serde(with = "humantime_serde")]
        initial_delay: Duration,

        /// Upper bound on the computed delay.
        #[serde(with = "humantime_serde")]
        max_delay: Duration,

        /// Multiplier applied per attempt (default: 2.0).
        ///
        /// Must be finite and at least 1.0; anything else is rejected at
        /// deserialization time.
        #[serde(default = "default_multiplier", deserialize_with = "deserialize_multiplier")]
        multiplier: f64,
    },
}

const fn default_multiplier() -> f64 {
    2.0
}

fn deserialize_multiplier<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let multiplier = f64::deserialize(deserializer)?;
    if multiplier.is_finite() && multiplier >= 1.0 {
        Ok(multiplier)
    } else {
        Err(serde::de::Error::custom(format!(
            "retry multiplier must be finite and >= 1.0, got {multiplier}"
        )))
    }
}

impl Default for RetryStrategy {
    fn default() -> Self {
        Self::Exponential {
            initial_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

impl RetryStrategy {
    /// Calculate the delay for a given attempt number (1-based).
    ///
    /// Growth saturates at `max_delay`: endpoints retry indefinitely, so
    /// the attempt count is unbounded and the computed delay must stay
    /// valid for any attempt number.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        match self {
            Self::Fixed { delay } => *delay,
            Self::Exponential {
                initial_delay,
                max_delay,
                multiplier,
            } => {
                let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
                let delay_secs = initial_delay.as_secs_f64() * multiplier.powi(exponent);
                // Clamp in the float domain: a large exponent overflows to
                // infinity, which `Duration::from_secs_f64` rejects.
                if delay_secs.is_finite() && delay_secs < max_delay.as_secs_f64() {
                    Duration::from_secs_f64(delay_secs)
                } else {
                    *max_delay
                }
            },
        }
    }
}

/// Retry timer configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Delay selection strategy.
    #[serde(default)]
    pub strategy: RetryStrategy,

    /// Draw each delay uniformly from `[delay / 2, delay]` instead of using
    /// it verbatim, so that a burst of endpoints does not retry in
    /// lockstep.
    #[serde(default)]
    pub jitter: bool,
}

impl RetryConfig {
    /// Fixed-interval configuration without jitter.
    ///
    /// Primarily useful in tests that need deterministic timing.
    #[must_use]
    pub const fn fixed(delay: Duration) -> Self {
        Self {
            strategy: RetryStrategy::Fixed { delay },
            jitter: false,
        }
    }

    /// The interval to wait before the given (1-based) attempt.
    #[must_use]
    pub fn interval_for_attempt(&self, attempt: u32) -> Duration {
        let delay = self.strategy.delay_for_attempt(attempt);
        if self.jitter && !delay.is_zero() {
            let floor = delay / 2;
            floor + delay.mul_f64(0.5 * rand::random::<f64>())
        } else {
            delay
        }
    }
}

/// Configuration for a connect endpoint.
#[derive(Debug, Clone)]
pub struct ConnectConfig {
    /// Destination address to dial.
    pub addr: IpcAddr,

    /// Retry policy applied between failed attempts.
    pub retry: RetryConfig,
}

impl ConnectConfig {
    /// Configuration with the default retry policy.
    #[must_use]
    pub fn new(addr: IpcAddr) -> Self {
        Self {
            addr,
            retry: RetryConfig::default(),
        }
    }
}
