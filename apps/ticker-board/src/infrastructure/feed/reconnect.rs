//! Reconnection Backoff
//!
//! Exponential backoff with jitter between WebSocket connection attempts.
//! The attempt budget is reset after every successful link.

use std::time::Duration;

use rand::Rng;

use crate::application::ports::FeedError;
use crate::infrastructure::config::ReconnectSettings;

/// Jitter applied around each computed delay (±10%).
const DEFAULT_JITTER: f64 = 0.1;

/// Backoff parameters.
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Upper bound for any delay.
    pub max_delay: Duration,
    /// Growth factor between consecutive delays.
    pub multiplier: f64,
    /// Fraction of the delay randomized in either direction.
    pub jitter: f64,
    /// Attempts allowed before giving up (0 = unlimited).
    pub max_attempts: u32,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self::from_settings(&ReconnectSettings::default())
    }
}

impl BackoffConfig {
    /// Build from configuration.
    #[must_use]
    pub const fn from_settings(settings: &ReconnectSettings) -> Self {
        Self {
            initial_delay: settings.delay_initial,
            max_delay: settings.delay_max,
            multiplier: settings.delay_multiplier,
            jitter: DEFAULT_JITTER,
            max_attempts: settings.max_attempts,
        }
    }

    /// Same configuration without randomization.
    #[must_use]
    pub const fn without_jitter(mut self) -> Self {
        self.jitter = 0.0;
        self
    }
}

/// Tracks consecutive failed attempts and hands out the next delay.
#[derive(Debug)]
pub struct ReconnectPolicy {
    config: BackoffConfig,
    base: Duration,
    attempts: u32,
}

impl ReconnectPolicy {
    /// Create a policy at its initial delay.
    #[must_use]
    pub const fn new(config: BackoffConfig) -> Self {
        let base = config.initial_delay;
        Self {
            config,
            base,
            attempts: 0,
        }
    }

    /// Count one failed attempt and return how long to wait before the
    /// next one.
    ///
    /// # Errors
    ///
    /// Returns [`ReconnectError::Exhausted`] once the attempt budget is spent.
    pub fn next_delay(&mut self) -> Result<Duration, ReconnectError> {
        if !self.should_retry() {
            return Err(ReconnectError::Exhausted {
                attempts: self.attempts,
            });
        }

        self.attempts += 1;
        let delay = self.jittered(self.base);
        self.base = grow(self.base, self.config.multiplier).min(self.config.max_delay);
        Ok(delay)
    }

    /// Forget previous failures after a successful connection.
    pub const fn reset(&mut self) {
        self.base = self.config.initial_delay;
        self.attempts = 0;
    }

    /// Failed attempts since the last reset.
    #[must_use]
    pub const fn attempt_count(&self) -> u32 {
        self.attempts
    }

    /// Whether another attempt is allowed.
    #[must_use]
    pub const fn should_retry(&self) -> bool {
        self.config.max_attempts == 0 || self.attempts < self.config.max_attempts
    }

    fn jittered(&self, delay: Duration) -> Duration {
        if self.config.jitter <= 0.0 {
            return delay;
        }

        let base = delay.as_secs_f64();
        let spread = base * self.config.jitter;
        let offset: f64 = rand::rng().random_range(-spread..=spread);
        Duration::from_secs_f64((base + offset).max(0.001))
    }
}

fn grow(delay: Duration, multiplier: f64) -> Duration {
    let scaled = delay.as_secs_f64() * multiplier;
    if scaled.is_finite() && scaled > 0.0 {
        Duration::try_from_secs_f64(scaled).unwrap_or(Duration::MAX)
    } else {
        Duration::ZERO
    }
}

/// Error type for reconnection failures.
#[derive(Debug, thiserror::Error)]
pub enum ReconnectError {
    /// The attempt budget is spent.
    #[error("maximum reconnection attempts ({attempts}) exceeded")]
    Exhausted {
        /// Attempts made.
        attempts: u32,
    },
}

impl From<ReconnectError> for FeedError {
    fn from(err: ReconnectError) -> Self {
        match err {
            ReconnectError::Exhausted { attempts } => Self::ReconnectExhausted { attempts },
        }
    }
}
