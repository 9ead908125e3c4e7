//! Link timing and retry configuration.

use std::time::Duration;

use auxbridge_protocol::Target;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Inactivity gap that ends a frame.
pub const QUIET_INTERVAL_MS: u64 = 100;
/// Per-attempt deadline for a response.
pub const TIMEOUT_MS: u64 = 2000;
/// Attempts made by `send_command` before giving up.
pub const RETRY_COUNT: u32 = 3;
/// Largest accepted per-attempt deadline.
pub const MAX_RESPONSE_TIMEOUT_MS: u64 = 60_000;

/// Configuration for a [`Communicator`](crate::Communicator).
///
/// All fields have defaults, so a config file only needs the values it
/// changes:
///
/// ```yaml
/// response_timeout_ms: 1500
/// retry_count: 5
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Local address: source of every request, destination of every response.
    pub source: Target,
    /// Inactivity gap (milliseconds) after which collected bytes form a frame.
    pub quiet_interval_ms: u64,
    /// Overall deadline (milliseconds) for one attempt.
    pub response_timeout_ms: u64,
    /// Maximum attempts per command.
    pub retry_count: u32,
}

impl Default for LinkConfig {
    fn default() -> Self {
        LinkConfig {
            source: Target::App,
            quiet_interval_ms: QUIET_INTERVAL_MS,
            response_timeout_ms: TIMEOUT_MS,
            retry_count: RETRY_COUNT,
        }
    }
}

impl LinkConfig {
    /// Set the local address.
    pub fn with_source(mut self, source: Target) -> Self {
        self.source = source;
        self
    }

    /// Set the quiet interval.
    pub fn with_quiet_interval_ms(mut self, quiet_interval_ms: u64) -> Self {
        self.quiet_interval_ms = quiet_interval_ms;
        self
    }

    /// Set the per-attempt response timeout.
    pub fn with_response_timeout_ms(mut self, response_timeout_ms: u64) -> Self {
        self.response_timeout_ms = response_timeout_ms;
        self
    }

    /// Set the maximum number of attempts.
    pub fn with_retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = retry_count;
        self
    }

    /// Quiet interval as a duration, capped at [`MAX_RESPONSE_TIMEOUT_MS`].
    pub fn quiet_interval(&self) -> Duration {
        Duration::from_millis(self.quiet_interval_ms.min(MAX_RESPONSE_TIMEOUT_MS))
    }

    /// Response timeout as a duration, capped at [`MAX_RESPONSE_TIMEOUT_MS`].
    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms.min(MAX_RESPONSE_TIMEOUT_MS))
    }

    /// Worst-case duration of one `send_command` call.
    pub fn worst_case_latency(&self) -> Duration {
        self.response_timeout() * self.retry_count
    }

    /// Check that the values describe a usable link.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retry_count == 0 {
            return Err(ConfigError::ZeroRetries);
        }
        if self.quiet_interval_ms == 0 {
            return Err(ConfigError::ZeroQuietInterval);
        }
        if self.response_timeout_ms > MAX_RESPONSE_TIMEOUT_MS {
            return Err(ConfigError::TimeoutTooLong(self.response_timeout_ms));
        }
        if self.quiet_interval_ms >= self.response_timeout_ms {
            return Err(ConfigError::QuietIntervalTooLong {
                quiet_ms: self.quiet_interval_ms,
                timeout_ms: self.response_timeout_ms,
            });
        }
        Ok(())
    }
}
