//! Focuser configuration.

use std::path::Path;
use std::time::Duration;

use auxbridge_link::LinkConfig;
use auxbridge_protocol::MAX_MOVE_RATE;
use serde::{Deserialize, Serialize};

use crate::error::FocuserConfigError;

/// Interval between completion polls while the focuser moves.
pub const POLL_INTERVAL_MS: u64 = 500;
/// Longest accepted poll interval.
pub const MAX_POLL_INTERVAL_MS: u64 = 60_000;
/// Motor speed used when a move does not name one.
pub const DEFAULT_SPEED: u8 = 5;

/// Configuration for the focuser service and command-line tool.
///
/// ```yaml
/// link:
///   response_timeout_ms: 1500
/// poll_interval_ms: 250
/// default_speed: 7
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FocuserConfig {
    /// Link timing and retry settings.
    pub link: LinkConfig,
    /// How often to ask a moving focuser whether it has arrived.
    pub poll_interval_ms: u64,
    /// Speed (1-9) for moves that do not specify one.
    pub default_speed: u8,
}

impl Default for FocuserConfig {
    fn default() -> Self {
        FocuserConfig {
            link: LinkConfig::default(),
            poll_interval_ms: POLL_INTERVAL_MS,
            default_speed: DEFAULT_SPEED,
        }
    }
}

impl FocuserConfig {
    /// Parse a YAML document. Missing fields take their defaults.
    pub fn from_yaml(yaml: &str) -> Result<Self, FocuserConfigError> {
        let config: FocuserConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a YAML config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, FocuserConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| FocuserConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&text)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.min(MAX_POLL_INTERVAL_MS))
    }

    pub fn validate(&self) -> Result<(), FocuserConfigError> {
        self.link.validate()?;
        if self.poll_interval_ms == 0 {
            return Err(FocuserConfigError::ZeroPollInterval);
        }
        if self.poll_interval_ms > MAX_POLL_INTERVAL_MS {
            return Err(FocuserConfigError::PollIntervalTooLong(self.poll_interval_ms));
        }
        if !(1..=MAX_MOVE_RATE).contains(&self.default_speed) {
            return Err(FocuserConfigError::InvalidSpeed(self.default_speed));
        }
        Ok(())
    }
}
