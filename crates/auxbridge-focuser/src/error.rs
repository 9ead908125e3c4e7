//! Focuser error types.

use std::io;
use std::path::PathBuf;

use auxbridge_link::{CommandFailed, ConfigError, WriteError};
use auxbridge_protocol::Command;
use thiserror::Error;

/// Errors returned by focuser operations.
#[derive(Debug, Error)]
pub enum FocuserError {
    /// The focuser never gave a valid answer.
    #[error(transparent)]
    Command(#[from] CommandFailed),

    /// A fire-and-forget command could not be written.
    #[error("write failed: {0}")]
    Write(#[from] WriteError),

    /// Motor speed outside 1..=9.
    #[error("invalid speed {0}: must be between 1 and 9")]
    InvalidSpeed(u8),

    /// Position does not fit in 24 bits.
    #[error("invalid position {0}: must be at most 16777215")]
    InvalidPosition(u32),

    /// Backlash value outside 0..=99.
    #[error("invalid backlash {0}: must be at most 99")]
    InvalidBacklash(u8),

    /// The reply was valid but too short to interpret.
    #[error("{command} reply too short: expected {expected} bytes, got {actual}")]
    ShortReply {
        /// Command the reply belongs to.
        command: Command,
        /// Minimum bytes required.
        expected: usize,
        /// Bytes received.
        actual: usize,
    },

    /// The service has not established contact with the focuser.
    #[error("focuser not connected")]
    NotConnected,

    /// The service task has exited.
    #[error("focuser service stopped")]
    ServiceStopped,
}

impl FocuserError {
    /// Whether this error came from the bus rather than from argument checks.
    pub fn is_link_failure(&self) -> bool {
        matches!(self, FocuserError::Command(_) | FocuserError::Write(_))
    }
}

/// Errors loading or validating a [`FocuserConfig`](crate::FocuserConfig).
#[derive(Debug, Error)]
pub enum FocuserConfigError {
    /// Reading the config file failed.
    #[error("cannot read {path}: {source}")]
    Io {
        /// File that was read.
        path: PathBuf,
        /// Underlying error.
        source: io::Error,
    },

    /// The file is not valid YAML for this config.
    #[error("invalid config: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// Link settings are inconsistent.
    #[error(transparent)]
    Link(#[from] ConfigError),

    /// Default speed outside 1..=9.
    #[error("default_speed {0} out of range 1..=9")]
    InvalidSpeed(u8),

    /// Poll interval of zero.
    #[error("poll_interval_ms must be greater than zero")]
    ZeroPollInterval,

    /// Poll interval above one minute.
    #[error("poll_interval_ms ({0}) must not exceed 60000")]
    PollIntervalTooLong(u64),
}

/// Result type alias for focuser operations.
pub type FocuserResult<T> = Result<T, FocuserError>;
