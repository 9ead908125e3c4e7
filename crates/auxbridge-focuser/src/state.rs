//! Focuser state snapshot and change notifications.

use serde::{Deserialize, Serialize};

use crate::config::DEFAULT_SPEED;

/// What the service currently knows about the focuser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FocuserState {
    /// The last exchange with the focuser succeeded.
    pub connected: bool,
    /// Last position read from the device.
    pub position: u32,
    /// Destination of the current goto, if any.
    pub target: Option<u32>,
    /// Speed used for continuous moves.
    pub speed: u8,
    /// A move was started and has not been seen to finish.
    pub moving: bool,
}

impl Default for FocuserState {
    fn default() -> Self {
        FocuserState {
            connected: false,
            position: 0,
            target: None,
            speed: DEFAULT_SPEED,
            moving: false,
        }
    }
}

/// Notifications published by the focuser service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum FocuserEvent {
    /// The focuser answered a version probe.
    Connected { version: String },
    /// An exchange failed and the focuser is considered gone.
    Disconnected,
    /// A move began. `target` is set for gotos and steps.
    MoveStarted { target: Option<u32> },
    /// The focuser reported that its move finished.
    TargetReached { position: u32 },
    /// A position read returned a new value.
    PositionChanged { position: u32 },
    /// A request to the focuser failed.
    CommandFailed { operation: String, error: String },
}
