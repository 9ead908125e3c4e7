//! Device addresses and command codes.
//!
//! Both sets are closed on the hardware side, but a host can still receive
//! bytes it does not recognise (a device we have no name for, or noise that
//! happens to checksum). Those decode to `Unknown(code)` so that the frame
//! parses and the caller decides what to do with it.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::error::ParseNameError;

/// A device address on the AUX bus.
///
/// Equality and hashing follow the wire code, so `Unknown(0x12)` is the
/// same address as `Focuser`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Target {
    /// Broadcast / unspecified.
    Any,
    /// Main board.
    Mb,
    /// Hand controller.
    Hc,
    /// Hand controller (NexStar+).
    Hcp,
    /// Azimuth / hour angle axis motor.
    Azm,
    /// Altitude / declination axis motor.
    Alt,
    /// Focuser motor.
    Focuser,
    /// Application (this host).
    App,
    /// NexRemote software.
    NexRemote,
    /// GPS unit.
    Gps,
    /// WiFi board.
    Wifi,
    /// Battery.
    Bat,
    /// Charger.
    Chg,
    /// Lighting controller.
    Light,
    /// An address not in the table above.
    Unknown(u8),
}

impl Target {
    /// Every named address, in wire-code order.
    pub const ALL: [Target; 14] = [
        Target::Any,
        Target::Mb,
        Target::Hc,
        Target::Hcp,
        Target::Azm,
        Target::Alt,
        Target::Focuser,
        Target::App,
        Target::NexRemote,
        Target::Gps,
        Target::Wifi,
        Target::Bat,
        Target::Chg,
        Target::Light,
    ];

    /// The wire code for this address.
    pub fn code(self) -> u8 {
        u8::from(self)
    }

    /// Short name used in logs and on the command line.
    pub fn name(self) -> Option<&'static str> {
        let name = match self {
            Target::Any => "any",
            Target::Mb => "mb",
            Target::Hc => "hc",
            Target::Hcp => "hcp",
            Target::Azm => "azm",
            Target::Alt => "alt",
            Target::Focuser => "focuser",
            Target::App => "app",
            Target::NexRemote => "nex-remote",
            Target::Gps => "gps",
            Target::Wifi => "wifi",
            Target::Bat => "bat",
            Target::Chg => "chg",
            Target::Light => "light",
            Target::Unknown(_) => return None,
        };
        Some(name)
    }
}

impl From<u8> for Target {
    fn from(code: u8) -> Self {
        match code {
            TARGET_ANY => Target::Any,
            TARGET_MB => Target::Mb,
            TARGET_HC => Target::Hc,
            TARGET_HCP => Target::Hcp,
            TARGET_AZM => Target::Azm,
            TARGET_ALT => Target::Alt,
            TARGET_FOCUSER => Target::Focuser,
            TARGET_APP => Target::App,
            TARGET_NEX_REMOTE => Target::NexRemote,
            TARGET_GPS => Target::Gps,
            TARGET_WIFI => Target::Wifi,
            TARGET_BAT => Target::Bat,
            TARGET_CHG => Target::Chg,
            TARGET_LIGHT => Target::Light,
            _ => Target::Unknown(code),
        }
    }
}

impl PartialEq for Target {
    fn eq(&self, other: &Self) -> bool {
        self.code() == other.code()
    }
}

impl Eq for Target {}

impl Hash for Target {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.code().hash(state);
    }
}

impl From<Target> for u8 {
    fn from(target: Target) -> Self {
        match target {
            Target::Any => TARGET_ANY,
            Target::Mb => TARGET_MB,
            Target::Hc => TARGET_HC,
            Target::Hcp => TARGET_HCP,
            Target::Azm => TARGET_AZM,
            Target::Alt => TARGET_ALT,
            Target::Focuser => TARGET_FOCUSER,
            Target::App => TARGET_APP,
            Target::NexRemote => TARGET_NEX_REMOTE,
            Target::Gps => TARGET_GPS,
            Target::Wifi => TARGET_WIFI,
            Target::Bat => TARGET_BAT,
            Target::Chg => TARGET_CHG,
            Target::Light => TARGET_LIGHT,
            Target::Unknown(code) => code,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "0x{:02x}", self.code()),
        }
    }
}

impl FromStr for Target {
    type Err = ParseNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        if let Some(target) = Target::ALL.iter().find(|t| t.name() == Some(wanted.as_str())) {
            return Ok(*target);
        }
        parse_code(&wanted).map(Target::from).ok_or(ParseNameError {
            kind: "target",
            name: s.to_string(),
        })
    }
}

impl TryFrom<String> for Target {
    type Error = ParseNameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Target> for String {
    fn from(target: Target) -> Self {
        target.to_string()
    }
}

/// An operation code. Compares by wire code, like [`Target`].
#[derive(Debug, Clone, Copy)]
pub enum Command {
    /// Read the 24-bit position.
    GetPosition,
    /// Fast goto to a 24-bit target.
    GotoFast,
    /// Overwrite the position counter.
    SetPosition,
    /// Set positive guide rate.
    SetPosGuiderate,
    /// Set negative guide rate.
    SetNegGuiderate,
    /// Start levelling.
    LevelStart,
    /// Set positive backlash.
    SetPosBacklash,
    /// Set negative backlash.
    SetNegBacklash,
    /// Query whether a slew has finished.
    SlewDone,
    /// Slow goto to a 24-bit target.
    GotoSlow,
    /// Seek the index position.
    SeekIndex,
    /// Move in the positive direction.
    MovePos,
    /// Move in the negative direction.
    MoveNeg,
    /// Read positive backlash.
    GetPosBacklash,
    /// Read negative backlash.
    GetNegBacklash,
    /// Read the firmware version.
    GetVersion,
    /// Start or stop focuser calibration.
    FocCalibEnable,
    /// Read focuser calibration status.
    FocCalibDone,
    /// Read focuser hard-stop positions.
    FocGetHsPositions,
    /// A code not in the table above.
    Unknown(u8),
}

impl Command {
    /// Every named command.
    pub const ALL: [Command; 19] = [
        Command::GetPosition,
        Command::GotoFast,
        Command::SetPosition,
        Command::SetPosGuiderate,
        Command::SetNegGuiderate,
        Command::LevelStart,
        Command::SetPosBacklash,
        Command::SetNegBacklash,
        Command::SlewDone,
        Command::GotoSlow,
        Command::SeekIndex,
        Command::MovePos,
        Command::MoveNeg,
        Command::GetPosBacklash,
        Command::GetNegBacklash,
        Command::GetVersion,
        Command::FocCalibEnable,
        Command::FocCalibDone,
        Command::FocGetHsPositions,
    ];

    /// The wire code for this command.
    pub fn code(self) -> u8 {
        u8::from(self)
    }

    /// Short name used in logs and on the command line.
    pub fn name(self) -> Option<&'static str> {
        let name = match self {
            Command::GetPosition => "get-position",
            Command::GotoFast => "goto-fast",
            Command::SetPosition => "set-position",
            Command::SetPosGuiderate => "set-pos-guiderate",
            Command::SetNegGuiderate => "set-neg-guiderate",
            Command::LevelStart => "level-start",
            Command::SetPosBacklash => "set-pos-backlash",
            Command::SetNegBacklash => "set-neg-backlash",
            Command::SlewDone => "slew-done",
            Command::GotoSlow => "goto-slow",
            Command::SeekIndex => "seek-index",
            Command::MovePos => "move-pos",
            Command::MoveNeg => "move-neg",
            Command::GetPosBacklash => "get-pos-backlash",
            Command::GetNegBacklash => "get-neg-backlash",
            Command::GetVersion => "get-version",
            Command::FocCalibEnable => "foc-calib-enable",
            Command::FocCalibDone => "foc-calib-done",
            Command::FocGetHsPositions => "foc-get-hs-positions",
            Command::Unknown(_) => return None,
        };
        Some(name)
    }
}

impl From<u8> for Command {
    fn from(code: u8) -> Self {
        match code {
            CMD_MC_GET_POSITION => Command::GetPosition,
            CMD_MC_GOTO_FAST => Command::GotoFast,
            CMD_MC_SET_POSITION => Command::SetPosition,
            CMD_MC_SET_POS_GUIDERATE => Command::SetPosGuiderate,
            CMD_MC_SET_NEG_GUIDERATE => Command::SetNegGuiderate,
            CMD_MC_LEVEL_START => Command::LevelStart,
            CMD_MC_SET_POS_BACKLASH => Command::SetPosBacklash,
            CMD_MC_SET_NEG_BACKLASH => Command::SetNegBacklash,
            CMD_MC_SLEW_DONE => Command::SlewDone,
            CMD_MC_GOTO_SLOW => Command::GotoSlow,
            CMD_MC_SEEK_INDEX => Command::SeekIndex,
            CMD_MC_MOVE_POS => Command::MovePos,
            CMD_MC_MOVE_NEG => Command::MoveNeg,
            CMD_MC_GET_POS_BACKLASH => Command::GetPosBacklash,
            CMD_MC_GET_NEG_BACKLASH => Command::GetNegBacklash,
            CMD_GET_VER => Command::GetVersion,
            CMD_FOC_CALIB_ENABLE => Command::FocCalibEnable,
            CMD_FOC_CALIB_DONE => Command::FocCalibDone,
            CMD_FOC_GET_HS_POSITIONS => Command::FocGetHsPositions,
            _ => Command::Unknown(code),
        }
    }
}

impl PartialEq for Command {
    fn eq(&self, other: &Self) -> bool {
        self.code() == other.code()
    }
}

impl Eq for Command {}

impl Hash for Command {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.code().hash(state);
    }
}

impl From<Command> for u8 {
    fn from(command: Command) -> Self {
        match command {
            Command::GetPosition => CMD_MC_GET_POSITION,
            Command::GotoFast => CMD_MC_GOTO_FAST,
            Command::SetPosition => CMD_MC_SET_POSITION,
            Command::SetPosGuiderate => CMD_MC_SET_POS_GUIDERATE,
            Command::SetNegGuiderate => CMD_MC_SET_NEG_GUIDERATE,
            Command::LevelStart => CMD_MC_LEVEL_START,
            Command::SetPosBacklash => CMD_MC_SET_POS_BACKLASH,
            Command::SetNegBacklash => CMD_MC_SET_NEG_BACKLASH,
            Command::SlewDone => CMD_MC_SLEW_DONE,
            Command::GotoSlow => CMD_MC_GOTO_SLOW,
            Command::SeekIndex => CMD_MC_SEEK_INDEX,
            Command::MovePos => CMD_MC_MOVE_POS,
            Command::MoveNeg => CMD_MC_MOVE_NEG,
            Command::GetPosBacklash => CMD_MC_GET_POS_BACKLASH,
            Command::GetNegBacklash => CMD_MC_GET_NEG_BACKLASH,
            Command::GetVersion => CMD_GET_VER,
            Command::FocCalibEnable => CMD_FOC_CALIB_ENABLE,
            Command::FocCalibDone => CMD_FOC_CALIB_DONE,
            Command::FocGetHsPositions => CMD_FOC_GET_HS_POSITIONS,
            Command::Unknown(code) => code,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "0x{:02x}", self.code()),
        }
    }
}

impl FromStr for Command {
    type Err = ParseNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        if let Some(command) = Command::ALL.iter().find(|c| c.name() == Some(wanted.as_str())) {
            return Ok(*command);
        }
        parse_code(&wanted).map(Command::from).ok_or(ParseNameError {
            kind: "command",
            name: s.to_string(),
        })
    }
}

/// Parse a raw code written as `0x12` or `18`.
fn parse_code(s: &str) -> Option<u8> {
    match s.strip_prefix("0x") {
        Some(hex) => u8::from_str_radix(hex, 16).ok(),
        None => s.parse().ok(),
    }
}
