//! Typed focuser commands on top of the communicator.
//!
//! The focuser motor position is a 24-bit big-endian count. "In" drives the
//! motor in the positive direction and "out" in the negative one, so stepping
//! in adds to the position and stepping out subtracts from it.

use std::fmt;
use std::str::FromStr;

use auxbridge_link::{AuxTransport, Communicator};
use auxbridge_protocol::{
    Command, ParseNameError, Target, MAX_BACKLASH, MAX_MOVE_RATE, MAX_POSITION, SLEW_DONE_FINISHED,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{FocuserError, FocuserResult};

/// Direction of focuser travel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Positive motor direction.
    In,
    /// Negative motor direction.
    Out,
}

impl Direction {
    /// Continuous move command for this direction.
    pub fn move_command(self) -> Command {
        match self {
            Direction::In => Command::MovePos,
            Direction::Out => Command::MoveNeg,
        }
    }

    fn backlash_query(self) -> Command {
        match self {
            Direction::In => Command::GetPosBacklash,
            Direction::Out => Command::GetNegBacklash,
        }
    }

    fn backlash_setter(self) -> Command {
        match self {
            Direction::In => Command::SetPosBacklash,
            Direction::Out => Command::SetNegBacklash,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::In => f.write_str("in"),
            Direction::Out => f.write_str("out"),
        }
    }
}

impl FromStr for Direction {
    type Err = ParseNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "in" | "+" => Ok(Direction::In),
            "out" | "-" => Ok(Direction::Out),
            _ => Err(ParseNameError {
                kind: "direction",
                name: s.to_string(),
            }),
        }
    }
}

/// Firmware version reported by `GetVersion`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirmwareVersion {
    pub major: u8,
    pub minor: u8,
    /// Present when the device sends the four-byte form.
    pub build: Option<u16>,
}

impl FirmwareVersion {
    /// Interpret a `GetVersion` reply payload.
    pub fn from_payload(payload: &[u8]) -> FocuserResult<Self> {
        match payload {
            [major, minor, hi, lo, ..] => Ok(FirmwareVersion {
                major: *major,
                minor: *minor,
                build: Some(u16::from_be_bytes([*hi, *lo])),
            }),
            [major, minor, ..] => Ok(FirmwareVersion {
                major: *major,
                minor: *minor,
                build: None,
            }),
            _ => Err(short_reply(Command::GetVersion, 2, payload)),
        }
    }
}

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.build {
            Some(build) => write!(f, "{}.{}.{}", self.major, self.minor, build),
            None => write!(f, "{}.{}", self.major, self.minor),
        }
    }
}

/// Encode a motor position as the 3-byte big-endian payload.
pub fn position_payload(position: u32) -> FocuserResult<[u8; 3]> {
    if position > MAX_POSITION {
        return Err(FocuserError::InvalidPosition(position));
    }
    let [_, hi, mid, lo] = position.to_be_bytes();
    Ok([hi, mid, lo])
}

/// Decode the leading 24-bit big-endian position of a reply.
pub fn parse_position(command: Command, payload: &[u8]) -> FocuserResult<u32> {
    match payload {
        [hi, mid, lo, ..] => Ok(u32::from_be_bytes([0, *hi, *mid, *lo])),
        _ => Err(short_reply(command, 3, payload)),
    }
}

/// Target of a relative move, clamped to the motor's range.
pub fn step_target(from: u32, direction: Direction, steps: u32) -> u32 {
    match direction {
        Direction::In => from.saturating_add(steps).min(MAX_POSITION),
        Direction::Out => from.saturating_sub(steps),
    }
}

fn check_speed(speed: u8) -> FocuserResult<u8> {
    if (1..=MAX_MOVE_RATE).contains(&speed) {
        Ok(speed)
    } else {
        Err(FocuserError::InvalidSpeed(speed))
    }
}

fn short_reply(command: Command, expected: usize, payload: &[u8]) -> FocuserError {
    FocuserError::ShortReply {
        command,
        expected,
        actual: payload.len(),
    }
}

/// A focuser on the AUX bus.
pub struct Focuser<T> {
    aux: Communicator<T>,
}

impl<T: AuxTransport> Focuser<T> {
    pub fn new(aux: Communicator<T>) -> Self {
        Focuser { aux }
    }

    /// The underlying communicator, for commands not wrapped here.
    pub fn communicator_mut(&mut self) -> &mut Communicator<T> {
        &mut self.aux
    }

    pub fn into_inner(self) -> Communicator<T> {
        self.aux
    }

    /// Ask the focuser for its firmware version. Also serves as a presence probe.
    pub async fn firmware_version(&mut self) -> FocuserResult<FirmwareVersion> {
        let reply = self.aux.query(Target::Focuser, Command::GetVersion).await?;
        let version = FirmwareVersion::from_payload(&reply)?;
        debug!(%version, "focuser firmware");
        Ok(version)
    }

    /// Current motor position.
    pub async fn position(&mut self) -> FocuserResult<u32> {
        let reply = self.aux.query(Target::Focuser, Command::GetPosition).await?;
        parse_position(Command::GetPosition, &reply)
    }

    /// Start a move to an absolute position. The focuser does not acknowledge it.
    pub async fn goto(&mut self, position: u32) -> FocuserResult<()> {
        let payload = position_payload(position)?;
        self.aux
            .command_blind(Target::Focuser, Command::GotoFast, &payload)
            .await?;
        debug!(position, "goto started");
        Ok(())
    }

    /// Start a continuous move at `speed` (1-9).
    pub async fn move_at(&mut self, direction: Direction, speed: u8) -> FocuserResult<()> {
        let speed = check_speed(speed)?;
        self.aux
            .send_command(Target::Focuser, direction.move_command(), &[speed])
            .await?;
        debug!(%direction, speed, "move started");
        Ok(())
    }

    pub async fn move_in(&mut self, speed: u8) -> FocuserResult<()> {
        self.move_at(Direction::In, speed).await
    }

    pub async fn move_out(&mut self, speed: u8) -> FocuserResult<()> {
        self.move_at(Direction::Out, speed).await
    }

    /// Halt the motor.
    pub async fn stop(&mut self) -> FocuserResult<()> {
        self.aux
            .command_blind(Target::Focuser, Command::MovePos, &[0])
            .await?;
        Ok(())
    }

    /// Whether the last move has finished.
    pub async fn slew_done(&mut self) -> FocuserResult<bool> {
        let reply = self.aux.query(Target::Focuser, Command::SlewDone).await?;
        match reply.first() {
            Some(status) => Ok(*status == SLEW_DONE_FINISHED),
            None => Err(short_reply(Command::SlewDone, 1, &reply)),
        }
    }

    /// Move `steps` from `from` in `direction`. Returns the target position.
    pub async fn step(&mut self, direction: Direction, steps: u32, from: u32) -> FocuserResult<u32> {
        let target = step_target(from, direction, steps);
        self.goto(target).await?;
        Ok(target)
    }

    /// Backlash compensation for moves in `direction`.
    pub async fn backlash(&mut self, direction: Direction) -> FocuserResult<u8> {
        let command = direction.backlash_query();
        let reply = self.aux.query(Target::Focuser, command).await?;
        match reply.first() {
            Some(value) => Ok(*value),
            None => Err(short_reply(command, 1, &reply)),
        }
    }

    /// Set backlash compensation (0-99) for moves in `direction`.
    pub async fn set_backlash(&mut self, direction: Direction, value: u8) -> FocuserResult<()> {
        if value > MAX_BACKLASH {
            return Err(FocuserError::InvalidBacklash(value));
        }
        self.aux
            .send_command(Target::Focuser, direction.backlash_setter(), &[value])
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_parse() {
        assert_eq!("in".parse::<Direction>().unwrap(), Direction::In);
        assert_eq!("OUT".parse::<Direction>().unwrap(), Direction::Out);
        assert_eq!("+".parse::<Direction>().unwrap(), Direction::In);
        let err = "up".parse::<Direction>().unwrap_err();
        assert_eq!(err.kind, "direction");
        assert_eq!(Direction::Out.to_string(), "out");
    }

    #[test]
    fn test_direction_commands() {
        assert_eq!(Direction::In.move_command(), Command::MovePos);
        assert_eq!(Direction::Out.move_command(), Command::MoveNeg);
        assert_eq!(Direction::In.backlash_setter(), Command::SetPosBacklash);
        assert_eq!(Direction::Out.backlash_query(), Command::GetNegBacklash);
    }

    #[test]
    fn test_firmware_version_forms() {
        let short = FirmwareVersion::from_payload(&[7, 11]).unwrap();
        assert_eq!(short.build, None);
        assert_eq!(short.to_string(), "7.11");

        let long = FirmwareVersion::from_payload(&[7, 11, 0x12, 0x34]).unwrap();
        assert_eq!(long.build, Some(0x1234));
        assert_eq!(long.to_string(), "7.11.4660");

        assert!(matches!(
            FirmwareVersion::from_payload(&[7]),
            Err(FocuserError::ShortReply { expected: 2, actual: 1, .. })
        ));
    }

    #[test]
    fn test_position_encoding() {
        assert_eq!(position_payload(0x012345).unwrap(), [0x01, 0x23, 0x45]);
        assert_eq!(position_payload(MAX_POSITION).unwrap(), [0xFF, 0xFF, 0xFF]);
        assert!(matches!(
            position_payload(MAX_POSITION + 1),
            Err(FocuserError::InvalidPosition(_))
        ));

        assert_eq!(parse_position(Command::GetPosition, &[0x01, 0x23, 0x45]).unwrap(), 0x012345);
        assert_eq!(parse_position(Command::GetPosition, &[0, 0, 7, 99]).unwrap(), 7);
        assert!(parse_position(Command::GetPosition, &[1, 2]).is_err());
    }

    #[test]
    fn test_step_target_saturates() {
        assert_eq!(step_target(1000, Direction::In, 50), 1050);
        assert_eq!(step_target(1000, Direction::Out, 50), 950);
        assert_eq!(step_target(10, Direction::Out, 50), 0);
        assert_eq!(step_target(MAX_POSITION - 5, Direction::In, 50), MAX_POSITION);
        assert_eq!(step_target(u32::MAX, Direction::In, 1), MAX_POSITION);
    }

    #[test]
    fn test_speed_bounds() {
        assert!(check_speed(0).is_err());
        assert!(check_speed(1).is_ok());
        assert!(check_speed(9).is_ok());
        assert!(check_speed(10).is_err());
    }
}
