//! Protocol constants
//!
//! These constants define the frame layout, device addresses and command
//! codes used on the AUX bus. The numeric values must match the hardware
//! exactly.

// ============================================================================
// Frame Layout
// ============================================================================

/// Start-of-frame byte.
pub const AUX_SENTINEL: u8 = 0x3B;
/// Bytes counted by the length field besides the payload (source, destination, command).
pub const ADDRESSING_LEN: usize = 3;
/// Bytes outside the length field (sentinel, length, checksum).
pub const FRAMING_OVERHEAD: usize = 3;
/// Smallest valid frame: sentinel, length, source, destination, command, checksum.
pub const MIN_FRAME_LEN: usize = ADDRESSING_LEN + FRAMING_OVERHEAD;
/// Largest payload that fits in the one-byte length field.
pub const MAX_PAYLOAD_LEN: usize = u8::MAX as usize - ADDRESSING_LEN;
/// Largest complete frame.
pub const MAX_FRAME_LEN: usize = u8::MAX as usize + FRAMING_OVERHEAD;

/// Offset of the length byte.
pub const OFFSET_LENGTH: usize = 1;
/// Offset of the source address.
pub const OFFSET_SOURCE: usize = 2;
/// Offset of the destination address.
pub const OFFSET_DESTINATION: usize = 3;
/// Offset of the command code.
pub const OFFSET_COMMAND: usize = 4;
/// Offset of the first payload byte.
pub const OFFSET_PAYLOAD: usize = 5;

// ============================================================================
// Device Addresses
// ============================================================================

/// Broadcast / unspecified device.
pub const TARGET_ANY: u8 = 0x00;
/// Main board.
pub const TARGET_MB: u8 = 0x01;
/// Hand controller.
pub const TARGET_HC: u8 = 0x04;
/// Hand controller (NexStar+).
pub const TARGET_HCP: u8 = 0x0d;
/// Azimuth / hour angle axis motor.
pub const TARGET_AZM: u8 = 0x10;
/// Altitude / declination axis motor.
pub const TARGET_ALT: u8 = 0x11;
/// Focuser motor.
pub const TARGET_FOCUSER: u8 = 0x12;
/// Application (this host).
pub const TARGET_APP: u8 = 0x20;
/// NexRemote software.
pub const TARGET_NEX_REMOTE: u8 = 0x22;
/// GPS unit.
pub const TARGET_GPS: u8 = 0xb0;
/// WiFi board.
pub const TARGET_WIFI: u8 = 0xb5;
/// Battery.
pub const TARGET_BAT: u8 = 0xb6;
/// Charger.
pub const TARGET_CHG: u8 = 0xb7;
/// Lighting controller.
pub const TARGET_LIGHT: u8 = 0xbf;

// ============================================================================
// Motor Controller Commands
// ============================================================================

/// Read the 24-bit position.
pub const CMD_MC_GET_POSITION: u8 = 0x01;
/// Fast goto to a 24-bit target.
pub const CMD_MC_GOTO_FAST: u8 = 0x02;
/// Overwrite the 24-bit position counter.
pub const CMD_MC_SET_POSITION: u8 = 0x04;
/// Set positive guide rate.
pub const CMD_MC_SET_POS_GUIDERATE: u8 = 0x06;
/// Set negative guide rate.
pub const CMD_MC_SET_NEG_GUIDERATE: u8 = 0x07;
/// Start levelling.
pub const CMD_MC_LEVEL_START: u8 = 0x0b;
/// Set positive backlash (1 byte, 0-99).
pub const CMD_MC_SET_POS_BACKLASH: u8 = 0x10;
/// Set negative backlash (1 byte, 0-99).
pub const CMD_MC_SET_NEG_BACKLASH: u8 = 0x11;
/// Query whether a slew has finished (0xFF when done).
pub const CMD_MC_SLEW_DONE: u8 = 0x13;
/// Slow goto to a 24-bit target.
pub const CMD_MC_GOTO_SLOW: u8 = 0x17;
/// Seek the index position.
pub const CMD_MC_SEEK_INDEX: u8 = 0x19;
/// Move in the positive direction at rate 0-9.
pub const CMD_MC_MOVE_POS: u8 = 0x24;
/// Move in the negative direction at rate 0-9.
pub const CMD_MC_MOVE_NEG: u8 = 0x25;
/// Read positive backlash (1 byte, 0-99).
pub const CMD_MC_GET_POS_BACKLASH: u8 = 0x40;
/// Read negative backlash (1 byte, 0-99).
pub const CMD_MC_GET_NEG_BACKLASH: u8 = 0x41;

// ============================================================================
// Common and Focuser Commands
// ============================================================================

/// Firmware version, 2 or 4 bytes (major, minor, build hi, build lo).
pub const CMD_GET_VER: u8 = 0xfe;
/// Focuser calibration: 0 starts, 1 stops.
pub const CMD_FOC_CALIB_ENABLE: u8 = 0x2a;
/// Focuser calibration status: [done, state 0-12].
pub const CMD_FOC_CALIB_DONE: u8 = 0x2b;
/// Focuser hard-stop positions (low and high limits).
pub const CMD_FOC_GET_HS_POSITIONS: u8 = 0x2c;

// ============================================================================
// Reply Values
// ============================================================================

/// First byte of a `SlewDone` reply once the motor has stopped.
pub const SLEW_DONE_FINISHED: u8 = 0xFF;
/// Fastest manual move rate.
pub const MAX_MOVE_RATE: u8 = 9;
/// Largest backlash setting accepted by the motor controllers.
pub const MAX_BACKLASH: u8 = 99;
/// Largest value representable in a 24-bit position field.
pub const MAX_POSITION: u32 = 0x00FF_FFFF;
