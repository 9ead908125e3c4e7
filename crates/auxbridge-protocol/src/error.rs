//! Protocol error types.

use thiserror::Error;

/// Errors that can occur when encoding or decoding an AUX frame.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// Frame is too short to be valid.
    #[error("frame too short: expected at least {expected} bytes, got {actual}")]
    TooShort {
        /// Expected minimum length.
        expected: usize,
        /// Actual length received.
        actual: usize,
    },

    /// First byte is not the start-of-frame sentinel.
    #[error("bad header: expected 0x{expected:02X}, got 0x{actual:02X}")]
    BadHeader {
        /// The sentinel value.
        expected: u8,
        /// The byte found at offset 0.
        actual: u8,
    },

    /// Buffer length disagrees with the length field.
    #[error("size mismatch: length field implies {expected} bytes, got {actual}")]
    SizeMismatch {
        /// Size implied by the length byte.
        expected: usize,
        /// Actual buffer size.
        actual: usize,
    },

    /// Trailing checksum does not match the frame contents.
    #[error("checksum mismatch: computed 0x{computed:02X}, received 0x{received:02X}")]
    ChecksumMismatch {
        /// Checksum computed over the received bytes.
        computed: u8,
        /// Checksum carried by the frame.
        received: u8,
    },

    /// Payload does not fit in the one-byte length field.
    #[error("payload too large: maximum {max} bytes, got {actual}")]
    PayloadTooLarge {
        /// Maximum payload size.
        max: usize,
        /// Requested payload size.
        actual: usize,
    },
}

/// Errors from parsing a hex diagnostic string.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HexError {
    /// Odd digit count or a character that is not a hex digit. Character
    /// indexes count digits only, whitespace skipped.
    #[error("invalid hex: {0}")]
    Decode(#[from] hex::FromHexError),
}

/// Error for a device address or command name that is not recognised.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown {kind}: {name:?}")]
pub struct ParseNameError {
    /// What was being parsed ("target" or "command").
    pub kind: &'static str,
    /// The input that failed to parse.
    pub name: String,
}

/// Result type alias for codec operations.
pub type FrameResult<T> = Result<T, FrameError>;
