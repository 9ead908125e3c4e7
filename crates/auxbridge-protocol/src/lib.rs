//! Celestron AUX Protocol
//!
//! This crate provides the wire format used by Celestron motor controllers,
//! focusers and accessories on the AUX bus. It is a pure codec: it builds and
//! parses frames and computes checksums, but performs no I/O. The
//! request/response engine that drives a serial link lives in
//! `auxbridge-link`.
//!
//! # Protocol Overview
//!
//! Every message on the bus is a single frame:
//!
//! ```text
//! +------+-----+-----+-----+-----+-----------------+----------+
//! | 0x3B | len | src | dst | cmd | payload[len-3]  | checksum |
//! +------+-----+-----+-----+-----+-----------------+----------+
//! ```
//!
//! - `len` counts source, destination, command and payload bytes.
//! - The checksum is the two's complement of the sum of every byte from `len`
//!   through the last payload byte.
//! - There are no sequence numbers. A response is matched to its request only
//!   by arriving next on the wire.
//!
//! # Example
//!
//! ```rust
//! use auxbridge_protocol::{encode, decode, Command, Target};
//!
//! let bytes = encode(Target::App, Target::Focuser, Command::GetVersion, &[]).unwrap();
//! assert_eq!(bytes, [0x3B, 0x03, 0x20, 0x12, 0xFE, 0xCD]);
//!
//! let frame = decode(&bytes).unwrap();
//! assert_eq!(frame.command, Command::GetVersion);
//! ```

mod constants;
mod dump;
mod error;
mod frame;
mod types;

pub use constants::*;
pub use dump::*;
pub use error::*;
pub use frame::*;
pub use types::*;
