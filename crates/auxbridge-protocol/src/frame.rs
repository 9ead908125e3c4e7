//! Frame encoding/decoding.
//!
//! ```text
//! offset 0      sentinel (0x3B)
//! offset 1      length = 3 + payload.len()
//! offset 2      source address
//! offset 3      destination address
//! offset 4      command code
//! offset 5..    payload (length - 3 bytes)
//! last          checksum
//! ```
//!
//! A frame is always exactly `length + 3` bytes on the wire.

use bytes::BufMut;

use crate::constants::*;
use crate::dump::to_hex;
use crate::error::{FrameError, FrameResult};
use crate::types::{Command, Target};

/// One decoded AUX message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Sending device.
    pub source: Target,
    /// Receiving device.
    pub destination: Target,
    /// Operation code.
    pub command: Command,
    /// Command-specific data.
    pub payload: Vec<u8>,
}

impl Frame {
    /// Create a frame with the given payload.
    pub fn new(source: Target, destination: Target, command: Command, payload: impl Into<Vec<u8>>) -> Self {
        Frame {
            source,
            destination,
            command,
            payload: payload.into(),
        }
    }

    /// Value of the length field (addressing bytes plus payload).
    ///
    /// Only meaningful for payloads that fit; [`Frame::encode`] rejects the rest.
    pub fn length(&self) -> usize {
        ADDRESSING_LEN + self.payload.len()
    }

    /// Total size of the serialized frame.
    pub fn encoded_len(&self) -> usize {
        self.length() + FRAMING_OVERHEAD
    }

    /// Serialize the frame, appending its checksum.
    pub fn encode(&self) -> FrameResult<Vec<u8>> {
        encode(self.source, self.destination, self.command, &self.payload)
    }

    /// Parse a complete frame buffer.
    pub fn decode(bytes: &[u8]) -> FrameResult<Frame> {
        decode(bytes)
    }
}

impl std::fmt::Display for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> {} {}", self.source, self.destination, self.command)?;
        if !self.payload.is_empty() {
            write!(f, " [{}]", to_hex(&self.payload))?;
        }
        Ok(())
    }
}

/// Compute the checksum over `body`.
///
/// `body` is every byte from the length field through the last payload byte;
/// the result is the two's complement of their sum, modulo 256.
pub fn checksum(body: &[u8]) -> u8 {
    body.iter()
        .fold(0u8, |sum, b| sum.wrapping_add(*b))
        .wrapping_neg()
}

/// Build the wire bytes for one frame.
pub fn encode(source: Target, destination: Target, command: Command, payload: &[u8]) -> FrameResult<Vec<u8>> {
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(FrameError::PayloadTooLarge {
            max: MAX_PAYLOAD_LEN,
            actual: payload.len(),
        });
    }

    let length = ADDRESSING_LEN + payload.len();
    let mut buf = Vec::with_capacity(length + FRAMING_OVERHEAD);
    buf.put_u8(AUX_SENTINEL);
    buf.put_u8(length as u8);
    buf.put_u8(source.into());
    buf.put_u8(destination.into());
    buf.put_u8(command.into());
    buf.put_slice(payload);
    let sum = checksum(&buf[OFFSET_LENGTH..]);
    buf.put_u8(sum);

    log::trace!("TX: {}", to_hex(&buf));
    Ok(buf)
}

/// Parse and validate a complete frame buffer.
///
/// Checks are applied in order: minimum size, sentinel, size against the
/// length field, checksum.
pub fn decode(bytes: &[u8]) -> FrameResult<Frame> {
    if bytes.len() < MIN_FRAME_LEN {
        return Err(FrameError::TooShort {
            expected: MIN_FRAME_LEN,
            actual: bytes.len(),
        });
    }

    if bytes[0] != AUX_SENTINEL {
        return Err(FrameError::BadHeader {
            expected: AUX_SENTINEL,
            actual: bytes[0],
        });
    }

    let length = bytes[OFFSET_LENGTH] as usize;
    if bytes.len() != length + FRAMING_OVERHEAD {
        return Err(FrameError::SizeMismatch {
            expected: length + FRAMING_OVERHEAD,
            actual: bytes.len(),
        });
    }

    let checksum_at = length + 2;
    let computed = checksum(&bytes[OFFSET_LENGTH..checksum_at]);
    let received = bytes[checksum_at];
    if computed != received {
        return Err(FrameError::ChecksumMismatch { computed, received });
    }

    log::trace!("RX: {}", to_hex(bytes));
    Ok(Frame {
        source: Target::from(bytes[OFFSET_SOURCE]),
        destination: Target::from(bytes[OFFSET_DESTINATION]),
        command: Command::from(bytes[OFFSET_COMMAND]),
        payload: bytes[OFFSET_PAYLOAD..checksum_at].to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_version_literal() {
        let encoded = encode(Target::App, Target::Focuser, Command::GetVersion, &[]).unwrap();
        assert_eq!(encoded, vec![0x3B, 0x03, 0x20, 0x12, 0xFE, 0xCD]);
    }

    #[test]
    fn test_goto_literal() {
        // goto 0x012345 on the focuser
        let encoded = encode(Target::App, Target::Focuser, Command::GotoFast, &[0x01, 0x23, 0x45]).unwrap();
        assert_eq!(encoded.len(), 9);
        assert_eq!(encoded[1], 6);
        let sum: u32 = encoded[1..8].iter().map(|b| *b as u32).sum();
        assert_eq!((sum + encoded[8] as u32) % 256, 0);
    }

    #[test]
    fn test_display() {
        let query = Frame::new(Target::App, Target::Focuser, Command::GetVersion, vec![]);
        assert_eq!(query.to_string(), "app -> focuser get-version");

        let reply = Frame::new(Target::Focuser, Target::App, Command::GetPosition, vec![0x01, 0xab, 0x00]);
        assert_eq!(reply.to_string(), "focuser -> app get-position [01 ab 00]");
    }

    #[test]
    fn test_round_trip_every_payload_length() {
        for len in 0..=MAX_PAYLOAD_LEN {
            let payload: Vec<u8> = (0..len).map(|i| (i * 7 + 3) as u8).collect();
            let encoded = encode(Target::Focuser, Target::App, Command::GetPosition, &payload).unwrap();
            assert_eq!(encoded.len(), len + 6);
            assert_eq!(encoded[1] as usize, len + 3);

            let frame = decode(&encoded).unwrap();
            assert_eq!(frame.source, Target::Focuser);
            assert_eq!(frame.destination, Target::App);
            assert_eq!(frame.command, Command::GetPosition);
            assert_eq!(frame.payload, payload);
        }
    }

    #[test]
    fn test_round_trip_every_address_and_command() {
        for target in Target::ALL {
            for command in Command::ALL {
                let frame = Frame::new(target, Target::App, command, vec![0xAA]);
                assert_eq!(Frame::decode(&frame.encode().unwrap()).unwrap(), frame);
            }
        }
    }

    #[test]
    fn test_payload_too_large() {
        let payload = vec![0u8; MAX_PAYLOAD_LEN + 1];
        assert_eq!(
            encode(Target::App, Target::Focuser, Command::GotoFast, &payload),
            Err(FrameError::PayloadTooLarge { max: 252, actual: 253 })
        );
    }

    #[test]
    fn test_too_short() {
        for len in 0..MIN_FRAME_LEN {
            let buf = vec![AUX_SENTINEL; len];
            assert_eq!(
                decode(&buf),
                Err(FrameError::TooShort { expected: 6, actual: len })
            );
        }
    }

    #[test]
    fn test_bad_header() {
        let mut buf = encode(Target::App, Target::Focuser, Command::GetVersion, &[]).unwrap();
        buf[0] = 0x3C;
        assert_eq!(
            decode(&buf),
            Err(FrameError::BadHeader { expected: 0x3B, actual: 0x3C })
        );
    }

    #[test]
    fn test_size_mismatch() {
        let mut buf = encode(Target::Focuser, Target::App, Command::GetPosition, &[1, 2, 3]).unwrap();
        buf.push(0x00);
        assert_eq!(
            decode(&buf),
            Err(FrameError::SizeMismatch { expected: 9, actual: 10 })
        );

        buf.truncate(8);
        assert_eq!(
            decode(&buf),
            Err(FrameError::SizeMismatch { expected: 9, actual: 8 })
        );
    }

    #[test]
    fn test_single_bit_flips_are_detected() {
        let original = encode(Target::Focuser, Target::App, Command::GetPosition, &[0x00, 0x80, 0xFF]).unwrap();

        for byte in OFFSET_LENGTH..original.len() {
            for bit in 0..8 {
                let mut corrupted = original.clone();
                corrupted[byte] ^= 1 << bit;
                let result = decode(&corrupted);

                if byte == OFFSET_LENGTH {
                    // The length field no longer agrees with the buffer size.
                    assert!(
                        matches!(result, Err(FrameError::SizeMismatch { .. })),
                        "byte {} bit {}: {:?}",
                        byte,
                        bit,
                        result
                    );
                } else {
                    // A single-bit change moves the sum by 2^bit, never by a multiple of 256.
                    assert!(
                        matches!(result, Err(FrameError::ChecksumMismatch { .. })),
                        "byte {} bit {}: {:?}",
                        byte,
                        bit,
                        result
                    );
                }
            }
        }
    }

    #[test]
    fn test_compensating_changes_are_not_detected() {
        // The checksum is a plain sum: moving one unit between bytes goes unnoticed.
        let mut buf = encode(Target::Focuser, Target::App, Command::GetPosition, &[0x10, 0x10, 0x10]).unwrap();
        buf[5] += 1;
        buf[6] -= 1;
        assert_eq!(decode(&buf).unwrap().payload, vec![0x11, 0x0F, 0x10]);
    }

    #[test]
    fn test_unknown_codes_still_decode() {
        let buf = encode(Target::Unknown(0x7f), Target::App, Command::Unknown(0x99), &[]).unwrap();
        let frame = decode(&buf).unwrap();
        assert_eq!(frame.source, Target::Unknown(0x7f));
        assert_eq!(frame.command, Command::Unknown(0x99));
    }

    #[test]
    fn test_unknown_alias_of_named_code_round_trips() {
        let sent = Frame::new(Target::App, Target::Unknown(0x12), Command::Unknown(0x01), Vec::<u8>::new());
        let buf = sent.encode().unwrap();
        assert_eq!(buf, encode(Target::App, Target::Focuser, Command::GetPosition, &[]).unwrap());

        let frame = decode(&buf).unwrap();
        assert!(matches!(frame.destination, Target::Focuser));
        assert_eq!(frame, sent);
    }

    #[test]
    fn test_checksum() {
        assert_eq!(checksum(&[0x03, 0x20, 0x12, 0xFE]), 0xCD);
        assert_eq!(checksum(&[]), 0x00);
        assert_eq!(checksum(&[0x01]), 0xFF);
    }

    #[test]
    fn test_frame_lengths() {
        let frame = Frame::new(Target::App, Target::Focuser, Command::GotoFast, vec![1, 2, 3]);
        assert_eq!(frame.length(), 6);
        assert_eq!(frame.encoded_len(), 9);
        assert_eq!(frame.encode().unwrap().len(), frame.encoded_len());
    }
}
