//! Frame assembly from a raw byte stream.
//!
//! Devices on the AUX bus answer with a burst of bytes and then go quiet.
//! There is no terminator, and the length byte cannot be trusted until the
//! sentinel has been seen, which some devices omit from their replies. So a
//! frame ends when the line has been silent for the quiet interval:
//!
//! ```text
//!   Idle ──byte──▶ Collecting ──byte──▶ Collecting (quiet timer reset)
//!     │                 │
//!     │ deadline        │ quiet interval or deadline elapses
//!     ▼                 ▼
//!   NoData           Finalize ──▶ decode
//! ```
//!
//! A byte arriving exactly one quiet interval after the previous one starts
//! the next burst. The quiet interval decides where a frame ends; the caller's deadline
//! bounds how long the whole receive may take. A device that keeps talking
//! past the deadline gets whatever was collected so far finalized.

use std::time::Duration;

use auxbridge_metrics::metric_defs;
use auxbridge_protocol::{decode, to_hex, Frame, AUX_SENTINEL, MAX_FRAME_LEN};
use bytes::{BufMut, BytesMut};
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::error::{ReceiveError, TransportError};
use crate::transport::AuxTransport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Nothing received yet.
    Idle,
    /// At least one byte received; the frame ends at `quiet_until` unless
    /// another byte arrives first.
    Collecting { quiet_until: Instant },
}

/// Recovers frames from an unframed byte stream using an inactivity gap.
#[derive(Debug, Clone)]
pub struct FrameReceiver {
    quiet_interval: Duration,
}

impl FrameReceiver {
    /// Create a receiver that ends a frame after `quiet_interval` of silence.
    pub fn new(quiet_interval: Duration) -> Self {
        FrameReceiver { quiet_interval }
    }

    /// The configured inactivity gap.
    pub fn quiet_interval(&self) -> Duration {
        self.quiet_interval
    }

    /// Collect one burst of bytes, without interpreting them.
    ///
    /// Fails with [`TransportError::NoData`] if nothing arrives before
    /// `deadline`.
    pub async fn collect<T: AuxTransport>(
        &self,
        transport: &mut T,
        deadline: Instant,
    ) -> Result<BytesMut, TransportError> {
        let mut buffer = BytesMut::with_capacity(MAX_FRAME_LEN);
        let mut state = State::Idle;

        loop {
            let wait_until = match state {
                State::Idle => deadline,
                State::Collecting { quiet_until } => {
                    if Instant::now() >= deadline {
                        break;
                    }
                    quiet_until.min(deadline)
                }
            };

            match transport.read_byte(wait_until).await? {
                Some(byte) => {
                    buffer.put_u8(byte);
                    state = State::Collecting {
                        quiet_until: Instant::now() + self.quiet_interval,
                    };
                }
                None => break,
            }
        }

        match state {
            State::Idle => Err(TransportError::NoData),
            State::Collecting { .. } => {
                trace!(bytes = buffer.len(), raw = %to_hex(&buffer), "collected burst");
                Ok(buffer)
            }
        }
    }

    /// Collect one burst and decode it as a frame.
    pub async fn receive<T: AuxTransport>(
        &self,
        transport: &mut T,
        deadline: Instant,
    ) -> Result<Frame, ReceiveError> {
        let raw = self.collect(transport, deadline).await?;
        let buffer = restore_sentinel(raw);
        let frame = decode(&buffer)?;
        metrics::counter!(metric_defs::LINK_RX_FRAMES.name).increment(1);
        Ok(frame)
    }
}

/// Prepend the sentinel if the burst does not start with one.
///
/// Some devices drop the first byte of their own reply. This cannot tell
/// that case apart from line noise; decode still has to accept the result.
pub fn restore_sentinel(raw: BytesMut) -> BytesMut {
    if raw.first() == Some(&AUX_SENTINEL) {
        return raw;
    }

    debug!(raw = %to_hex(&raw), "response missing start byte, restoring it");
    metrics::counter!(metric_defs::LINK_RX_MISSING_SENTINEL.name).increment(1);
    let mut restored = BytesMut::with_capacity(raw.len() + 1);
    restored.put_u8(AUX_SENTINEL);
    restored.extend_from_slice(&raw);
    restored
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_restore_sentinel_leaves_complete_frames() {
        let raw = BytesMut::from(&[0x3B, 0x03, 0x12, 0x20, 0xFE, 0xCD][..]);
        assert_eq!(&restore_sentinel(raw)[..], &[0x3B, 0x03, 0x12, 0x20, 0xFE, 0xCD]);
    }

    #[test]
    fn test_restore_sentinel_prepends() {
        let raw = BytesMut::from(&[0x03, 0x12, 0x20, 0xFE, 0xCD][..]);
        assert_eq!(&restore_sentinel(raw)[..], &[0x3B, 0x03, 0x12, 0x20, 0xFE, 0xCD]);
    }
}
