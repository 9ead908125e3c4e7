//! Link error types.
//!
//! Every error below the [`CommandFailed`] line is recoverable by retrying
//! the exchange. The communicator absorbs them into its retry loop and only
//! hands the last one back, wrapped in [`CommandFailed`], for diagnostics.

use std::io;

use auxbridge_protocol::{Command, FrameError, Target};
use thiserror::Error;

/// Errors raised by the byte transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Fewer bytes were written than the frame holds.
    #[error("short write: wrote {written} of {expected} bytes")]
    ShortWrite {
        /// Bytes accepted by the transport.
        written: usize,
        /// Bytes in the encoded frame.
        expected: usize,
    },

    /// Nothing arrived before the operation deadline.
    #[error("no data received")]
    NoData,

    /// The peer closed the connection.
    #[error("transport closed")]
    Closed,

    /// I/O error from the underlying stream.
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

/// A well-formed frame that does not answer the request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Command or addressing of the response disagrees with the request.
    #[error(
        "unexpected response: got {command} from {from} to {to}, \
         expected {expected_command} from {expected_from} to {expected_to}"
    )]
    UnexpectedResponse {
        /// Command code in the response.
        command: Command,
        /// Source address in the response.
        from: Target,
        /// Destination address in the response.
        to: Target,
        /// Command that was sent.
        expected_command: Command,
        /// Device the request was addressed to.
        expected_from: Target,
        /// Local address.
        expected_to: Target,
    },
}

/// Failure to obtain a frame from the receiver.
#[derive(Debug, Error)]
pub enum ReceiveError {
    /// Transport failed or stayed silent.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Bytes arrived but did not form a valid frame.
    #[error("invalid frame: {0}")]
    Frame(#[from] FrameError),
}

/// Why a single attempt inside `send_command` failed.
#[derive(Debug, Error)]
pub enum AttemptError {
    /// Write or read failure.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Received bytes did not decode, or the request could not be encoded.
    #[error("invalid frame: {0}")]
    Frame(#[from] FrameError),

    /// Valid frame that does not answer the request.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

impl From<ReceiveError> for AttemptError {
    fn from(err: ReceiveError) -> Self {
        match err {
            ReceiveError::Transport(e) => AttemptError::Transport(e),
            ReceiveError::Frame(e) => AttemptError::Frame(e),
        }
    }
}

impl AttemptError {
    /// Short label used when recording attempt failures.
    pub fn reason(&self) -> &'static str {
        match self {
            AttemptError::Transport(TransportError::ShortWrite { .. }) => "short_write",
            AttemptError::Transport(TransportError::NoData) => "no_data",
            AttemptError::Transport(TransportError::Closed) => "closed",
            AttemptError::Transport(TransportError::Io(_)) => "io",
            AttemptError::Frame(FrameError::TooShort { .. }) => "too_short",
            AttemptError::Frame(FrameError::BadHeader { .. }) => "bad_header",
            AttemptError::Frame(FrameError::SizeMismatch { .. }) => "size_mismatch",
            AttemptError::Frame(FrameError::ChecksumMismatch { .. }) => "checksum",
            AttemptError::Frame(FrameError::PayloadTooLarge { .. }) => "payload_too_large",
            AttemptError::Protocol(ProtocolError::UnexpectedResponse { .. }) => "unexpected_response",
        }
    }
}

/// Terminal result of a command that never got a valid answer.
#[derive(Debug, Error)]
#[error("{command} to {target} failed after {attempts} attempt(s): {last_error}")]
pub struct CommandFailed {
    /// Device the command was addressed to.
    pub target: Target,
    /// The command that failed.
    pub command: Command,
    /// Attempts made. Zero when the request could not be encoded at all.
    pub attempts: u32,
    /// Error from the final attempt.
    pub last_error: AttemptError,
}

/// Failure of a fire-and-forget write.
#[derive(Debug, Error)]
pub enum WriteError {
    /// The request could not be encoded.
    #[error("cannot encode request: {0}")]
    Encode(#[from] FrameError),

    /// The transport rejected or truncated the write.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Invalid link configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// At least one attempt is required.
    #[error("retry_count must be at least 1")]
    ZeroRetries,

    /// A zero quiet interval would end every frame after its first byte.
    #[error("quiet_interval_ms must be greater than zero")]
    ZeroQuietInterval,

    /// The response timeout is above the 60 second ceiling.
    #[error("response_timeout_ms ({0}) must not exceed 60000")]
    TimeoutTooLong(u64),

    /// The quiet interval must fit inside the response timeout.
    #[error("quiet_interval_ms ({quiet_ms}) must be shorter than response_timeout_ms ({timeout_ms})")]
    QuietIntervalTooLong {
        /// Configured quiet interval.
        quiet_ms: u64,
        /// Configured response timeout.
        timeout_ms: u64,
    },
}
