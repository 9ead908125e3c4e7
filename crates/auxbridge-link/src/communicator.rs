//! Request/response exchange with bounded retries.
//!
//! AUX frames carry no sequence number, so the only thing tying a response
//! to its request is that it is the next frame on the wire. The
//! [`Communicator`] therefore requires exclusive use of its transport for
//! the duration of every call; `&mut self` on each method enforces that
//! within one owner, and callers that share a device must funnel requests
//! through a single owner (see `auxbridge-focuser`'s service task).

use auxbridge_metrics::{metric_defs, ExchangeLabels};
use auxbridge_protocol::{encode, Command, Frame, Target};
use tokio::time::Instant;
use tracing::{debug, trace, warn};

use crate::config::LinkConfig;
use crate::error::{AttemptError, CommandFailed, ProtocolError, TransportError, WriteError};
use crate::receiver::FrameReceiver;
use crate::transport::AuxTransport;

/// Sends commands to AUX devices and collects their responses.
pub struct Communicator<T> {
    transport: T,
    config: LinkConfig,
    receiver: FrameReceiver,
}

impl<T: AuxTransport> Communicator<T> {
    /// Create a communicator with the default configuration.
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, LinkConfig::default())
    }

    /// Create a communicator with an explicit configuration.
    pub fn with_config(transport: T, config: LinkConfig) -> Self {
        let receiver = FrameReceiver::new(config.quiet_interval());
        Communicator {
            transport,
            config,
            receiver,
        }
    }

    /// Local address used as the source of every request.
    pub fn source(&self) -> Target {
        self.config.source
    }

    /// The active configuration.
    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    /// Direct access to the transport.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Give back the transport.
    pub fn into_inner(self) -> T {
        self.transport
    }

    /// Send a command and return the payload of the matching response.
    ///
    /// Each attempt flushes stale input, writes the request, waits up to the
    /// response timeout for a frame, and checks that the frame comes from
    /// `destination`, is addressed to us and echoes `command`. Any failure
    /// abandons the attempt and starts the next one from scratch. After
    /// `retry_count` failures the last error is returned inside
    /// [`CommandFailed`].
    pub async fn send_command(
        &mut self,
        destination: Target,
        command: Command,
        payload: &[u8],
    ) -> Result<Vec<u8>, CommandFailed> {
        let labels = ExchangeLabels::new(destination.to_string(), command.to_string());

        let request = match encode(self.config.source, destination, command, payload) {
            Ok(request) => request,
            Err(e) => {
                return Err(CommandFailed {
                    target: destination,
                    command,
                    attempts: 0,
                    last_error: e.into(),
                })
            }
        };

        let max_attempts = self.config.retry_count.max(1);
        let started = Instant::now();
        let mut attempt = 0;

        loop {
            attempt += 1;
            metrics::counter!(metric_defs::LINK_ATTEMPTS.name, &labels.to_labels()).increment(1);

            match self.attempt(&request, destination, command).await {
                Ok(reply) => {
                    let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
                    metrics::histogram!(metric_defs::LINK_COMMAND_LATENCY.name, &labels.to_labels())
                        .record(elapsed_ms);
                    trace!(%destination, %command, attempt, reply_len = reply.len(), "command succeeded");
                    return Ok(reply);
                }
                Err(err) => {
                    debug!(%destination, %command, attempt, error = %err, "attempt failed");
                    metrics::counter!(
                        metric_defs::LINK_ATTEMPT_FAILURES.name,
                        &labels.with(&[("reason", err.reason().to_string())])
                    )
                    .increment(1);

                    if attempt >= max_attempts {
                        warn!(%destination, %command, attempts = attempt, error = %err, "command failed");
                        metrics::counter!(metric_defs::LINK_COMMAND_FAILURES.name, &labels.to_labels())
                            .increment(1);
                        return Err(CommandFailed {
                            target: destination,
                            command,
                            attempts: attempt,
                            last_error: err,
                        });
                    }
                }
            }
        }
    }

    /// [`send_command`](Self::send_command) with an empty payload.
    pub async fn query(&mut self, destination: Target, command: Command) -> Result<Vec<u8>, CommandFailed> {
        self.send_command(destination, command, &[]).await
    }

    /// Write a command once without waiting for or checking a response.
    pub async fn command_blind(
        &mut self,
        destination: Target,
        command: Command,
        payload: &[u8],
    ) -> Result<(), WriteError> {
        let request = encode(self.config.source, destination, command, payload)?;
        self.write_request(&request).await?;

        let labels = ExchangeLabels::new(destination.to_string(), command.to_string());
        metrics::counter!(metric_defs::LINK_BLIND_WRITES.name, &labels.to_labels()).increment(1);
        trace!(%destination, %command, "blind command written");
        Ok(())
    }

    /// One complete write-then-read cycle.
    async fn attempt(
        &mut self,
        request: &[u8],
        destination: Target,
        command: Command,
    ) -> Result<Vec<u8>, AttemptError> {
        let deadline = Instant::now() + self.config.response_timeout();
        self.write_request(request).await?;
        let frame = self.receiver.receive(&mut self.transport, deadline).await?;
        check_response(&frame, self.config.source, destination, command)?;
        Ok(frame.payload)
    }

    /// Flush stale input, then write and drain one encoded frame.
    async fn write_request(&mut self, request: &[u8]) -> Result<(), TransportError> {
        let stale = self.transport.discard_input();
        if stale > 0 {
            debug!(bytes = stale, "discarded stale input");
            metrics::counter!(metric_defs::LINK_STALE_BYTES.name).increment(stale as u64);
        }

        let written = self.transport.write(request).await?;
        metrics::counter!(metric_defs::LINK_TX_BYTES.name).increment(written as u64);
        if written != request.len() {
            return Err(TransportError::ShortWrite {
                written,
                expected: request.len(),
            });
        }

        self.transport.flush().await
    }
}

/// Check that `frame` answers `command` sent from `local` to `destination`.
pub fn check_response(
    frame: &Frame,
    local: Target,
    destination: Target,
    command: Command,
) -> Result<(), ProtocolError> {
    if frame.command == command && frame.source == destination && frame.destination == local {
        return Ok(());
    }
    Err(ProtocolError::UnexpectedResponse {
        command: frame.command,
        from: frame.source,
        to: frame.destination,
        expected_command: command,
        expected_from: destination,
        expected_to: local,
    })
}
