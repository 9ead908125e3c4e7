//! Byte transport consumed by the receiver and communicator.
//!
//! The AUX bus is a half-duplex serial line with no framing of its own. The
//! link layer needs only a handful of primitives from whatever carries the
//! bytes: a non-blocking "how much is waiting", a single-byte read that gives
//! up at a deadline, a counted write, and explicit input/output flushes.
//!
//! [`StreamTransport`] provides these on top of any tokio byte stream: a TCP
//! connection to a serial bridge, a serial device stream, or an in-memory
//! duplex pipe in tests.

use std::future::Future;
use std::io;

use bytes::{Buf, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, trace};

use crate::error::TransportError;

/// Size of each read from the underlying stream.
const READ_CHUNK_SIZE: usize = 256;

/// Chunks buffered between the reader task and the transport.
const CHANNEL_CAPACITY: usize = 256;

/// A duplex byte channel to an AUX device.
///
/// Implementations are owned by exactly one [`Communicator`](crate::Communicator);
/// nothing here needs to be thread-safe beyond `Send`.
pub trait AuxTransport: Send {
    /// Number of received bytes that can be read without waiting.
    fn bytes_available(&mut self) -> usize;

    /// Read one byte that arrives before `deadline`.
    ///
    /// The deadline is exclusive: a byte arriving exactly at `deadline` is
    /// left for the next call. Returns `Ok(None)` once the deadline is reached
    /// with nothing to read.
    fn read_byte(&mut self, deadline: Instant) -> impl Future<Output = Result<Option<u8>, TransportError>> + Send;

    /// Write as much of `data` as the transport accepts and return the count.
    fn write(&mut self, data: &[u8]) -> impl Future<Output = Result<usize, TransportError>> + Send;

    /// Drop every byte already received. Returns how many were dropped.
    fn discard_input(&mut self) -> usize;

    /// Wait until everything written has been handed to the device.
    fn flush(&mut self) -> impl Future<Output = Result<(), TransportError>> + Send;
}

/// [`AuxTransport`] over a tokio stream.
///
/// A background task reads the stream and forwards chunks through a bounded
/// channel, so checking for and discarding input never blocks.
pub struct StreamTransport<S> {
    writer: WriteHalf<S>,
    rx: mpsc::Receiver<Bytes>,
    /// Received but not yet consumed.
    pending: BytesMut,
    closed: bool,
    reader: JoinHandle<()>,
}

impl StreamTransport<TcpStream> {
    /// Connect to a serial-over-TCP bridge.
    pub async fn connect(addr: impl ToSocketAddrs) -> io::Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        debug!(peer = ?stream.peer_addr().ok(), "connected to AUX bridge");
        Ok(StreamTransport::new(stream))
    }
}

impl<S> StreamTransport<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    /// Wrap a stream. Must be called inside a tokio runtime.
    pub fn new(stream: S) -> Self {
        let (read_half, writer) = tokio::io::split(stream);
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let reader = tokio::spawn(run_reader(read_half, tx));

        StreamTransport {
            writer,
            rx,
            pending: BytesMut::with_capacity(READ_CHUNK_SIZE),
            closed: false,
            reader,
        }
    }

    /// Move every chunk the reader task has delivered into `pending`.
    fn pull_ready(&mut self) {
        loop {
            match self.rx.try_recv() {
                Ok(chunk) => self.pending.extend_from_slice(&chunk),
                Err(mpsc::error::TryRecvError::Empty) => break,
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    self.closed = true;
                    break;
                }
            }
        }
    }
}

impl<S> AuxTransport for StreamTransport<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    fn bytes_available(&mut self) -> usize {
        self.pull_ready();
        self.pending.len()
    }

    async fn read_byte(&mut self, deadline: Instant) -> Result<Option<u8>, TransportError> {
        loop {
            if self.pending.has_remaining() {
                return Ok(Some(self.pending.get_u8()));
            }
            if self.closed {
                return Err(TransportError::Closed);
            }
            tokio::select! {
                biased;
                _ = sleep_until(deadline) => return Ok(None),
                chunk = self.rx.recv() => match chunk {
                    Some(chunk) => self.pending.extend_from_slice(&chunk),
                    None => self.closed = true,
                },
            }
        }
    }

    async fn write(&mut self, data: &[u8]) -> Result<usize, TransportError> {
        let mut written = 0;
        while written < data.len() {
            let n = self.writer.write(&data[written..]).await?;
            if n == 0 {
                break;
            }
            written += n;
        }
        Ok(written)
    }

    fn discard_input(&mut self) -> usize {
        self.pull_ready();
        let dropped = self.pending.len();
        self.pending.clear();
        dropped
    }

    async fn flush(&mut self) -> Result<(), TransportError> {
        self.writer.flush().await?;
        Ok(())
    }
}

impl<S> Drop for StreamTransport<S> {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

/// Forward everything read from the stream until EOF, error, or the
/// transport is dropped.
async fn run_reader<S>(mut reader: ReadHalf<S>, tx: mpsc::Sender<Bytes>)
where
    S: AsyncRead,
{
    let mut buf = [0u8; READ_CHUNK_SIZE];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => {
                debug!("AUX stream closed by peer");
                break;
            }
            Ok(n) => {
                trace!(bytes = n, "AUX stream read");
                if tx.send(Bytes::copy_from_slice(&buf[..n])).await.is_err() {
                    break;
                }
            }
            Err(e) => {
                debug!(error = %e, "AUX stream read failed");
                break;
            }
        }
    }
}
