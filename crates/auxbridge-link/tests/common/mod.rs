//! Scripted in-memory transport for link tests.
//!
//! Each write pops the next [`Reply`] and schedules its bytes at fixed
//! offsets from the moment of the write. Reads wait on tokio's clock, so
//! tests run with `start_paused = true` and see exact virtual timings.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::time::Duration;

use auxbridge_link::{AuxTransport, TransportError};
use auxbridge_protocol::{encode, Command, Target};
use tokio::time::{sleep_until, Instant};

/// What the simulated device sends back after one write.
#[derive(Debug, Clone)]
pub struct Reply {
    /// Bytes of the reply.
    pub bytes: Vec<u8>,
    /// Delay from the write to the first byte.
    pub first_byte_after: Duration,
    /// Delay between consecutive bytes.
    pub gap: Duration,
}

impl Reply {
    /// Reply with `bytes`, starting 5 ms after the write, 1 ms apart.
    pub fn bytes(bytes: Vec<u8>) -> Self {
        Reply {
            bytes,
            first_byte_after: Duration::from_millis(5),
            gap: Duration::from_millis(1),
        }
    }

    /// No reply at all.
    pub fn silence() -> Self {
        Reply::bytes(Vec::new())
    }

    /// A well-formed frame from `source` to the application.
    pub fn frame(source: Target, command: Command, payload: &[u8]) -> Self {
        Reply::bytes(encode(source, Target::App, command, payload).unwrap())
    }

    /// Space the bytes `gap` apart.
    pub fn with_gap(mut self, gap: Duration) -> Self {
        self.gap = gap;
        self
    }

    /// Delay the first byte.
    pub fn after(mut self, delay: Duration) -> Self {
        self.first_byte_after = delay;
        self
    }
}

/// Transport whose input is scripted per write.
///
/// `read_byte` deadlines are exclusive, like [`StreamTransport`](auxbridge_link::StreamTransport).
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    replies: VecDeque<Reply>,
    incoming: VecDeque<(Instant, u8)>,
    /// Every buffer written, in order.
    pub writes: Vec<Vec<u8>>,
    /// Times at which each write happened.
    pub write_times: Vec<Instant>,
    /// Number of upcoming writes that report one byte short.
    pub short_writes: usize,
    /// Total bytes dropped by `discard_input`.
    pub discarded: usize,
}

impl ScriptedTransport {
    /// Transport that answers successive writes with `replies`, then stays silent.
    pub fn new(replies: impl IntoIterator<Item = Reply>) -> Self {
        ScriptedTransport {
            replies: replies.into_iter().collect(),
            ..Default::default()
        }
    }

    /// Bytes already waiting before anything is written.
    pub fn with_stale_input(mut self, bytes: &[u8]) -> Self {
        let now = Instant::now();
        self.incoming.extend(bytes.iter().map(|b| (now, *b)));
        self
    }

    /// Make the next `count` writes come up one byte short.
    pub fn with_short_writes(mut self, count: usize) -> Self {
        self.short_writes = count;
        self
    }

    /// Schedule `reply` relative to now without a write.
    pub fn push_incoming(&mut self, reply: Reply) {
        self.schedule(reply);
    }

    fn schedule(&mut self, reply: Reply) {
        let start = Instant::now() + reply.first_byte_after;
        for (i, byte) in reply.bytes.into_iter().enumerate() {
            self.incoming.push_back((start + reply.gap * i as u32, byte));
        }
    }
}

impl AuxTransport for ScriptedTransport {
    fn bytes_available(&mut self) -> usize {
        let now = Instant::now();
        self.incoming.iter().take_while(|(at, _)| *at <= now).count()
    }

    async fn read_byte(&mut self, deadline: Instant) -> Result<Option<u8>, TransportError> {
        match self.incoming.front().copied() {
            // A byte landing exactly on the deadline misses it.
            Some((at, byte)) if at < deadline => {
                sleep_until(at).await;
                self.incoming.pop_front();
                Ok(Some(byte))
            }
            _ => {
                sleep_until(deadline).await;
                Ok(None)
            }
        }
    }

    async fn write(&mut self, data: &[u8]) -> Result<usize, TransportError> {
        self.writes.push(data.to_vec());
        self.write_times.push(Instant::now());
        if self.short_writes > 0 {
            // A truncated request gets no answer.
            self.short_writes -= 1;
            return Ok(data.len() - 1);
        }
        if let Some(reply) = self.replies.pop_front() {
            self.schedule(reply);
        }
        Ok(data.len())
    }

    fn discard_input(&mut self) -> usize {
        let ready = self.bytes_available();
        self.incoming.drain(..ready);
        self.discarded += ready;
        ready
    }

    async fn flush(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
}
