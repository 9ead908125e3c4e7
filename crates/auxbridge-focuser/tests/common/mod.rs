//! Simulated focuser on the far end of an in-memory stream.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use auxbridge_focuser::{Focuser, FocuserConfig};
use auxbridge_link::{Communicator, StreamTransport};
use auxbridge_protocol::{decode, encode, Command, Frame, Target, MAX_POSITION};
use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::task::JoinHandle;

/// Firmware reply: version 7.11, build 1234.
pub const VERSION_REPLY: [u8; 4] = [7, 11, 0x04, 0xD2];

/// Completion polls answered "still moving" before a goto finishes.
pub const POLLS_PER_MOVE: u32 = 2;

/// Observable state of the simulated device.
#[derive(Debug, Default)]
pub struct DeviceState {
    pub position: u32,
    pub target: u32,
    pub moving: bool,
    pub polls_remaining: u32,
    pub backlash: [u8; 2],
    /// Drop every request without answering.
    pub silent: bool,
    /// Answer without the leading sentinel byte.
    pub drop_sentinel: bool,
    /// Every request received, in order.
    pub requests: Vec<Frame>,
}

#[derive(Clone, Default)]
pub struct Device {
    state: Arc<Mutex<DeviceState>>,
}

impl Device {
    pub fn at(position: u32) -> Self {
        let device = Device::default();
        device.with(|s| s.position = position);
        device
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut DeviceState) -> R) -> R {
        let mut state = self.state.lock().unwrap();
        f(&mut state)
    }

    pub fn position(&self) -> u32 {
        self.with(|s| s.position)
    }

    pub fn set_silent(&self, silent: bool) {
        self.with(|s| s.silent = silent);
    }

    pub fn requests(&self) -> Vec<Frame> {
        self.with(|s| s.requests.clone())
    }

    /// Requests received for `command`, by payload.
    pub fn payloads(&self, command: Command) -> Vec<Vec<u8>> {
        self.with(|s| {
            s.requests
                .iter()
                .filter(|f| f.command == command)
                .map(|f| f.payload.clone())
                .collect()
        })
    }

    /// Start serving requests on `stream`.
    pub fn serve(&self, stream: DuplexStream) -> JoinHandle<()> {
        let device = self.clone();
        tokio::spawn(async move { device.run(stream).await })
    }

    async fn run(self, mut stream: DuplexStream) {
        loop {
            let mut header = [0u8; 2];
            if stream.read_exact(&mut header).await.is_err() {
                return;
            }
            let mut rest = vec![0u8; header[1] as usize + 1];
            if stream.read_exact(&mut rest).await.is_err() {
                return;
            }
            let mut bytes = header.to_vec();
            bytes.extend_from_slice(&rest);
            let Ok(request) = decode(&bytes) else {
                continue;
            };

            if let Some(reply) = self.respond(request) {
                if stream.write_all(&reply).await.is_err() {
                    return;
                }
            }
        }
    }

    fn respond(&self, request: Frame) -> Option<Vec<u8>> {
        let mut s = self.state.lock().unwrap();
        s.requests.push(request.clone());
        if s.silent || request.destination != Target::Focuser {
            return None;
        }

        let payload: Vec<u8> = match request.command {
            Command::GetVersion => VERSION_REPLY.to_vec(),
            Command::GetPosition => s.position.to_be_bytes()[1..].to_vec(),
            Command::GotoFast => {
                let p = &request.payload;
                s.target = u32::from_be_bytes([0, p[0], p[1], p[2]]);
                s.moving = true;
                s.polls_remaining = POLLS_PER_MOVE;
                return None;
            }
            Command::MovePos | Command::MoveNeg if request.payload.first() == Some(&0) => {
                s.moving = false;
                return None;
            }
            Command::MovePos | Command::MoveNeg => {
                s.moving = true;
                s.target = if request.command == Command::MovePos { MAX_POSITION } else { 0 };
                s.polls_remaining = u32::MAX;
                Vec::new()
            }
            Command::SlewDone => {
                if s.moving && s.polls_remaining > 0 {
                    s.polls_remaining -= 1;
                    vec![0x00]
                } else {
                    if s.moving {
                        s.moving = false;
                        s.position = s.target;
                    }
                    vec![0xFF]
                }
            }
            Command::GetPosBacklash => vec![s.backlash[0]],
            Command::GetNegBacklash => vec![s.backlash[1]],
            Command::SetPosBacklash => {
                s.backlash[0] = request.payload[0];
                Vec::new()
            }
            Command::SetNegBacklash => {
                s.backlash[1] = request.payload[0];
                Vec::new()
            }
            _ => return None,
        };

        let mut reply = encode(Target::Focuser, request.source, request.command, &payload).ok()?;
        if s.drop_sentinel {
            reply.remove(0);
        }
        Some(reply)
    }
}

/// A focuser connected to a fresh simulated device.
pub fn connect(device: &Device, config: &FocuserConfig) -> Focuser<StreamTransport<DuplexStream>> {
    let (local, remote) = duplex(1024);
    device.serve(remote);
    Focuser::new(Communicator::with_config(StreamTransport::new(local), config.link.clone()))
}
