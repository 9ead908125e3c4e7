//! Focuser service task.
//!
//! One task owns the [`Focuser`] and with it the transport, so exchanges on
//! the bus never interleave. Callers talk to it through a cloneable
//! [`FocuserHandle`]: each request travels over an mpsc queue with a oneshot
//! for the answer. The task publishes every state change on a watch channel
//! and notable transitions on a broadcast channel.
//!
//! While a move is in progress the task asks the focuser whether it has
//! finished every poll interval. Any failed exchange marks the focuser
//! disconnected until [`FocuserHandle::connect`] succeeds again.

use std::time::Duration;

use auxbridge_link::AuxTransport;
use auxbridge_metrics::metric_defs;
use auxbridge_protocol::MAX_MOVE_RATE;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::FocuserConfig;
use crate::error::{FocuserError, FocuserResult};
use crate::focuser::{Direction, FirmwareVersion, Focuser};
use crate::state::{FocuserEvent, FocuserState};

const REQUEST_QUEUE: usize = 32;
const EVENT_QUEUE: usize = 64;

type Responder<R> = oneshot::Sender<FocuserResult<R>>;

enum Request {
    Connect(Responder<FirmwareVersion>),
    Position(Responder<u32>),
    Goto { position: u32, reply: Responder<()> },
    Move { direction: Direction, speed: Option<u8>, reply: Responder<()> },
    Stop(Responder<()>),
    Step { direction: Direction, steps: u32, reply: Responder<u32> },
    SetSpeed { speed: u8, reply: Responder<()> },
    Backlash { direction: Direction, reply: Responder<u8> },
    SetBacklash { direction: Direction, value: u8, reply: Responder<()> },
}

/// Starts the focuser task.
pub struct FocuserService;

impl FocuserService {
    /// Spawn the task and return a handle to it together with its join handle.
    ///
    /// The task runs until every [`FocuserHandle`] has been dropped. It does
    /// not contact the focuser until [`FocuserHandle::connect`] is called.
    pub fn spawn<T>(focuser: Focuser<T>, config: FocuserConfig) -> (FocuserHandle, JoinHandle<()>)
    where
        T: AuxTransport + 'static,
    {
        let (request_tx, request_rx) = mpsc::channel(REQUEST_QUEUE);
        let initial = FocuserState {
            speed: config.default_speed,
            ..FocuserState::default()
        };
        let (state_tx, state_rx) = watch::channel(initial.clone());
        let (event_tx, _) = broadcast::channel(EVENT_QUEUE);

        // interval() panics on a zero period.
        let mut poll = interval(config.poll_interval().max(Duration::from_millis(1)));
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let task = ServiceTask {
            focuser,
            requests: request_rx,
            state: initial,
            state_tx,
            events: event_tx.clone(),
            poll,
        };
        let join = tokio::spawn(task.run());

        let handle = FocuserHandle {
            requests: request_tx,
            state: state_rx,
            events: event_tx,
        };
        (handle, join)
    }
}

/// Client side of the focuser service.
#[derive(Clone)]
pub struct FocuserHandle {
    requests: mpsc::Sender<Request>,
    state: watch::Receiver<FocuserState>,
    events: broadcast::Sender<FocuserEvent>,
}

impl FocuserHandle {
    /// Latest state snapshot.
    pub fn state(&self) -> FocuserState {
        self.state.borrow().clone()
    }

    /// Receiver that sees every state update.
    pub fn watch_state(&self) -> watch::Receiver<FocuserState> {
        self.state.clone()
    }

    /// Subscribe to events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<FocuserEvent> {
        self.events.subscribe()
    }

    /// Probe the focuser and mark it connected if it answers.
    pub async fn connect(&self) -> FocuserResult<FirmwareVersion> {
        self.request(Request::Connect).await
    }

    /// Read the position from the device.
    pub async fn position(&self) -> FocuserResult<u32> {
        self.request(Request::Position).await
    }

    pub async fn goto(&self, position: u32) -> FocuserResult<()> {
        self.request(|reply| Request::Goto { position, reply }).await
    }

    /// Start a continuous move, at the configured speed when `speed` is `None`.
    pub async fn move_focuser(&self, direction: Direction, speed: Option<u8>) -> FocuserResult<()> {
        self.request(|reply| Request::Move {
            direction,
            speed,
            reply,
        })
        .await
    }

    pub async fn stop(&self) -> FocuserResult<()> {
        self.request(Request::Stop).await
    }

    /// Move relative to the last known position. Returns the target.
    pub async fn step(&self, direction: Direction, steps: u32) -> FocuserResult<u32> {
        self.request(|reply| Request::Step {
            direction,
            steps,
            reply,
        })
        .await
    }

    /// Change the speed used by later continuous moves.
    pub async fn set_speed(&self, speed: u8) -> FocuserResult<()> {
        self.request(|reply| Request::SetSpeed { speed, reply }).await
    }

    pub async fn backlash(&self, direction: Direction) -> FocuserResult<u8> {
        self.request(|reply| Request::Backlash { direction, reply }).await
    }

    pub async fn set_backlash(&self, direction: Direction, value: u8) -> FocuserResult<()> {
        self.request(|reply| Request::SetBacklash {
            direction,
            value,
            reply,
        })
        .await
    }

    async fn request<R>(&self, make: impl FnOnce(Responder<R>) -> Request) -> FocuserResult<R> {
        let (tx, rx) = oneshot::channel();
        self.requests
            .send(make(tx))
            .await
            .map_err(|_| FocuserError::ServiceStopped)?;
        rx.await.map_err(|_| FocuserError::ServiceStopped)?
    }
}

enum Wake {
    Request(Option<Request>),
    Poll,
}

struct ServiceTask<T> {
    focuser: Focuser<T>,
    requests: mpsc::Receiver<Request>,
    state: FocuserState,
    state_tx: watch::Sender<FocuserState>,
    events: broadcast::Sender<FocuserEvent>,
    poll: Interval,
}

impl<T: AuxTransport> ServiceTask<T> {
    async fn run(mut self) {
        debug!("focuser service started");
        loop {
            let wake = tokio::select! {
                request = self.requests.recv() => Wake::Request(request),
                _ = self.poll.tick(), if self.state.moving => Wake::Poll,
            };

            match wake {
                Wake::Request(Some(request)) => self.handle(request).await,
                Wake::Request(None) => break,
                Wake::Poll => self.poll_motion().await,
            }
        }
        debug!("focuser service stopped");
    }

    async fn handle(&mut self, request: Request) {
        match request {
            Request::Connect(reply) => {
                let result = self.connect().await;
                let _ = reply.send(result);
            }
            Request::Position(reply) => {
                let result = match self.require_connected() {
                    Ok(()) => self.refresh_position().await,
                    Err(e) => Err(e),
                };
                let _ = reply.send(result);
            }
            Request::Goto { position, reply } => {
                let result = self.goto(position).await;
                let _ = reply.send(result);
            }
            Request::Move {
                direction,
                speed,
                reply,
            } => {
                let result = self.start_move(direction, speed).await;
                let _ = reply.send(result);
            }
            Request::Stop(reply) => {
                let result = self.stop().await;
                let _ = reply.send(result);
            }
            Request::Step {
                direction,
                steps,
                reply,
            } => {
                let result = self.step(direction, steps).await;
                let _ = reply.send(result);
            }
            Request::SetSpeed { speed, reply } => {
                let result = self.set_speed(speed);
                let _ = reply.send(result);
            }
            Request::Backlash { direction, reply } => {
                let result = match self.require_connected() {
                    Ok(()) => {
                        let result = self.focuser.backlash(direction).await;
                        self.check("backlash", result)
                    }
                    Err(e) => Err(e),
                };
                let _ = reply.send(result);
            }
            Request::SetBacklash {
                direction,
                value,
                reply,
            } => {
                let result = match self.require_connected() {
                    Ok(()) => {
                        let result = self.focuser.set_backlash(direction, value).await;
                        self.check("set_backlash", result)
                    }
                    Err(e) => Err(e),
                };
                let _ = reply.send(result);
            }
        }
    }

    async fn connect(&mut self) -> FocuserResult<FirmwareVersion> {
        let result = self.focuser.firmware_version().await;
        let version = self.check("connect", result)?;

        if !self.state.connected {
            info!(%version, "focuser connected");
            self.state.connected = true;
            metrics::gauge!(metric_defs::FOCUSER_CONNECTED.name).set(1.0);
            self.emit(FocuserEvent::Connected {
                version: version.to_string(),
            });
        }
        self.publish();

        self.refresh_position().await?;
        Ok(version)
    }

    async fn goto(&mut self, position: u32) -> FocuserResult<()> {
        self.require_connected()?;
        let result = self.focuser.goto(position).await;
        self.check("goto", result)?;
        self.begin_motion(Some(position));
        Ok(())
    }

    async fn start_move(&mut self, direction: Direction, speed: Option<u8>) -> FocuserResult<()> {
        self.require_connected()?;
        let speed = speed.unwrap_or(self.state.speed);
        let result = self.focuser.move_at(direction, speed).await;
        self.check("move", result)?;
        self.state.speed = speed;
        self.begin_motion(None);
        Ok(())
    }

    async fn stop(&mut self) -> FocuserResult<()> {
        self.require_connected()?;
        let result = self.focuser.stop().await;
        self.check("stop", result)?;
        self.state.moving = false;
        self.state.target = None;
        self.publish();
        self.refresh_position().await?;
        Ok(())
    }

    async fn step(&mut self, direction: Direction, steps: u32) -> FocuserResult<u32> {
        self.require_connected()?;
        let from = self.state.position;
        let result = self.focuser.step(direction, steps, from).await;
        let target = self.check("step", result)?;
        self.begin_motion(Some(target));
        Ok(target)
    }

    fn set_speed(&mut self, speed: u8) -> FocuserResult<()> {
        if !(1..=MAX_MOVE_RATE).contains(&speed) {
            return Err(FocuserError::InvalidSpeed(speed));
        }
        self.state.speed = speed;
        self.publish();
        Ok(())
    }

    async fn refresh_position(&mut self) -> FocuserResult<u32> {
        let result = self.focuser.position().await;
        let position = self.check("position", result)?;
        metrics::gauge!(metric_defs::FOCUSER_POSITION.name).set(position as f64);
        if position != self.state.position {
            self.state.position = position;
            self.emit(FocuserEvent::PositionChanged { position });
        }
        self.publish();
        Ok(position)
    }

    async fn poll_motion(&mut self) {
        let result = self.focuser.slew_done().await;
        match self.check("slew_done", result) {
            Ok(true) => {
                self.state.moving = false;
                self.state.target = None;
                self.publish();
                if let Ok(position) = self.refresh_position().await {
                    debug!(position, "move finished");
                    self.emit(FocuserEvent::TargetReached { position });
                }
            }
            Ok(false) => {}
            Err(e) => debug!(error = %e, "completion poll failed"),
        }
    }

    fn begin_motion(&mut self, target: Option<u32>) {
        self.state.moving = true;
        self.state.target = target;
        self.poll.reset();
        self.emit(FocuserEvent::MoveStarted { target });
        self.publish();
    }

    fn require_connected(&self) -> FocuserResult<()> {
        if self.state.connected {
            Ok(())
        } else {
            Err(FocuserError::NotConnected)
        }
    }

    /// Record a failed exchange and pass the result through.
    fn check<R>(&mut self, operation: &str, result: FocuserResult<R>) -> FocuserResult<R> {
        if let Err(e) = &result {
            self.emit(FocuserEvent::CommandFailed {
                operation: operation.to_string(),
                error: e.to_string(),
            });
            if e.is_link_failure() {
                self.mark_disconnected();
            }
        }
        result
    }

    fn mark_disconnected(&mut self) {
        if !self.state.connected {
            return;
        }
        warn!("focuser stopped responding");
        self.state.connected = false;
        self.state.moving = false;
        self.state.target = None;
        metrics::gauge!(metric_defs::FOCUSER_CONNECTED.name).set(0.0);
        self.emit(FocuserEvent::Disconnected);
        self.publish();
    }

    fn emit(&self, event: FocuserEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn publish(&self) {
        self.state_tx.send_replace(self.state.clone());
    }
}
