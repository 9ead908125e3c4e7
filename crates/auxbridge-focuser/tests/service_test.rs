//! Focuser service behavior against a simulated device.

mod common;

use std::time::Duration;

use auxbridge_focuser::{Direction, FocuserConfig, FocuserError, FocuserEvent, FocuserHandle, FocuserService};
use auxbridge_protocol::Command;
use common::{connect, Device};
use tokio::sync::broadcast;
use tokio::time::timeout;

fn start(device: &Device) -> (FocuserHandle, tokio::task::JoinHandle<()>) {
    let config = FocuserConfig::default();
    let focuser = connect(device, &config);
    FocuserService::spawn(focuser, config)
}

/// Wait for the first event matching `pred`, skipping others.
async fn next_matching(
    events: &mut broadcast::Receiver<FocuserEvent>,
    pred: impl Fn(&FocuserEvent) -> bool,
) -> FocuserEvent {
    timeout(Duration::from_secs(30), async {
        loop {
            let event = events.recv().await.unwrap();
            if pred(&event) {
                return event;
            }
        }
    })
    .await
    .expect("event did not arrive")
}

#[tokio::test(start_paused = true)]
async fn test_commands_require_connection() {
    let device = Device::at(100);
    let (handle, _task) = start(&device);

    assert!(matches!(handle.position().await, Err(FocuserError::NotConnected)));
    assert!(matches!(handle.goto(10).await, Err(FocuserError::NotConnected)));
    assert!(device.requests().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_connect_publishes_state() {
    let device = Device::at(2500);
    let (handle, _task) = start(&device);
    let mut events = handle.subscribe();

    let version = handle.connect().await.unwrap();
    assert_eq!(version.to_string(), "7.11.1234");

    assert_eq!(
        events.recv().await.unwrap(),
        FocuserEvent::Connected {
            version: "7.11.1234".to_string()
        }
    );
    assert_eq!(
        events.recv().await.unwrap(),
        FocuserEvent::PositionChanged { position: 2500 }
    );

    let state = handle.state();
    assert!(state.connected);
    assert_eq!(state.position, 2500);
    assert!(!state.moving);
}

#[tokio::test(start_paused = true)]
async fn test_goto_polls_until_target_reached() {
    let device = Device::at(1000);
    let (handle, _task) = start(&device);
    handle.connect().await.unwrap();
    let mut events = handle.subscribe();

    handle.goto(3000).await.unwrap();
    assert_eq!(
        events.recv().await.unwrap(),
        FocuserEvent::MoveStarted { target: Some(3000) }
    );
    let state = handle.state();
    assert!(state.moving);
    assert_eq!(state.target, Some(3000));

    let reached = next_matching(&mut events, |e| matches!(e, FocuserEvent::TargetReached { .. })).await;
    assert_eq!(reached, FocuserEvent::TargetReached { position: 3000 });

    let state = handle.state();
    assert!(!state.moving);
    assert_eq!(state.target, None);
    assert_eq!(state.position, 3000);
    assert_eq!(device.payloads(Command::SlewDone).len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_step_uses_known_position() {
    let device = Device::at(800);
    let (handle, _task) = start(&device);
    handle.connect().await.unwrap();

    assert_eq!(handle.step(Direction::In, 200).await.unwrap(), 1000);
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(device.payloads(Command::GotoFast), vec![vec![0x00, 0x03, 0xE8]]);
}

#[tokio::test(start_paused = true)]
async fn test_move_uses_configured_speed() {
    let device = Device::default();
    let (handle, _task) = start(&device);
    handle.connect().await.unwrap();

    assert!(matches!(handle.set_speed(0).await, Err(FocuserError::InvalidSpeed(0))));
    handle.set_speed(8).await.unwrap();
    assert_eq!(handle.state().speed, 8);

    handle.move_focuser(Direction::Out, None).await.unwrap();
    handle.move_focuser(Direction::Out, Some(2)).await.unwrap();
    assert_eq!(device.payloads(Command::MoveNeg), vec![vec![8], vec![2]]);
    assert_eq!(handle.state().speed, 2);
    assert!(handle.state().moving);

    handle.stop().await.unwrap();
    assert!(!handle.state().moving);
}

#[tokio::test(start_paused = true)]
async fn test_lost_device_disconnects_and_reconnects() {
    let device = Device::at(50);
    let (handle, _task) = start(&device);
    handle.connect().await.unwrap();
    let mut events = handle.subscribe();

    device.set_silent(true);
    let err = handle.position().await.unwrap_err();
    assert!(matches!(err, FocuserError::Command(_)));
    assert!(!handle.state().connected);

    let failed = next_matching(&mut events, |e| matches!(e, FocuserEvent::CommandFailed { .. })).await;
    assert!(matches!(failed, FocuserEvent::CommandFailed { ref operation, .. } if operation == "position"));
    assert_eq!(events.recv().await.unwrap(), FocuserEvent::Disconnected);

    assert!(matches!(handle.position().await, Err(FocuserError::NotConnected)));

    device.set_silent(false);
    handle.connect().await.unwrap();
    assert!(handle.state().connected);
}

#[tokio::test(start_paused = true)]
async fn test_backlash_through_service() {
    let device = Device::default();
    let (handle, _task) = start(&device);
    handle.connect().await.unwrap();

    handle.set_backlash(Direction::Out, 12).await.unwrap();
    assert_eq!(handle.backlash(Direction::Out).await.unwrap(), 12);
    assert!(matches!(
        handle.set_backlash(Direction::Out, 150).await,
        Err(FocuserError::InvalidBacklash(150))
    ));
    // Argument errors do not cost the connection.
    assert!(handle.state().connected);
}

#[tokio::test(start_paused = true)]
async fn test_service_stops_with_last_handle() {
    let device = Device::default();
    let (handle, task) = start(&device);
    let watcher = handle.watch_state();

    drop(handle);
    timeout(Duration::from_secs(1), task).await.unwrap().unwrap();
    assert!(watcher.has_changed().is_err());
}
