//! Main loop behavior across connection failures and drops
//!
//! Uses the scripted session and link from `detector_led::testing`, so no
//! broker or network is required.


use detector_led::actuator::OutputLevel;
use detector_led::testing::{RecordingLed, ScriptedLink, ScriptedSession, SessionCall};
use detector_led::transport::mqtt::reason;
use detector_led::{Device, LoopState, SessionManager};
use std::time::Duration;
use test_helpers::{test_config, TEST_TOPIC};

fn subscribe() -> SessionCall {
    SessionCall::Subscribe(TEST_TOPIC.to_string())
}

#[tokio::test]
async fn test_output_is_off_before_network_is_up() {
    let config = test_config();
    let link = ScriptedLink::new().failing(3);
    let attempts = link.clone();
    let led = RecordingLed::new();
    let mut device = Device::new(&config, link, ScriptedSession::new(), led.clone());

    let info = device.start().await;

    assert_eq!(led.history(), vec![OutputLevel::Off]);
    assert_eq!(info.attempts, 4);
    assert_eq!(attempts.attempts(), 4);
    assert_eq!(info.ssid, "test-net");
}

#[tokio::test]
async fn test_broker_refusals_are_retried_until_connected() {
    let config = test_config();
    let session = ScriptedSession::new()
        .fail_opens(2, reason::CONNECT_FAILED)
        .fail_opens(1, reason::BAD_CREDENTIALS)
        .with_message(TEST_TOPIC, b"1");
    let journal = session.journal();
    let led = RecordingLed::new();
    let mut device = Device::new(&config, ScriptedLink::new(), session, led.clone());

    device.start().await;
    let level = device.run_iteration().await;

    assert_eq!(level, Some(OutputLevel::On));
    assert_eq!(
        journal.calls(),
        vec![
            SessionCall::OpenFailed(reason::CONNECT_FAILED),
            SessionCall::OpenFailed(reason::CONNECT_FAILED),
            SessionCall::OpenFailed(reason::BAD_CREDENTIALS),
            SessionCall::Open,
            subscribe(),
            SessionCall::Service,
        ]
    );
    assert_eq!(device.sessions().sessions_opened(), 1);
    assert_eq!(led.history(), vec![OutputLevel::Off, OutputLevel::On]);
}

#[tokio::test]
async fn test_resubscribes_after_every_connection_drop() {
    let config = test_config();
    let session = ScriptedSession::new()
        .with_message(TEST_TOPIC, b"2")
        .with_connection_drop()
        .with_message(TEST_TOPIC, b"0")
        .with_connection_drop()
        .with_message(TEST_TOPIC, b"4");
    let journal = session.journal();
    let led = RecordingLed::new();
    let mut device = Device::new(&config, ScriptedLink::new(), session, led.clone());

    device.start().await;
    let mut levels = Vec::new();
    for _ in 0..5 {
        levels.push(device.run_iteration().await);
    }

    assert_eq!(
        levels,
        vec![
            Some(OutputLevel::On),
            None,
            Some(OutputLevel::Off),
            None,
            Some(OutputLevel::On),
        ]
    );
    assert_eq!(
        journal.calls(),
        vec![
            SessionCall::Open,
            subscribe(),
            SessionCall::Service,
            SessionCall::Service,
            SessionCall::Open,
            subscribe(),
            SessionCall::Service,
            SessionCall::Service,
            SessionCall::Open,
            subscribe(),
            SessionCall::Service,
        ]
    );
    assert_eq!(device.sessions().sessions_opened(), 3);
}

#[tokio::test]
async fn test_output_holds_while_disconnected() {
    let config = test_config();
    let session = ScriptedSession::new()
        .with_message(TEST_TOPIC, b"3")
        .with_connection_drop()
        .with_idle();
    let led = RecordingLed::new();
    let mut device = Device::new(&config, ScriptedLink::new(), session, led.clone());

    device.start().await;
    device.run_iteration().await;
    device.run_iteration().await;
    device.run_iteration().await;

    assert_eq!(led.history(), vec![OutputLevel::Off, OutputLevel::On]);
    assert_eq!(device.state(), LoopState::Servicing);
}

#[tokio::test]
async fn test_failed_subscribe_closes_and_retries() {
    let session = ScriptedSession::new().fail_subscribes(1);
    let journal = session.journal();
    let mut manager = SessionManager::new(session, TEST_TOPIC, Duration::ZERO);

    manager.ensure_connected().await;

    assert!(manager.is_connected());
    assert_eq!(
        journal.calls(),
        vec![
            SessionCall::Open,
            SessionCall::SubscribeFailed(TEST_TOPIC.to_string()),
            SessionCall::Close,
            SessionCall::Open,
            subscribe(),
        ]
    );
    assert_eq!(manager.sessions_opened(), 1);
}

#[tokio::test]
async fn test_retry_waits_the_fixed_delay() {
    let session = ScriptedSession::new().fail_opens(3, reason::CONNECT_FAILED);
    let journal = session.journal();
    let mut manager = SessionManager::new(session, TEST_TOPIC, Duration::from_secs(5));

    tokio::time::pause();
    let started = tokio::time::Instant::now();
    manager.ensure_connected().await;

    assert!(started.elapsed() >= Duration::from_secs(15));
    assert_eq!(journal.opens(), 1);
}

#[tokio::test]
async fn test_shutdown_closes_session() {
    let config = test_config();
    let session = ScriptedSession::new().with_idle();
    let journal = session.journal();
    let mut device = Device::new(&config, ScriptedLink::new(), session, RecordingLed::new());

    device.start().await;
    device.run_iteration().await;
    device.shutdown().await;

    assert_eq!(journal.calls().last(), Some(&SessionCall::Close));
    assert!(!device.sessions().is_connected());
}
