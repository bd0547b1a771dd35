//! Call controller behavior: validation, redial, call events, mute, DTMF,
//! inbound calls and forwarding

mod common;

use std::sync::atomic::Ordering;
use std::time::Duration;

use common::{eventually, FakeCall, Harness};
use tokio::time::Instant;
use voicehub_core::call::{CallDirection, CallState};
use voicehub_core::config::{CallConfig, ForwardConfig};
use voicehub_core::sdk::{CallEvent, SdkError};
use voicehub_core::{ClientError, SessionStatus};

fn config() -> CallConfig {
    CallConfig::default()
}

#[tokio::test]
async fn test_invalid_destination_never_reaches_sdk() {
    let harness = Harness::new();
    let device = harness.live_device().await;
    let calls = harness.calls(&config());

    for bad in ["12345", "+12ab567890", "+123", "sip:bob@example.com", ""] {
        let err = calls.place(bad).await.unwrap_err();
        assert!(matches!(err, ClientError::InvalidAddress { .. }), "{bad} should be rejected");
    }

    assert_eq!(device.connect_count(), 0);
    assert_eq!(calls.state(), CallState::Idle);
    assert!(harness.log.contains("Invalid number format. Use +countrycode or client:identity"));
}

#[tokio::test]
async fn test_place_requires_live_session() {
    let harness = Harness::new();
    let calls = harness.calls(&config());

    let err = calls.place("+15551234567").await.unwrap_err();
    assert!(matches!(err, ClientError::InvalidState { .. }));
    assert!(harness.log.contains("Device not ready"));
}

#[tokio::test]
async fn test_outbound_call_lifecycle() {
    let harness = Harness::new();
    let device = harness.live_device().await;
    let calls = harness.calls(&config());

    let call = calls.place("+15551234567").await.unwrap();
    assert_eq!(call.state, CallState::Ringing);
    assert_eq!(call.direction, CallDirection::Outbound);
    assert_eq!(harness.session.status(), SessionStatus::Calling);
    assert_eq!(device.connects.lock()[0].0.get("To"), Some("+15551234567"));
    assert!(harness.log.contains("Making call to: +15551234567"));
    assert!(harness.log.contains("Call initiated, waiting for response..."));

    let sdk_call = device.last_call().unwrap();
    sdk_call.emit(CallEvent::Accept);
    eventually("active", || calls.state() == CallState::Active).await;
    assert!(harness.log.contains("Call accepted (CallSid: CA001)"));
    assert_eq!(calls.current_call().unwrap().call_sid.as_deref(), Some("CA001"));

    calls.hangup();
    eventually("idle", || calls.state() == CallState::Idle).await;
    assert!(sdk_call.disconnected.load(Ordering::SeqCst));
    assert!(calls.current_call().is_none());
    assert_eq!(harness.session.status(), SessionStatus::Ready);
    assert!(harness.log.contains("Call ended"));
}

#[tokio::test]
async fn test_second_place_while_busy_is_rejected() {
    let harness = Harness::new();
    let device = harness.live_device().await;
    let calls = harness.calls(&config());

    calls.place("client:alice").await.unwrap();
    let err = calls.place("+15551234567").await.unwrap_err();

    assert!(matches!(err, ClientError::InvalidState { .. }));
    assert_eq!(device.connect_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_gateway_error_is_redialed_exactly_once_after_two_seconds() {
    let harness = Harness::new();
    let device = harness.live_device().await;
    let calls = harness.calls(&config());

    device.fail_next_connect(SdkError::with_code(31005, "Gateway HANGUP"));
    device.fail_next_connect(SdkError::with_code(31005, "Gateway HANGUP"));
    device.fail_next_connect(SdkError::with_code(31005, "Gateway HANGUP"));

    let started = Instant::now();
    let err = calls.place("+15551234567").await.unwrap_err();

    assert!(err.is_gateway_error());
    assert_eq!(device.connect_count(), 2);
    let times = device.connect_times();
    let gap = times[1] - times[0];
    assert!(gap >= Duration::from_secs(2) && gap < Duration::from_secs(3), "gap was {gap:?}");
    assert!(started.elapsed() < Duration::from_secs(3));

    assert!(harness.log.contains("Gateway error (31005): Gateway HANGUP"));
    assert!(harness.log.contains("Attempting to reconnect..."));
    assert!(harness.log.contains("Reconnection failed: Gateway HANGUP"));
    assert_eq!(harness.session.status(), SessionStatus::Ready);
    assert_eq!(calls.state(), CallState::Idle);

    // Nothing else is scheduled
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(device.connect_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_gateway_error_then_success() {
    let harness = Harness::new();
    let device = harness.live_device().await;
    let calls = harness.calls(&config());

    device.fail_next_connect(SdkError::with_code(31005, "Gateway HANGUP"));
    let mut status = harness.session.subscribe_status();

    let place = calls.place("+15551234567");
    tokio::pin!(place);
    tokio::select! {
        _ = &mut place => panic!("placement should wait for the redial"),
        _ = status.wait_for(|s| *s == SessionStatus::Reconnecting) => {}
    }
    let call = place.await.unwrap();

    assert_eq!(call.state, CallState::Ringing);
    assert_eq!(device.connect_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_other_errors_are_not_redialed() {
    let harness = Harness::new();
    let device = harness.live_device().await;
    let calls = harness.calls(&config());

    device.fail_next_connect(SdkError::with_code(31486, "Busy Here"));
    let err = calls.place("+15551234567").await.unwrap_err();

    assert_eq!(err.provider_code(), Some(31486));
    assert_eq!(device.connect_count(), 1);
    assert!(harness.log.contains("Call failed: Busy Here"));
    assert!(!harness.log.contains("Attempting to reconnect..."));
    assert_eq!(harness.session.status(), SessionStatus::Ready);
}

#[tokio::test]
async fn test_mute_and_dtmf_need_an_active_call() {
    let harness = Harness::new();
    let device = harness.live_device().await;
    let calls = harness.calls(&config());

    assert_eq!(calls.toggle_mute(), None);
    calls.send_digit('5').await.unwrap();

    calls.place("+15551234567").await.unwrap();
    let sdk_call = device.last_call().unwrap();
    sdk_call.emit(CallEvent::Accept);
    eventually("active", || calls.state() == CallState::Active).await;

    assert_eq!(calls.toggle_mute(), Some(true));
    assert!(sdk_call.muted.load(Ordering::SeqCst));
    assert_eq!(calls.toggle_mute(), Some(false));
    assert!(harness.log.contains("Muted"));
    assert!(harness.log.contains("Unmuted"));

    calls.send_digit('5').await.unwrap();
    calls.send_digit('#').await.unwrap();
    assert_eq!(sdk_call.sent_digits(), "5#");
    assert!(harness.log.contains("DTMF sent: #"));

    let err = calls.send_digit('x').await.unwrap_err();
    assert_eq!(err, ClientError::InvalidDtmf { digit: 'x' });
}

#[tokio::test]
async fn test_disconnect_clears_mute() {
    let harness = Harness::new();
    let device = harness.live_device().await;
    let calls = harness.calls(&config());

    calls.place("+15551234567").await.unwrap();
    let sdk_call = device.last_call().unwrap();
    sdk_call.muted.store(true, Ordering::SeqCst);
    sdk_call.emit(CallEvent::Accept);
    eventually("active", || calls.state() == CallState::Active).await;
    assert!(calls.current_call().unwrap().muted);

    sdk_call.emit(CallEvent::Disconnect);
    eventually("idle", || calls.state() == CallState::Idle).await;
    assert_eq!(calls.toggle_mute(), None);
}

#[tokio::test]
async fn test_call_error_event_is_only_logged() {
    let harness = Harness::new();
    let device = harness.live_device().await;
    let calls = harness.calls(&config());

    calls.place("+15551234567").await.unwrap();
    device
        .last_call()
        .unwrap()
        .emit(CallEvent::Error(SdkError::with_code(31003, "ICE failed")));

    eventually("logged", || harness.log.contains("Call error: ICE failed")).await;
    assert_eq!(calls.state(), CallState::Ringing);
}

#[tokio::test]
async fn test_inbound_call_is_auto_answered() {
    let harness = Harness::new();
    harness.live_device().await;
    let calls = harness.calls(&config());

    let (sdk_call, connection) = FakeCall::incoming("+15550001111", "CA777");
    calls.handle_incoming(connection).await;

    assert!(sdk_call.accepted.load(Ordering::SeqCst));
    eventually("active", || calls.state() == CallState::Active).await;
    let call = calls.current_call().unwrap();
    assert_eq!(call.direction, CallDirection::Inbound);
    assert_eq!(call.remote, "+15550001111");
    assert!(harness.log.contains("Call accepted (CallSid: CA777)"));
}

#[tokio::test]
async fn test_inbound_call_waits_for_answer_without_auto_answer() {
    let harness = Harness::new();
    harness.live_device().await;
    let calls = harness.calls(&CallConfig {
        auto_answer: false,
        ..CallConfig::default()
    });

    let (sdk_call, connection) = FakeCall::incoming("+15550001111", "CA778");
    calls.handle_incoming(connection).await;
    assert_eq!(calls.state(), CallState::Ringing);
    assert!(!sdk_call.accepted.load(Ordering::SeqCst));

    calls.answer().await.unwrap();
    eventually("active", || calls.state() == CallState::Active).await;
}

#[tokio::test]
async fn test_inbound_call_while_busy_is_rejected() {
    let harness = Harness::new();
    harness.live_device().await;
    let calls = harness.calls(&config());
    calls.place("+15551234567").await.unwrap();

    let (sdk_call, connection) = FakeCall::incoming("+15550001111", "CA779");
    calls.handle_incoming(connection).await;

    assert!(sdk_call.rejected.load(Ordering::SeqCst));
    assert_eq!(calls.current_call().unwrap().direction, CallDirection::Outbound);
}

#[tokio::test]
async fn test_forward_call_posts_active_call_sid() {
    let harness = Harness::new();
    let device = harness.live_device().await;
    let calls = harness.calls(&CallConfig {
        forward: ForwardConfig {
            auth_token: Some("secret".to_string()),
            core_number: Some("+15550009999".to_string()),
            ..ForwardConfig::default()
        },
        ..CallConfig::default()
    });

    assert!(matches!(
        calls.forward_call("+15550003333").await,
        Err(ClientError::InvalidState { .. })
    ));

    calls.place("+15551234567").await.unwrap();
    device.last_call().unwrap().emit(CallEvent::Accept);
    eventually("active", || calls.state() == CallState::Active).await;

    calls.forward_call("+15550003333").await.unwrap();

    let forwards = harness.backend.forwards.lock().clone();
    assert_eq!(forwards.len(), 1);
    let (request, bearer) = &forwards[0];
    assert_eq!(request.conference_sid, "CA001");
    assert_eq!(request.core_call_number, "+15550009999");
    assert_eq!(request.new_number, "+15550003333");
    assert_eq!(bearer, "secret");
    assert!(harness.log.contains("Call forwarded to: +15550003333"));
}

#[tokio::test]
async fn test_forward_trigger_digit_is_opt_in() {
    let harness = Harness::new();
    let device = harness.live_device().await;

    // Default config: 9 is just a digit
    let calls = harness.calls(&config());
    calls.place("+15551234567").await.unwrap();
    device.last_call().unwrap().emit(CallEvent::Accept);
    eventually("active", || calls.state() == CallState::Active).await;
    calls.send_digit('9').await.unwrap();
    assert!(harness.backend.forwards.lock().is_empty());
    calls.hangup();
    eventually("idle", || calls.state() == CallState::Idle).await;

    let calls = harness.calls(&CallConfig {
        forward: ForwardConfig {
            trigger_digit: Some('9'),
            default_target: Some("+15550003333".to_string()),
            auth_token: Some("secret".to_string()),
            core_number: None,
        },
        ..CallConfig::default()
    });
    calls.place("+15551234567").await.unwrap();
    let sdk_call = device.last_call().unwrap();
    sdk_call.emit(CallEvent::Accept);
    eventually("active", || calls.state() == CallState::Active).await;

    calls.send_digit('9').await.unwrap();

    assert_eq!(sdk_call.sent_digits(), "9");
    let forwards = harness.backend.forwards.lock().clone();
    assert_eq!(forwards.len(), 1);
    // Without a configured core number the remote party is used
    assert_eq!(forwards[0].0.core_call_number, "+15551234567");
    assert_eq!(forwards[0].0.conference_sid, "CA002");
}

#[tokio::test]
async fn test_forward_trigger_failure_is_logged() {
    let harness = Harness::new();
    let device = harness.live_device().await;
    let calls = harness.calls(&CallConfig {
        forward: ForwardConfig {
            trigger_digit: Some('9'),
            default_target: Some("+15550003333".to_string()),
            auth_token: None,
            core_number: None,
        },
        ..CallConfig::default()
    });
    calls.place("+15551234567").await.unwrap();
    let sdk_call = device.last_call().unwrap();
    sdk_call.emit(CallEvent::Accept);
    eventually("active", || calls.state() == CallState::Active).await;

    calls.send_digit('9').await.unwrap();

    assert_eq!(sdk_call.sent_digits(), "9");
    assert!(harness.backend.forwards.lock().is_empty());
    assert!(harness.log.contains("Configuration error: calls.forward.auth_token is not set"));
    assert_eq!(calls.state(), CallState::Active);
}
