use rendezvous_core::{ConnectionState, SignalingState};
use rendezvous_session::{SessionConfig, SessionError, SessionEvent, TransportEvent};
use std::sync::Arc;
use std::time::Duration;

use crate::integration::{create_test_session, create_test_session_with, init_tracing, test_config};
use crate::utils::{EVENT_TIMEOUT_MS, MockCapture, TransportCall, drain_events, wait_for_event};

#[tokio::test]
async fn test_close_twice_reports_once() {
    init_tracing();

    let mut session = create_test_session("alice");
    session.controller.start().await.unwrap();
    session.controller.create_and_send_offer().await.unwrap();
    drain_events(&mut session.events).await;

    session.controller.close().await;
    session.controller.close().await;

    let events = drain_events(&mut session.events).await;
    assert_eq!(
        events,
        vec![
            SessionEvent::SignalingStateChanged(SignalingState::Closed),
            SessionEvent::ConnectionStateChanged(ConnectionState::Closed),
        ]
    );

    let transport = session.transports.latest().await;
    let closes = transport
        .calls()
        .await
        .into_iter()
        .filter(|c| c == &TransportCall::Close)
        .count();
    assert_eq!(closes, 1);

    let snapshot = session.controller.snapshot().await.unwrap();
    assert_eq!(snapshot.signaling_state, None);
    assert_eq!(snapshot.remote_peer, None);
}

#[tokio::test]
async fn test_close_before_start_is_silent() {
    let mut session = create_test_session("alice");

    session.controller.close().await;

    assert!(drain_events(&mut session.events).await.is_empty());
    assert_eq!(session.transports.count().await, 0);
}

#[tokio::test]
async fn test_session_can_start_again_after_close() {
    init_tracing();

    let mut session = create_test_session("alice");
    session.controller.start().await.unwrap();
    session.controller.close().await;
    drain_events(&mut session.events).await;

    session.controller.start().await.expect("restart");
    session.controller.create_and_send_offer().await.unwrap();

    assert_eq!(session.transports.count().await, 2);
    let snapshot = session.controller.snapshot().await.unwrap();
    assert_eq!(snapshot.signaling_state, Some(SignalingState::HaveLocalOffer));
}

#[tokio::test]
async fn test_start_while_running_replaces_the_connection() {
    init_tracing();

    let mut session = create_test_session("alice");
    session.controller.start().await.unwrap();
    session.controller.start().await.expect("second start");

    assert_eq!(session.transports.count().await, 2);
    assert!(session.transports.connection(0).await.was_closed().await);
    assert!(!session.transports.connection(1).await.was_closed().await);

    let events = drain_events(&mut session.events).await;
    assert_eq!(
        events,
        vec![
            SessionEvent::ConnectionStateChanged(ConnectionState::New),
            SessionEvent::SignalingStateChanged(SignalingState::Stable),
            SessionEvent::ConnectionStateChanged(ConnectionState::New),
            SessionEvent::SignalingStateChanged(SignalingState::Stable),
        ]
    );
}

#[tokio::test]
async fn test_events_from_a_replaced_connection_are_dropped() {
    init_tracing();

    let mut session = create_test_session("alice");
    session.controller.start().await.unwrap();
    session.controller.start().await.unwrap();
    drain_events(&mut session.events).await;

    let stale = session.transports.connection(0).await;
    let current = session.transports.connection(1).await;

    stale
        .emit(TransportEvent::DataChannelOpened("stale".into()))
        .await;
    current
        .emit(TransportEvent::DataChannelOpened("fresh".into()))
        .await;

    let opened = wait_for_event(&mut session.events, EVENT_TIMEOUT_MS, |e| {
        matches!(e, SessionEvent::DataChannelOpen(_))
    })
    .await
    .unwrap();
    assert_eq!(opened, SessionEvent::DataChannelOpen("fresh".into()));

    let snapshot = session.controller.snapshot().await.unwrap();
    assert_eq!(snapshot.primary_channel.as_deref(), Some("fresh"));
}

#[tokio::test]
async fn test_capture_failure_leaves_session_unstarted() {
    init_tracing();

    let mut session = create_test_session_with(
        test_config("alice"),
        Arc::new(MockCapture::denied("camera permission denied")),
    );

    let err = session.controller.start().await.unwrap_err();
    assert!(matches!(err, SessionError::CaptureUnavailable(_)));
    assert_eq!(session.transports.count().await, 0);

    let err = session.controller.create_and_send_offer().await.unwrap_err();
    assert!(matches!(err, SessionError::NotStarted));
    assert!(drain_events(&mut session.events).await.is_empty());
}

#[tokio::test]
async fn test_close_abandons_pending_start() {
    init_tracing();

    let session = create_test_session_with(test_config("alice"), Arc::new(MockCapture::hanging()));

    let controller = session.controller.clone();
    let pending = tokio::spawn(async move { controller.start().await });
    tokio::time::sleep(Duration::from_millis(50)).await;

    session.controller.close().await;

    let result = tokio::time::timeout(Duration::from_millis(EVENT_TIMEOUT_MS), pending)
        .await
        .expect("start should be abandoned")
        .unwrap();
    assert!(matches!(result, Err(SessionError::Closed)));
    assert_eq!(session.transports.count().await, 0);

    // The session stays usable once the close has been handled.
    let snapshot = session.controller.snapshot().await.unwrap();
    assert_eq!(snapshot.signaling_state, None);
}

#[tokio::test]
async fn test_cancelled_close_does_not_block_later_starts() {
    init_tracing();

    let config = SessionConfig {
        command_buffer: 1,
        ..test_config("alice")
    };
    let session = create_test_session_with(
        config,
        Arc::new(MockCapture::slow(Duration::from_millis(200))),
    );

    let controller = session.controller.clone();
    let first_start = tokio::spawn(async move { controller.start().await });
    tokio::time::sleep(Duration::from_millis(50)).await;

    // Fills the only command slot while the loop is busy starting.
    let controller = session.controller.clone();
    let queued = tokio::spawn(async move { controller.snapshot().await });
    tokio::time::sleep(Duration::from_millis(20)).await;

    let cancelled = tokio::time::timeout(Duration::from_millis(5), session.controller.close()).await;
    assert!(cancelled.is_err());

    first_start.await.unwrap().expect("first start");
    queued.await.unwrap().expect("queued snapshot");

    session.controller.start().await.expect("later start");
    session.controller.create_and_send_offer().await.unwrap();
    assert_eq!(session.transports.count().await, 2);
}

#[tokio::test]
async fn test_connection_state_changes_are_forwarded_once() {
    init_tracing();

    let mut session = create_test_session("alice");
    session.controller.start().await.unwrap();
    drain_events(&mut session.events).await;

    let transport = session.transports.latest().await;
    for state in [
        ConnectionState::Connecting,
        ConnectionState::Connecting,
        ConnectionState::Connected,
    ] {
        transport
            .emit(TransportEvent::ConnectionStateChanged(state))
            .await;
    }

    let events = drain_events(&mut session.events).await;
    assert_eq!(
        events,
        vec![
            SessionEvent::ConnectionStateChanged(ConnectionState::Connecting),
            SessionEvent::ConnectionStateChanged(ConnectionState::Connected),
        ]
    );

    let snapshot = session.controller.snapshot().await.unwrap();
    assert_eq!(snapshot.connection_state, Some(ConnectionState::Connected));
}
