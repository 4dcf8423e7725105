use bytes::Bytes;
use rendezvous_core::{MediaConstraints, PeerId, SdpKind, SignalMessage, SignalingState};
use rendezvous_session::{NoCapture, SessionConfig, SessionError, SessionEvent, TransportEvent};
use std::sync::Arc;

use super::{candidate_from, offer_from};
use crate::integration::{create_test_session, create_test_session_with, init_tracing, test_config};
use crate::utils::{
    EVENT_TIMEOUT_MS, MockCapture, TransportCall, drain_events, drain_signals, next_signal,
    wait_for_event,
};

#[tokio::test]
async fn test_start_then_offer_sends_one_offer() {
    init_tracing();

    let mut session = create_test_session("alice");
    session.controller.start().await.expect("start");
    session
        .controller
        .create_and_send_offer()
        .await
        .expect("offer");

    let Ok(SignalMessage::Offer { to, from, sdp }) = next_signal(&mut session.outbound).await
    else {
        panic!("expected an offer");
    };
    assert_eq!(to, None);
    assert_eq!(from, PeerId::from("alice"));
    assert_eq!(sdp.kind(), SdpKind::Offer);
    assert_eq!(session.link.count_of("offer").await, 1);

    // The offering side opens the primary channel before offering.
    let transport = session.transports.latest().await;
    assert_eq!(
        transport.calls().await,
        vec![
            TransportCall::CreateDataChannel("data".into()),
            TransportCall::CreateOffer
        ]
    );

    let snapshot = session.controller.snapshot().await.unwrap();
    assert_eq!(snapshot.signaling_state, Some(SignalingState::HaveLocalOffer));
}

#[tokio::test]
async fn test_inbound_offer_is_held_until_accepted() {
    init_tracing();

    let config = SessionConfig {
        auto_answer: false,
        ..test_config("alice")
    };
    let mut session = create_test_session_with(config, Arc::new(NoCapture));
    session.controller.start().await.unwrap();

    session.controller.handle_inbound(offer_from("peerX")).await;

    let snapshot = session.controller.snapshot().await.unwrap();
    assert_eq!(
        snapshot.signaling_state,
        Some(SignalingState::HaveRemoteOffer)
    );
    assert_eq!(snapshot.remote_peer, Some(PeerId::from("peerX")));
    assert!(drain_signals(&mut session.outbound).await.is_empty());

    session.controller.accept_offer().await.expect("answer");

    let sent = drain_signals(&mut session.outbound).await;
    assert_eq!(sent.len(), 1);
    let SignalMessage::Answer { to, from, sdp } = &sent[0] else {
        panic!("expected an answer, got {:?}", sent[0]);
    };
    assert_eq!(to, &PeerId::from("peerX"));
    assert_eq!(from, &PeerId::from("alice"));
    assert_eq!(sdp.kind(), SdpKind::Answer);

    let snapshot = session.controller.snapshot().await.unwrap();
    assert_eq!(snapshot.signaling_state, Some(SignalingState::Stable));
}

#[tokio::test]
async fn test_auto_answer_replies_to_offer() {
    init_tracing();

    let mut session = create_test_session("alice");
    session.controller.start().await.unwrap();
    session.controller.handle_inbound(offer_from("peerX")).await;

    let answer = next_signal(&mut session.outbound).await.unwrap();
    assert!(matches!(
        answer,
        SignalMessage::Answer { ref to, .. } if to == &PeerId::from("peerX")
    ));

    let signaling: Vec<_> = drain_events(&mut session.events)
        .await
        .into_iter()
        .filter_map(|e| match e {
            SessionEvent::SignalingStateChanged(state) => Some(state),
            _ => None,
        })
        .collect();
    assert_eq!(
        signaling,
        vec![
            SignalingState::Stable,
            SignalingState::HaveRemoteOffer,
            SignalingState::Stable
        ]
    );
}

#[tokio::test]
async fn test_early_candidates_applied_in_order_after_answer() {
    init_tracing();

    let session = create_test_session("alice");
    session.controller.start().await.unwrap();

    for line in ["candidate:1", "candidate:2", "candidate:3"] {
        session
            .controller
            .handle_inbound(candidate_from("peerX", "alice", line))
            .await;
    }
    let snapshot = session.controller.snapshot().await.unwrap();
    assert_eq!(snapshot.pending_candidates, 3);

    session.controller.handle_inbound(offer_from("peerX")).await;
    let snapshot = session.controller.snapshot().await.unwrap();
    assert_eq!(snapshot.pending_candidates, 0);

    let transport = session.transports.latest().await;
    assert_eq!(
        transport.applied_candidates().await,
        vec!["candidate:1", "candidate:2", "candidate:3"]
    );

    // The answer is produced before any buffered candidate is applied.
    let calls = transport.calls().await;
    let answer_at = calls
        .iter()
        .position(|c| c == &TransportCall::CreateAnswer)
        .unwrap();
    let first_candidate_at = calls
        .iter()
        .position(|c| matches!(c, TransportCall::AddCandidate(_)))
        .unwrap();
    assert!(answer_at < first_candidate_at);
}

#[tokio::test]
async fn test_send_data_before_open_channel_fails() {
    init_tracing();

    let mut session = create_test_session("alice");

    let err = session.controller.send_data("too early").await.unwrap_err();
    assert!(matches!(err, SessionError::ChannelNotReady));

    session.controller.start().await.unwrap();
    session.controller.create_and_send_offer().await.unwrap();

    let err = session.controller.send_data("still early").await.unwrap_err();
    assert!(matches!(err, SessionError::ChannelNotReady));

    let transport = session.transports.latest().await;
    assert!(transport.sent_data().await.is_empty());

    transport
        .emit(TransportEvent::DataChannelOpened("data".into()))
        .await;
    let opened = wait_for_event(&mut session.events, EVENT_TIMEOUT_MS, |e| {
        matches!(e, SessionEvent::DataChannelOpen(_))
    })
    .await
    .unwrap();
    assert_eq!(opened, SessionEvent::DataChannelOpen("data".into()));

    session.controller.send_data("hello").await.expect("send");
    assert_eq!(
        transport.sent_data().await,
        vec![Bytes::from_static(b"hello")]
    );
}

#[tokio::test]
async fn test_local_tracks_are_attached_on_start() {
    init_tracing();

    let config = SessionConfig {
        media: MediaConstraints::default(),
        ..test_config("alice")
    };
    let session = create_test_session_with(config, Arc::new(MockCapture::camera_and_mic()));
    session.controller.start().await.unwrap();

    let transport = session.transports.latest().await;
    assert_eq!(transport.calls().await, vec![TransportCall::AddTracks(2)]);
}

#[tokio::test]
async fn test_glare_yields_and_answers() {
    init_tracing();

    let mut session = create_test_session("alice");
    session.controller.start().await.unwrap();
    session.controller.create_and_send_offer().await.unwrap();
    assert!(matches!(
        next_signal(&mut session.outbound).await.unwrap(),
        SignalMessage::Offer { .. }
    ));

    session.controller.handle_inbound(offer_from("bob")).await;

    let answer = next_signal(&mut session.outbound).await.unwrap();
    assert!(matches!(
        answer,
        SignalMessage::Answer { ref to, .. } if to == &PeerId::from("bob")
    ));

    let transport = session.transports.latest().await;
    assert!(transport.calls().await.contains(&TransportCall::Rollback));

    let snapshot = session.controller.snapshot().await.unwrap();
    assert_eq!(snapshot.signaling_state, Some(SignalingState::Stable));
    assert_eq!(snapshot.remote_peer, Some(PeerId::from("bob")));
}
