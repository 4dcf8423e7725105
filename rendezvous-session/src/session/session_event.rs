use crate::error::{ErrorKind, SessionError};
use bytes::Bytes;
use rendezvous_core::{ConnectionState, PeerId, SignalingState, TrackHandle};
use tokio::sync::mpsc;
use tracing::warn;

/// Everything a session reports to the owning application, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    ConnectionStateChanged(ConnectionState),
    SignalingStateChanged(SignalingState),
    RemoteTrack(TrackHandle),
    DataChannelOpen(String),
    DataMessage(Bytes),
    SignalingConnected,
    SignalingDisconnected,
    Error { kind: ErrorKind, detail: String },
}

/// Point-in-time view of a session, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub local_peer: PeerId,
    /// `None` until `start()` and after `close()`.
    pub signaling_state: Option<SignalingState>,
    pub connection_state: Option<ConnectionState>,
    pub remote_peer: Option<PeerId>,
    pub pending_candidates: usize,
    pub primary_channel: Option<String>,
}

/// The single ordered sink all session events go through.
#[derive(Clone)]
pub(crate) struct EventSink {
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl EventSink {
    pub(crate) fn new(tx: mpsc::UnboundedSender<SessionEvent>) -> Self {
        Self { tx }
    }

    pub(crate) fn emit(&self, event: SessionEvent) {
        let _ = self.tx.send(event);
    }

    pub(crate) fn report(&self, err: &SessionError) {
        warn!("Session error ({:?}): {}", err.kind(), err);
        self.emit(SessionEvent::Error {
            kind: err.kind(),
            detail: err.to_string(),
        });
    }
}
