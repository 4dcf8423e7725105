use bytes::Bytes;
use rendezvous_core::{ConnectionState, IceCandidateInit, TrackHandle};
use tokio::sync::mpsc;
use tracing::debug;

/// Events the transport raises for the session loop.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// A local ICE candidate was gathered and must be trickled to the remote.
    CandidateGenerated(IceCandidateInit),

    ConnectionStateChanged(ConnectionState),

    RemoteTrack(TrackHandle),

    /// The remote opened a data channel towards us.
    IncomingDataChannel(String),

    DataChannelOpened(String),

    DataChannelClosed(String),

    /// Binary message received on the labelled channel.
    Message(String, Bytes),
}

/// Sender side handed to one connection. Every event is stamped with the
/// connection generation so the session can discard events from a connection
/// it already replaced.
#[derive(Clone)]
pub struct TransportEventSender {
    generation: u64,
    tx: mpsc::Sender<(u64, TransportEvent)>,
}

impl TransportEventSender {
    pub fn new(generation: u64, tx: mpsc::Sender<(u64, TransportEvent)>) -> Self {
        Self { generation, tx }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub async fn send(&self, event: TransportEvent) {
        if self.tx.send((self.generation, event)).await.is_err() {
            debug!(
                "Session loop gone, dropping transport event (generation {})",
                self.generation
            );
        }
    }
}
