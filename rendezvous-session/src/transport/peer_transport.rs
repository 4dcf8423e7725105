use crate::config::TransportConfig;
use crate::transport::TransportEventSender;
use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use rendezvous_core::{IceCandidateInit, MediaTracks, SessionDescription};
use std::sync::Arc;

/// One underlying peer connection, provided by a standards-compliant engine.
#[async_trait]
pub trait PeerTransport: Send + Sync {
    async fn add_local_tracks(&self, tracks: &MediaTracks) -> Result<()>;

    /// Create an offer and install it as the local description.
    async fn create_offer(&self) -> Result<SessionDescription>;

    /// Create an answer and install it as the local description.
    async fn create_answer(&self) -> Result<SessionDescription>;

    async fn set_remote_description(&self, desc: &SessionDescription) -> Result<()>;

    /// Abandon a pending local offer, returning the connection to stable.
    async fn rollback_local_offer(&self) -> Result<()>;

    async fn add_ice_candidate(&self, candidate: IceCandidateInit) -> Result<()>;

    async fn create_data_channel(&self, label: &str) -> Result<()>;

    async fn send_data(&self, label: &str, payload: Bytes) -> Result<()>;

    async fn close(&self) -> Result<()>;
}

#[async_trait]
pub trait TransportFactory: Send + Sync {
    async fn create_connection(
        &self,
        config: &TransportConfig,
        events: TransportEventSender,
    ) -> Result<Arc<dyn PeerTransport>>;
}
