use crate::error::SessionError;
use async_trait::async_trait;
use rendezvous_core::SignalMessage;

/// What the link reports to the session that owns it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    Connected,
    Disconnected,
    /// One inbound JSON-encoded [`SignalMessage`].
    Frame(String),
}

/// Outbound half of the duplex channel to the rendezvous service.
///
/// Reconnection and retry belong to the implementation, not to the session.
#[async_trait]
pub trait SignalingLink: Send + Sync {
    async fn send(&self, msg: &SignalMessage) -> Result<(), SessionError>;
}
