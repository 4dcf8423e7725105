use crate::error::SessionError;
use crate::signaling::{LinkEvent, SignalingLink};
use async_trait::async_trait;
use rendezvous_core::SignalMessage;
use tokio::sync::mpsc;
use tracing::{debug, error};

/// One end of an in-process link pair.
pub struct LinkEndpoint {
    pub link: ChannelSignalingLink,
    pub events: mpsc::UnboundedReceiver<LinkEvent>,
}

/// In-memory signaling link. Frames are JSON text, as they would be on a socket.
pub struct ChannelSignalingLink {
    peer_tx: mpsc::UnboundedSender<LinkEvent>,
}

impl ChannelSignalingLink {
    /// Two connected ends. Each reports `Connected` at once and `Disconnected`
    /// when the other end is dropped.
    pub fn pair() -> (LinkEndpoint, LinkEndpoint) {
        let (a_tx, a_rx) = mpsc::unbounded_channel();
        let (b_tx, b_rx) = mpsc::unbounded_channel();

        let _ = a_tx.send(LinkEvent::Connected);
        let _ = b_tx.send(LinkEvent::Connected);

        (
            LinkEndpoint {
                link: Self { peer_tx: b_tx },
                events: a_rx,
            },
            LinkEndpoint {
                link: Self { peer_tx: a_tx },
                events: b_rx,
            },
        )
    }
}

#[async_trait]
impl SignalingLink for ChannelSignalingLink {
    async fn send(&self, msg: &SignalMessage) -> Result<(), SessionError> {
        let json = serde_json::to_string(msg).map_err(|e| {
            error!("Failed to serialize signal message: {}", e);
            SessionError::Link(e.to_string())
        })?;

        debug!("Link -> {}", msg.kind_name());
        self.peer_tx
            .send(LinkEvent::Frame(json))
            .map_err(|_| SessionError::Link("remote end of the link is gone".into()))
    }
}

impl Drop for ChannelSignalingLink {
    fn drop(&mut self) {
        let _ = self.peer_tx.send(LinkEvent::Disconnected);
    }
}
