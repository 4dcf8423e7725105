use async_trait::async_trait;
use rendezvous_core::SignalMessage;
use rendezvous_session::{SessionError, SignalingLink};
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};

/// Mock SignalingLink that captures all outgoing messages.
#[derive(Clone)]
pub struct MockSignalingLink {
    tx: mpsc::UnboundedSender<SignalMessage>,
    sent: Arc<Mutex<Vec<SignalMessage>>>,
}

impl MockSignalingLink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SignalMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let link = Self {
            tx,
            sent: Arc::new(Mutex::new(Vec::new())),
        };
        (link, rx)
    }

    pub async fn sent(&self) -> Vec<SignalMessage> {
        self.sent.lock().await.clone()
    }

    pub async fn count_of(&self, kind: &str) -> usize {
        self.sent
            .lock()
            .await
            .iter()
            .filter(|m| m.kind_name() == kind)
            .count()
    }
}

#[async_trait]
impl SignalingLink for MockSignalingLink {
    async fn send(&self, msg: &SignalMessage) -> Result<(), SessionError> {
        tracing::debug!("[MockSignaling] {} to {:?}", msg.kind_name(), msg.to_peer());

        self.sent.lock().await.push(msg.clone());
        let _ = self.tx.send(msg.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rendezvous_core::{PeerId, SessionDescription};

    #[tokio::test]
    async fn test_mock_signaling_captures_offer() {
        let (link, mut rx) = MockSignalingLink::new();
        let msg = SignalMessage::Offer {
            to: None,
            from: PeerId::from("alice"),
            sdp: SessionDescription::offer("v=0"),
        };

        link.send(&msg).await.unwrap();

        assert_eq!(rx.recv().await, Some(msg));
        assert_eq!(link.count_of("offer").await, 1);
    }
}
