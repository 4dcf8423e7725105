use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::media::MediaCapture;
use crate::session::{
    EventSink, Session, SessionCommand, SessionEvent, SessionParts, SessionSnapshot,
};
use crate::signaling::{LinkEvent, SignalingLink};
use crate::transport::TransportFactory;
use bytes::Bytes;
use rendezvous_core::{PeerId, SignalMessage};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

/// Handle to one running session.
///
/// Every call is forwarded to the session loop and handled there in order.
/// Dropping every clone of the handle shuts the session down.
#[derive(Clone)]
pub struct SessionController {
    command_tx: mpsc::Sender<SessionCommand>,
    closing: Arc<watch::Sender<bool>>,
    local_peer: PeerId,
}

impl SessionController {
    /// Spawn the session loop on the current runtime.
    ///
    /// The receiver yields every [`SessionEvent`] in the order it happened.
    pub fn spawn(
        config: SessionConfig,
        capture: Arc<dyn MediaCapture>,
        factory: Arc<dyn TransportFactory>,
        link: Arc<dyn SignalingLink>,
        link_events: mpsc::UnboundedReceiver<LinkEvent>,
    ) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (command_tx, command_rx) = mpsc::channel(config.command_buffer.max(1));
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let closing = Arc::new(watch::Sender::new(false));
        let local_peer = config.local_peer.clone();

        info!("Spawning session for {}", local_peer);
        let session = Session::new(SessionParts {
            config,
            capture,
            factory,
            link,
            link_rx: link_events,
            command_rx,
            closing_tx: Arc::clone(&closing),
            sink: EventSink::new(event_tx),
        });
        tokio::spawn(session.run());

        (
            Self {
                command_tx,
                closing,
                local_peer,
            },
            event_rx,
        )
    }

    pub fn local_peer(&self) -> &PeerId {
        &self.local_peer
    }

    /// Acquire local media and create the underlying connection.
    pub async fn start(&self) -> Result<(), SessionError> {
        self.request(|reply| SessionCommand::Start { reply }).await?
    }

    pub async fn create_and_send_offer(&self) -> Result<(), SessionError> {
        self.request(|reply| SessionCommand::CreateOffer { reply })
            .await?
    }

    /// Answer a remote offer held back because auto-answer is off.
    pub async fn accept_offer(&self) -> Result<(), SessionError> {
        self.request(|reply| SessionCommand::AcceptOffer { reply })
            .await?
    }

    /// Hand over a message received from the rendezvous service.
    ///
    /// Failures are reported as [`SessionEvent::Error`], never returned.
    pub async fn handle_inbound(&self, msg: SignalMessage) {
        if self
            .command_tx
            .send(SessionCommand::Inbound(msg))
            .await
            .is_err()
        {
            warn!("Inbound message dropped: session loop is gone");
        }
    }

    pub async fn send_data(&self, payload: impl Into<Bytes>) -> Result<(), SessionError> {
        let payload = payload.into();
        self.request(|reply| SessionCommand::SendData { payload, reply })
            .await?
    }

    pub async fn snapshot(&self) -> Result<SessionSnapshot, SessionError> {
        self.request(|reply| SessionCommand::Snapshot { reply })
            .await
    }

    /// Abandon any in-flight operation and release every resource.
    /// Safe to call repeatedly.
    pub async fn close(&self) {
        // Only the loop lowers the flag, so `Close` must be queued with it.
        let Ok(permit) = self.command_tx.reserve().await else {
            debug!("close() after the session loop is gone");
            return;
        };
        let (reply, rx) = oneshot::channel();
        self.closing.send_replace(true);
        permit.send(SessionCommand::Close { reply });
        let _ = rx.await;
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> SessionCommand,
    ) -> Result<T, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.command_tx
            .send(build(reply))
            .await
            .map_err(|_| SessionError::Closed)?;
        rx.await.map_err(|_| SessionError::Closed)
    }
}
