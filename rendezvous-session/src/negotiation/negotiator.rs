use crate::error::SessionError;
use crate::negotiation::{CandidateBuffer, DrainReport};
use crate::transport::PeerTransport;
use rendezvous_core::{
    IceCandidateInit, IceCandidateMsg, PeerId, SdpKind, SessionDescription, SignalingState,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What happened to an inbound remote candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateDisposition {
    Applied,
    Buffered,
    /// Belongs to a peer other than the bound one.
    Ignored,
}

/// A local offer ready to be sent. `to` is `None` until a remote is bound.
#[derive(Debug)]
pub struct LocalOffer {
    pub description: SessionDescription,
    pub to: Option<PeerId>,
}

/// A local answer ready to be sent, plus the result of draining the
/// candidates buffered before the remote offer arrived.
#[derive(Debug)]
pub struct LocalAnswer {
    pub description: SessionDescription,
    pub to: PeerId,
    pub drained: DrainReport,
}

/// Offer/answer state machine for one session.
///
/// Glare policy: a remote offer that arrives while a local offer is pending
/// always wins. The local offer is rolled back and this side continues as the
/// answerer.
pub struct Negotiator {
    state: SignalingState,
    remote_peer: Option<PeerId>,
    /// Peer the pending local offer was addressed to, if any.
    offer_target: Option<PeerId>,
    has_remote_description: bool,
    pending: CandidateBuffer,
    transport: Arc<dyn PeerTransport>,
}

impl Negotiator {
    pub fn new(transport: Arc<dyn PeerTransport>, queue_limit: Option<usize>) -> Self {
        Self {
            state: SignalingState::Stable,
            remote_peer: None,
            offer_target: None,
            has_remote_description: false,
            pending: CandidateBuffer::new(queue_limit),
            transport,
        }
    }

    pub fn state(&self) -> SignalingState {
        self.state
    }

    pub fn remote_peer(&self) -> Option<&PeerId> {
        self.remote_peer.as_ref()
    }

    pub fn has_remote_description(&self) -> bool {
        self.has_remote_description
    }

    pub fn pending_candidates(&self) -> usize {
        self.pending.len()
    }

    pub async fn start_offer(&mut self) -> Result<LocalOffer, SessionError> {
        self.expect_state("start_offer", SignalingState::Stable)?;

        let description = self.transport.create_offer().await?;

        self.offer_target = self.remote_peer.clone();
        if let Some(peer) = &self.offer_target {
            self.pending.retain_peer(peer);
        }
        self.transition(SignalingState::HaveLocalOffer);
        Ok(LocalOffer {
            description,
            to: self.offer_target.clone(),
        })
    }

    pub async fn on_remote_offer(
        &mut self,
        desc: SessionDescription,
        from: PeerId,
    ) -> Result<(), SessionError> {
        if desc.kind() != SdpKind::Offer {
            return Err(SessionError::MalformedMessage(format!(
                "offer message carries a description of type {}",
                desc.kind()
            )));
        }

        match self.state {
            SignalingState::Stable | SignalingState::HaveRemoteOffer => {}
            SignalingState::HaveLocalOffer => {
                info!("Glare with {}: abandoning local offer and answering", from);
                if let Err(e) = self.transport.rollback_local_offer().await {
                    warn!("Rollback of local offer failed: {:#}", e);
                }
                self.offer_target = None;
                self.transition(SignalingState::Stable);
            }
            state @ (SignalingState::HaveLocalPrAnswer | SignalingState::Closed) => {
                return Err(SessionError::InvalidState {
                    operation: "on_remote_offer",
                    state,
                });
            }
        }

        let previous = self.bind_peer(from);
        if let Err(e) = self.transport.set_remote_description(&desc).await {
            self.remote_peer = previous;
            return Err(e.into());
        }

        self.has_remote_description = true;
        self.transition(SignalingState::HaveRemoteOffer);
        Ok(())
    }

    pub async fn create_answer(&mut self) -> Result<LocalAnswer, SessionError> {
        self.expect_state("create_answer", SignalingState::HaveRemoteOffer)?;
        let Some(to) = self.remote_peer.clone() else {
            return Err(SessionError::InvalidState {
                operation: "create_answer",
                state: self.state,
            });
        };

        let description = self.transport.create_answer().await?;
        self.transition(SignalingState::Stable);

        let drained = self.drain_pending().await;
        Ok(LocalAnswer {
            description,
            to,
            drained,
        })
    }

    pub async fn on_remote_answer(
        &mut self,
        desc: SessionDescription,
        from: PeerId,
    ) -> Result<DrainReport, SessionError> {
        if self.state != SignalingState::HaveLocalOffer {
            return Err(SessionError::UnexpectedAnswer { state: self.state });
        }
        if desc.kind() != SdpKind::Answer {
            return Err(SessionError::MalformedMessage(format!(
                "answer message carries a description of type {}",
                desc.kind()
            )));
        }
        if let Some(expected) = &self.offer_target
            && expected != &from
        {
            return Err(SessionError::PeerMismatch {
                expected: expected.clone(),
                actual: from,
            });
        }

        let previous = self.bind_peer(from);
        if let Err(e) = self.transport.set_remote_description(&desc).await {
            self.remote_peer = previous;
            return Err(e.into());
        }

        self.has_remote_description = true;
        self.offer_target = None;
        self.transition(SignalingState::Stable);

        Ok(self.drain_pending().await)
    }

    pub async fn on_ice_candidate(
        &mut self,
        candidate: IceCandidateMsg,
    ) -> Result<CandidateDisposition, SessionError> {
        if self.state == SignalingState::Closed {
            return Err(SessionError::InvalidState {
                operation: "on_ice_candidate",
                state: self.state,
            });
        }

        let init = candidate.parse()?;

        if let Some(peer) = &self.remote_peer
            && peer != &candidate.peer
        {
            warn!(
                "Ignoring candidate from {} while bound to {}",
                candidate.peer, peer
            );
            return Ok(CandidateDisposition::Ignored);
        }

        // Queued candidates go first, or arrival order would break.
        if self.has_remote_description && self.pending.is_empty() {
            apply_candidate(self.transport.as_ref(), init).await?;
            Ok(CandidateDisposition::Applied)
        } else {
            self.pending.enqueue(candidate)?;
            Ok(CandidateDisposition::Buffered)
        }
    }

    /// Terminal. A new negotiation needs a new instance.
    pub fn reset(&mut self) {
        self.remote_peer = None;
        self.offer_target = None;
        self.has_remote_description = false;
        self.pending.clear();
        self.transition(SignalingState::Closed);
    }

    async fn drain_pending(&mut self) -> DrainReport {
        let transport = Arc::clone(&self.transport);
        let report = self
            .pending
            .drain_into(|candidate| {
                let transport = Arc::clone(&transport);
                async move {
                    let init = candidate.parse()?;
                    apply_candidate(transport.as_ref(), init).await
                }
            })
            .await;

        if report.applied > 0 || !report.is_clean() {
            debug!(
                "Drained candidate queue: {} applied, {} rejected",
                report.applied,
                report.failures.len()
            );
        }
        report
    }

    /// Returns the previously bound peer.
    fn bind_peer(&mut self, peer: PeerId) -> Option<PeerId> {
        self.pending.retain_peer(&peer);
        self.remote_peer.replace(peer)
    }

    fn expect_state(
        &self,
        operation: &'static str,
        expected: SignalingState,
    ) -> Result<(), SessionError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(SessionError::InvalidState {
                operation,
                state: self.state,
            })
        }
    }

    fn transition(&mut self, next: SignalingState) {
        if self.state != next {
            debug!("Signaling state {:?} -> {:?}", self.state, next);
            self.state = next;
        }
    }
}

async fn apply_candidate(
    transport: &dyn PeerTransport,
    candidate: IceCandidateInit,
) -> Result<(), SessionError> {
    transport
        .add_ice_candidate(candidate)
        .await
        .map_err(|e| SessionError::MalformedCandidate(format!("{:#}", e)))
}
