use crate::model::peer::PeerId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IceServerConfig {
    pub urls: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
}

impl IceServerConfig {
    pub fn stun(url: impl Into<String>) -> Self {
        Self {
            urls: vec![url.into()],
            username: None,
            credential: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SdpKind {
    Offer,
    Answer,
}

impl fmt::Display for SdpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SdpKind::Offer => f.write_str("offer"),
            SdpKind::Answer => f.write_str("answer"),
        }
    }
}

/// One half of a negotiation round. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    kind: SdpKind,
    body: String,
}

impl SessionDescription {
    pub fn offer(body: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Offer,
            body: body.into(),
        }
    }

    pub fn answer(body: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Answer,
            body: body.into(),
        }
    }

    pub fn kind(&self) -> SdpKind {
        self.kind
    }

    pub fn body(&self) -> &str {
        &self.body
    }
}

/// Structured form of a trickled ICE candidate, matching the browser's
/// `RTCIceCandidate.toJSON()` shape.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidateInit {
    pub candidate: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdp_mid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdp_m_line_index: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username_fragment: Option<String>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CandidateError {
    #[error("candidate payload is not a candidate object: {0}")]
    Decode(String),
    #[error("candidate line does not start with 'candidate:': {0}")]
    Syntax(String),
}

impl IceCandidateInit {
    /// Decode and validate an opaque candidate blob.
    ///
    /// An empty `candidate` line is accepted: it marks end-of-candidates.
    pub fn from_blob(blob: &Value) -> Result<Self, CandidateError> {
        let init: Self = serde_json::from_value(blob.clone())
            .map_err(|e| CandidateError::Decode(e.to_string()))?;

        if !init.candidate.is_empty() && !init.candidate.starts_with("candidate:") {
            return Err(CandidateError::Syntax(init.candidate));
        }

        Ok(init)
    }

    pub fn is_end_of_candidates(&self) -> bool {
        self.candidate.is_empty()
    }

    pub fn to_blob(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// A remote candidate waiting to be applied. Consumed exactly once.
#[derive(Debug, Clone, PartialEq)]
pub struct IceCandidateMsg {
    /// The remote peer the candidate belongs to.
    pub peer: PeerId,
    pub candidate: Value,
}

impl IceCandidateMsg {
    pub fn new(peer: PeerId, candidate: Value) -> Self {
        Self { peer, candidate }
    }

    pub fn parse(&self) -> Result<IceCandidateInit, CandidateError> {
        IceCandidateInit::from_blob(&self.candidate)
    }
}

/// Records exchanged over the signaling link.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum SignalMessage {
    Offer {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        to: Option<PeerId>,
        from: PeerId,
        sdp: SessionDescription,
    },
    Answer {
        to: PeerId,
        from: PeerId,
        sdp: SessionDescription,
    },
    IceCandidate {
        to: PeerId,
        from: PeerId,
        candidate: Value,
    },
}

impl SignalMessage {
    pub fn kind_name(&self) -> &'static str {
        match self {
            SignalMessage::Offer { .. } => "offer",
            SignalMessage::Answer { .. } => "answer",
            SignalMessage::IceCandidate { .. } => "ice-candidate",
        }
    }

    pub fn from_peer(&self) -> &PeerId {
        match self {
            SignalMessage::Offer { from, .. }
            | SignalMessage::Answer { from, .. }
            | SignalMessage::IceCandidate { from, .. } => from,
        }
    }

    pub fn to_peer(&self) -> Option<&PeerId> {
        match self {
            SignalMessage::Offer { to, .. } => to.as_ref(),
            SignalMessage::Answer { to, .. } | SignalMessage::IceCandidate { to, .. } => Some(to),
        }
    }
}
