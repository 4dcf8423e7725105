use rendezvous_core::{CandidateError, PeerId, SignalingState};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("local media unavailable: {0}")]
    CaptureUnavailable(String),

    #[error("session has not been started")]
    NotStarted,

    #[error("{operation} is not legal in signaling state {state:?}")]
    InvalidState {
        operation: &'static str,
        state: SignalingState,
    },

    #[error("unexpected answer in signaling state {state:?}")]
    UnexpectedAnswer { state: SignalingState },

    #[error("answer came from {actual} but the offer was sent to {expected}")]
    PeerMismatch { expected: PeerId, actual: PeerId },

    #[error("malformed ICE candidate: {0}")]
    MalformedCandidate(String),

    #[error("no data channel is open")]
    ChannelNotReady,

    #[error("pending candidate queue is full ({limit} entries)")]
    QueueOverflow { limit: usize },

    #[error("malformed signaling message: {0}")]
    MalformedMessage(String),

    #[error("signaling link failure: {0}")]
    Link(String),

    #[error("session closed before the operation completed")]
    Closed,

    #[error(transparent)]
    Transport(#[from] anyhow::Error),
}

/// Discriminant of [`SessionError`] carried by error events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    CaptureUnavailable,
    NotStarted,
    InvalidState,
    UnexpectedAnswer,
    PeerMismatch,
    MalformedCandidate,
    ChannelNotReady,
    QueueOverflow,
    MalformedMessage,
    Link,
    Closed,
    Transport,
}

impl SessionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SessionError::CaptureUnavailable(_) => ErrorKind::CaptureUnavailable,
            SessionError::NotStarted => ErrorKind::NotStarted,
            SessionError::InvalidState { .. } => ErrorKind::InvalidState,
            SessionError::UnexpectedAnswer { .. } => ErrorKind::UnexpectedAnswer,
            SessionError::PeerMismatch { .. } => ErrorKind::PeerMismatch,
            SessionError::MalformedCandidate(_) => ErrorKind::MalformedCandidate,
            SessionError::ChannelNotReady => ErrorKind::ChannelNotReady,
            SessionError::QueueOverflow { .. } => ErrorKind::QueueOverflow,
            SessionError::MalformedMessage(_) => ErrorKind::MalformedMessage,
            SessionError::Link(_) => ErrorKind::Link,
            SessionError::Closed => ErrorKind::Closed,
            SessionError::Transport(_) => ErrorKind::Transport,
        }
    }

    /// Protocol desynchronization the session cannot recover from.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SessionError::QueueOverflow { .. } | SessionError::PeerMismatch { .. }
        )
    }
}

impl From<CandidateError> for SessionError {
    fn from(e: CandidateError) -> Self {
        SessionError::MalformedCandidate(e.to_string())
    }
}
