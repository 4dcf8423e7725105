use crate::error::SessionError;
use crate::session::SessionSnapshot;
use bytes::Bytes;
use rendezvous_core::SignalMessage;
use tokio::sync::oneshot;

type Reply<T> = oneshot::Sender<T>;

/// Requests from the controller handle to the session loop.
pub(crate) enum SessionCommand {
    Start {
        reply: Reply<Result<(), SessionError>>,
    },

    CreateOffer {
        reply: Reply<Result<(), SessionError>>,
    },

    AcceptOffer {
        reply: Reply<Result<(), SessionError>>,
    },

    /// Inbound signaling message handed over by the application.
    Inbound(SignalMessage),

    SendData {
        payload: Bytes,
        reply: Reply<Result<(), SessionError>>,
    },

    Snapshot {
        reply: Reply<SessionSnapshot>,
    },

    Close {
        reply: Reply<()>,
    },
}
