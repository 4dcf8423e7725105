mod media;
mod peer;
mod signaling;
mod state;

pub use media::{LocalTrack, MediaConstraints, MediaTracks, TrackHandle, TrackKind, VideoConstraints};
pub use peer::PeerId;
pub use signaling::{
    CandidateError, IceCandidateInit, IceCandidateMsg, IceServerConfig, SdpKind,
    SessionDescription, SignalMessage,
};
pub use state::{ConnectionState, DataChannelState, SignalingState};
