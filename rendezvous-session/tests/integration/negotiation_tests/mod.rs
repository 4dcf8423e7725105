
use rendezvous_core::{IceCandidateMsg, PeerId};
use serde_json::json;

pub fn candidate(peer: &str, line: &str) -> IceCandidateMsg {
    IceCandidateMsg::new(
        PeerId::from(peer),
        json!({ "candidate": line, "sdpMid": "0", "sdpMLineIndex": 0 }),
    )
}
