use rendezvous_core::utils::{DEFAULT_STUN_ADDR, DEFAULT_STUN_ADDR_2, DEFAULT_STUN_ADDR_3};
use rendezvous_core::{IceServerConfig, MediaConstraints, PeerId};
use serde::Deserialize;

/// ICE configuration handed to the transport when a connection is created.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    pub ice_servers: Vec<IceServerConfig>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            ice_servers: [DEFAULT_STUN_ADDR, DEFAULT_STUN_ADDR_2, DEFAULT_STUN_ADDR_3]
                .into_iter()
                .map(IceServerConfig::stun)
                .collect(),
        }
    }
}

impl TransportConfig {
    /// Host candidates only; useful on a single machine.
    pub fn host_only() -> Self {
        Self {
            ice_servers: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Identity stamped as `from` on every outbound message. Must match the
    /// id the rendezvous service routes to, or inbound traffic is rejected.
    pub local_peer: PeerId,
    pub transport: TransportConfig,
    pub media: MediaConstraints,
    /// Cap on candidates buffered before a remote description exists.
    /// `None` keeps the queue unbounded, which trusts the remote not to flood it.
    pub candidate_queue_limit: Option<usize>,
    /// Label of the channel the offering side opens.
    pub data_channel_label: String,
    /// Answer inbound offers immediately instead of waiting for `accept_offer`.
    pub auto_answer: bool,
    pub command_buffer: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            local_peer: PeerId::random(),
            transport: TransportConfig::default(),
            media: MediaConstraints::default(),
            candidate_queue_limit: None,
            data_channel_label: "data".to_owned(),
            auto_answer: true,
            command_buffer: 64,
        }
    }
}

impl SessionConfig {
    pub fn for_peer(local_peer: impl Into<PeerId>) -> Self {
        Self {
            local_peer: local_peer.into(),
            ..Self::default()
        }
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}
