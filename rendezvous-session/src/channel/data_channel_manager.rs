use crate::error::SessionError;
use rendezvous_core::DataChannelState;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataChannelHandle {
    pub label: String,
    pub ready_state: DataChannelState,
}

/// Lifecycle of the data channels layered on one session.
///
/// The most recently opened channel is the primary one used by `send_data`.
/// Addressing channels by label is the way out if several channels per
/// session ever need to be used side by side.
#[derive(Debug, Default)]
pub struct DataChannelManager {
    channels: Vec<DataChannelHandle>,
    /// Labels of open channels, oldest first.
    open_order: Vec<String>,
}

impl DataChannelManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, label: &str) -> bool {
        self.channels.iter().any(|c| c.label == label)
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Track a channel created locally or announced by the remote.
    ///
    /// Returns `false` when the label is already tracked, so callers never
    /// create a duplicate of a channel the remote already opened.
    pub fn register(&mut self, label: &str) -> bool {
        if self.contains(label) {
            debug!("Data channel '{}' already tracked", label);
            return false;
        }

        self.channels.push(DataChannelHandle {
            label: label.to_owned(),
            ready_state: DataChannelState::Connecting,
        });
        true
    }

    pub fn mark_open(&mut self, label: &str) {
        if !self.contains(label) {
            self.register(label);
        }
        self.set_state(label, DataChannelState::Open);

        self.open_order.retain(|l| l != label);
        self.open_order.push(label.to_owned());
        info!("Primary data channel is now '{}'", label);
    }

    pub fn mark_closed(&mut self, label: &str) {
        self.set_state(label, DataChannelState::Closed);
        self.open_order.retain(|l| l != label);
    }

    pub fn state(&self, label: &str) -> Option<DataChannelState> {
        self.channels
            .iter()
            .find(|c| c.label == label)
            .map(|c| c.ready_state)
    }

    pub fn primary(&self) -> Option<&str> {
        self.open_order.last().map(String::as_str)
    }

    /// Label of the channel `send_data` should use.
    pub fn primary_open(&self) -> Result<&str, SessionError> {
        self.primary().ok_or(SessionError::ChannelNotReady)
    }

    /// Mark every channel closed and forget them.
    pub fn close_all(&mut self) -> Vec<DataChannelHandle> {
        self.open_order.clear();
        self.channels
            .drain(..)
            .map(|mut c| {
                c.ready_state = DataChannelState::Closed;
                c
            })
            .collect()
    }

    fn set_state(&mut self, label: &str, state: DataChannelState) {
        if let Some(channel) = self.channels.iter_mut().find(|c| c.label == label) {
            channel.ready_state = state;
        }
    }
}
