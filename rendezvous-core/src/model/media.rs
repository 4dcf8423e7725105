use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Audio,
    Video,
}

/// A locally captured track handed over by the capture collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalTrack {
    pub id: String,
    pub kind: TrackKind,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaTracks {
    pub stream_id: String,
    pub tracks: Vec<LocalTrack>,
}

impl MediaTracks {
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}

/// Remote media track surfaced to the application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackHandle {
    pub id: String,
    pub stream_id: String,
    pub kind: TrackKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConstraints {
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,
    pub facing_mode: String,
}

impl Default for VideoConstraints {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            frame_rate: 30,
            facing_mode: "user".to_owned(),
        }
    }
}

/// What to ask the capture collaborator for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConstraints {
    pub audio: bool,
    pub video: Option<VideoConstraints>,
}

impl Default for MediaConstraints {
    fn default() -> Self {
        Self {
            audio: true,
            video: Some(VideoConstraints::default()),
        }
    }
}

impl MediaConstraints {
    /// Data channels only, no capture.
    pub fn none() -> Self {
        Self {
            audio: false,
            video: None,
        }
    }
}
