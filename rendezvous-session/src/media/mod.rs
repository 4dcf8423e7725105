use crate::error::SessionError;
use async_trait::async_trait;
use rendezvous_core::{MediaConstraints, MediaTracks};
use uuid::Uuid;

/// Camera/microphone acquisition, owned by the embedding application.
#[async_trait]
pub trait MediaCapture: Send + Sync {
    async fn acquire_local_media(
        &self,
        constraints: &MediaConstraints,
    ) -> Result<MediaTracks, SessionError>;
}

/// Capture that never produces tracks. Sessions using it carry data channels only.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCapture;

#[async_trait]
impl MediaCapture for NoCapture {
    async fn acquire_local_media(
        &self,
        _constraints: &MediaConstraints,
    ) -> Result<MediaTracks, SessionError> {
        Ok(MediaTracks {
            stream_id: Uuid::new_v4().to_string(),
            tracks: Vec::new(),
        })
    }
}
