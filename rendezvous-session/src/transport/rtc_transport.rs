use crate::config::TransportConfig;
use crate::transport::{PeerTransport, TransportEvent, TransportEventSender, TransportFactory};
use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use rendezvous_core::{
    ConnectionState, IceCandidateInit, MediaTracks, SdpKind, SessionDescription, TrackHandle,
    TrackKind,
};
use std::sync::Arc;
use tracing::{debug, info, warn};
use webrtc::api::APIBuilder;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::{MIME_TYPE_OPUS, MIME_TYPE_VP8, MediaEngine};
use webrtc::data_channel::RTCDataChannel;
use webrtc::data_channel::data_channel_message::DataChannelMessage;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::sdp_type::RTCSdpType;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::rtp_transceiver::rtp_codec::{RTCRtpCodecCapability, RTPCodecType};
use webrtc::rtp_transceiver::rtp_receiver::RTCRtpReceiver;
use webrtc::rtp_transceiver::RTCRtpTransceiver;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_remote::TrackRemote;

/// Creates [`RtcTransport`] connections backed by webrtc-rs.
#[derive(Debug, Default, Clone, Copy)]
pub struct RtcTransportFactory;

#[async_trait]
impl TransportFactory for RtcTransportFactory {
    async fn create_connection(
        &self,
        config: &TransportConfig,
        events: TransportEventSender,
    ) -> Result<Arc<dyn PeerTransport>> {
        let transport = RtcTransport::new(config, events).await?;
        Ok(Arc::new(transport))
    }
}

pub struct RtcTransport {
    peer_connection: Arc<RTCPeerConnection>,
    channels: Arc<DashMap<String, Arc<RTCDataChannel>>>,
    events: TransportEventSender,
}

impl RtcTransport {
    pub async fn new(config: &TransportConfig, events: TransportEventSender) -> Result<Self> {
        let mut media_engine = MediaEngine::default();
        media_engine.register_default_codecs()?;
        let registry = register_default_interceptors(Registry::new(), &mut media_engine)?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        let rtc_config = RTCConfiguration {
            ice_servers: config
                .ice_servers
                .iter()
                .map(|server| RTCIceServer {
                    urls: server.urls.clone(),
                    username: server.username.clone().unwrap_or_default(),
                    credential: server.credential.clone().unwrap_or_default(),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        };

        let peer_connection = Arc::new(api.new_peer_connection(rtc_config).await?);
        let channels = Arc::new(DashMap::new());
        let generation = events.generation();

        let state_events = events.clone();
        peer_connection.on_peer_connection_state_change(Box::new(
            move |s: RTCPeerConnectionState| {
                let events = state_events.clone();
                Box::pin(async move {
                    info!("Peer connection state (generation {}): {}", generation, s);
                    if let Some(state) = map_connection_state(s) {
                        events
                            .send(TransportEvent::ConnectionStateChanged(state))
                            .await;
                    }
                })
            },
        ));

        let ice_events = events.clone();
        peer_connection.on_ice_candidate(Box::new(move |c: Option<RTCIceCandidate>| {
            let events = ice_events.clone();
            Box::pin(async move {
                let Some(candidate) = c else { return };
                let Ok(init) = candidate.to_json() else {
                    warn!("Failed to serialize local ICE candidate");
                    return;
                };
                events
                    .send(TransportEvent::CandidateGenerated(IceCandidateInit {
                        candidate: init.candidate,
                        sdp_mid: init.sdp_mid,
                        sdp_m_line_index: init.sdp_mline_index,
                        username_fragment: init.username_fragment,
                    }))
                    .await;
            })
        }));

        let dc_events = events.clone();
        let dc_channels = Arc::clone(&channels);
        peer_connection.on_data_channel(Box::new(move |dc: Arc<RTCDataChannel>| {
            let events = dc_events.clone();
            let channels = Arc::clone(&dc_channels);
            Box::pin(async move {
                let label = dc.label().to_owned();
                debug!("Remote opened data channel '{}'", label);

                wire_data_channel(&dc, &events);
                channels.insert(label.clone(), dc);
                events
                    .send(TransportEvent::IncomingDataChannel(label))
                    .await;
            })
        }));

        let track_events = events.clone();
        peer_connection.on_track(Box::new(
            move |track: Arc<TrackRemote>,
                  _receiver: Arc<RTCRtpReceiver>,
                  _transceiver: Arc<RTCRtpTransceiver>| {
                let events = track_events.clone();
                Box::pin(async move {
                    let handle = TrackHandle {
                        id: track.id(),
                        stream_id: track.stream_id(),
                        kind: match track.kind() {
                            RTPCodecType::Audio => TrackKind::Audio,
                            _ => TrackKind::Video,
                        },
                    };
                    debug!("Remote track {} ({:?})", handle.id, handle.kind);
                    events.send(TransportEvent::RemoteTrack(handle)).await;
                })
            },
        ));

        Ok(Self {
            peer_connection,
            channels,
            events,
        })
    }
}

fn map_connection_state(state: RTCPeerConnectionState) -> Option<ConnectionState> {
    match state {
        RTCPeerConnectionState::New => Some(ConnectionState::New),
        RTCPeerConnectionState::Connecting => Some(ConnectionState::Connecting),
        RTCPeerConnectionState::Connected => Some(ConnectionState::Connected),
        RTCPeerConnectionState::Disconnected => Some(ConnectionState::Disconnected),
        RTCPeerConnectionState::Failed => Some(ConnectionState::Failed),
        RTCPeerConnectionState::Closed => Some(ConnectionState::Closed),
        _ => None,
    }
}

fn wire_data_channel(dc: &Arc<RTCDataChannel>, events: &TransportEventSender) {
    let label = dc.label().to_owned();

    let open_events = events.clone();
    let open_label = label.clone();
    dc.on_open(Box::new(move || {
        let events = open_events.clone();
        let label = open_label.clone();
        Box::pin(async move {
            info!("Data channel '{}' open", label);
            events.send(TransportEvent::DataChannelOpened(label)).await;
        })
    }));

    let close_events = events.clone();
    let close_label = label.clone();
    dc.on_close(Box::new(move || {
        let events = close_events.clone();
        let label = close_label.clone();
        Box::pin(async move {
            debug!("Data channel '{}' closed", label);
            events.send(TransportEvent::DataChannelClosed(label)).await;
        })
    }));

    let msg_events = events.clone();
    dc.on_message(Box::new(move |msg: DataChannelMessage| {
        let events = msg_events.clone();
        let label = label.clone();
        Box::pin(async move {
            events.send(TransportEvent::Message(label, msg.data)).await;
        })
    }));
}

fn codec_for(kind: TrackKind) -> RTCRtpCodecCapability {
    match kind {
        TrackKind::Audio => RTCRtpCodecCapability {
            mime_type: MIME_TYPE_OPUS.to_owned(),
            clock_rate: 48000,
            channels: 2,
            ..Default::default()
        },
        TrackKind::Video => RTCRtpCodecCapability {
            mime_type: MIME_TYPE_VP8.to_owned(),
            clock_rate: 90000,
            ..Default::default()
        },
    }
}

#[async_trait]
impl PeerTransport for RtcTransport {
    async fn add_local_tracks(&self, tracks: &MediaTracks) -> Result<()> {
        for track in &tracks.tracks {
            let local = Arc::new(TrackLocalStaticSample::new(
                codec_for(track.kind),
                track.id.clone(),
                tracks.stream_id.clone(),
            ));
            self.peer_connection
                .add_track(local as Arc<dyn TrackLocal + Send + Sync>)
                .await
                .with_context(|| format!("Failed to add local track {}", track.id))?;
            debug!("Added local {:?} track {}", track.kind, track.id);
        }
        Ok(())
    }

    async fn create_offer(&self) -> Result<SessionDescription> {
        let offer = self
            .peer_connection
            .create_offer(None)
            .await
            .context("Failed to create offer")?;
        self.peer_connection
            .set_local_description(offer.clone())
            .await
            .context("Failed to set local offer")?;
        Ok(SessionDescription::offer(offer.sdp))
    }

    async fn create_answer(&self) -> Result<SessionDescription> {
        let answer = self
            .peer_connection
            .create_answer(None)
            .await
            .context("Failed to create answer")?;
        self.peer_connection
            .set_local_description(answer.clone())
            .await
            .context("Failed to set local answer")?;
        Ok(SessionDescription::answer(answer.sdp))
    }

    async fn set_remote_description(&self, desc: &SessionDescription) -> Result<()> {
        let body = desc.body().to_owned();
        let remote = match desc.kind() {
            SdpKind::Offer => RTCSessionDescription::offer(body)?,
            SdpKind::Answer => RTCSessionDescription::answer(body)?,
        };
        self.peer_connection
            .set_remote_description(remote)
            .await
            .context("Failed to set remote description")?;
        Ok(())
    }

    async fn rollback_local_offer(&self) -> Result<()> {
        // webrtc-rs parses the body of every local description, rollback included.
        let Some(pending) = self.peer_connection.pending_local_description().await else {
            return Ok(());
        };
        let mut rollback = RTCSessionDescription::default();
        rollback.sdp_type = RTCSdpType::Rollback;
        rollback.sdp = pending.sdp;
        self.peer_connection
            .set_local_description(rollback)
            .await
            .context("Failed to roll back local offer")?;
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidateInit) -> Result<()> {
        if candidate.is_end_of_candidates() {
            return Ok(());
        }
        self.peer_connection
            .add_ice_candidate(RTCIceCandidateInit {
                candidate: candidate.candidate,
                sdp_mid: candidate.sdp_mid,
                sdp_mline_index: candidate.sdp_m_line_index,
                username_fragment: candidate.username_fragment,
            })
            .await
            .context("Failed to add ICE candidate")?;
        Ok(())
    }

    async fn create_data_channel(&self, label: &str) -> Result<()> {
        let dc = self
            .peer_connection
            .create_data_channel(label, None)
            .await
            .context("Failed to create data channel")?;

        wire_data_channel(&dc, &self.events);
        self.channels.insert(label.to_owned(), dc);
        Ok(())
    }

    async fn send_data(&self, label: &str, payload: Bytes) -> Result<()> {
        let dc = self
            .channels
            .get(label)
            .map(|entry| Arc::clone(entry.value()))
            .with_context(|| format!("No data channel labelled '{}'", label))?;

        dc.send(&payload).await.context("Failed to send data")?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.channels.clear();
        self.peer_connection
            .close()
            .await
            .context("Failed to close peer connection")?;
        Ok(())
    }
}
