use crate::channel::DataChannelManager;
use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::media::MediaCapture;
use crate::negotiation::{DrainReport, Negotiator};
use crate::session::{EventSink, SessionCommand, SessionEvent, SessionSnapshot};
use crate::signaling::{LinkEvent, SignalingLink};
use crate::transport::{PeerTransport, TransportEvent, TransportEventSender, TransportFactory};
use bytes::Bytes;
use rendezvous_core::{
    ConnectionState, IceCandidateInit, IceCandidateMsg, PeerId, SessionDescription,
    SignalMessage, SignalingState,
};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

/// Everything owned by one started session; destroyed together on close.
struct ActiveConnection {
    generation: u64,
    transport: Arc<dyn PeerTransport>,
    negotiator: Negotiator,
    channels: DataChannelManager,
    connection_state: ConnectionState,
    reported_signaling: SignalingState,
    /// Local candidates gathered before a remote peer was bound.
    outbound_candidates: Vec<IceCandidateInit>,
}

pub(crate) struct SessionParts {
    pub config: SessionConfig,
    pub capture: Arc<dyn MediaCapture>,
    pub factory: Arc<dyn TransportFactory>,
    pub link: Arc<dyn SignalingLink>,
    pub link_rx: mpsc::UnboundedReceiver<LinkEvent>,
    pub command_rx: mpsc::Receiver<SessionCommand>,
    pub closing_tx: Arc<watch::Sender<bool>>,
    pub sink: EventSink,
}

/// Serialized event loop of one session. Local intents, link traffic and
/// transport notifications are handled one at a time, to completion.
pub(crate) struct Session {
    config: SessionConfig,
    capture: Arc<dyn MediaCapture>,
    factory: Arc<dyn TransportFactory>,
    link: Arc<dyn SignalingLink>,
    link_rx: mpsc::UnboundedReceiver<LinkEvent>,
    command_rx: mpsc::Receiver<SessionCommand>,
    transport_tx: mpsc::Sender<(u64, TransportEvent)>,
    transport_rx: mpsc::Receiver<(u64, TransportEvent)>,
    closing_tx: Arc<watch::Sender<bool>>,
    closing: watch::Receiver<bool>,
    sink: EventSink,
    active: Option<ActiveConnection>,
    generation: u64,
}

/// Resolves once `close()` has been requested.
async fn close_requested(closing: &mut watch::Receiver<bool>) {
    loop {
        if *closing.borrow_and_update() {
            return;
        }
        if closing.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Run `fut` unless a close request overtakes it. A result that arrives
/// after close was requested is discarded.
async fn guarded<T>(
    closing: &mut watch::Receiver<bool>,
    fut: impl Future<Output = T>,
) -> Result<T, SessionError> {
    tokio::select! {
        biased;
        _ = close_requested(closing) => Err(SessionError::Closed),
        out = fut => {
            if *closing.borrow() {
                Err(SessionError::Closed)
            } else {
                Ok(out)
            }
        }
    }
}

impl Session {
    pub(crate) fn new(parts: SessionParts) -> Self {
        let (transport_tx, transport_rx) = mpsc::channel(256);
        let closing = parts.closing_tx.subscribe();

        Self {
            config: parts.config,
            capture: parts.capture,
            factory: parts.factory,
            link: parts.link,
            link_rx: parts.link_rx,
            command_rx: parts.command_rx,
            transport_tx,
            transport_rx,
            closing_tx: parts.closing_tx,
            closing,
            sink: parts.sink,
            active: None,
            generation: 0,
        }
    }

    pub(crate) async fn run(mut self) {
        info!("Session {} event loop started", self.config.local_peer);
        let mut link_open = true;

        loop {
            tokio::select! {
                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(c) => self.handle_command(c).await,
                        None => {
                            info!("Controller dropped. Shutting down session.");
                            break;
                        }
                    }
                }

                evt = self.link_rx.recv(), if link_open => {
                    match evt {
                        Some(e) => self.handle_link_event(e).await,
                        None => {
                            debug!("Signaling link event stream ended");
                            link_open = false;
                        }
                    }
                }

                Some((generation, evt)) = self.transport_rx.recv() => {
                    self.handle_transport_event(generation, evt).await;
                }
            }
        }

        self.close().await;
        info!("Session {} event loop finished", self.config.local_peer);
    }

    async fn handle_command(&mut self, cmd: SessionCommand) {
        match cmd {
            SessionCommand::Start { reply } => {
                let _ = reply.send(self.start().await);
            }

            SessionCommand::CreateOffer { reply } => {
                let _ = reply.send(self.create_and_send_offer().await);
            }

            SessionCommand::AcceptOffer { reply } => {
                let result = self.answer_remote_offer().await;
                if let Err(e) = &result
                    && e.is_fatal()
                {
                    self.fail(e).await;
                }
                let _ = reply.send(result);
            }

            SessionCommand::Inbound(msg) => self.handle_inbound(msg).await,

            SessionCommand::SendData { payload, reply } => {
                let _ = reply.send(self.send_data(payload).await);
            }

            SessionCommand::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }

            SessionCommand::Close { reply } => {
                self.close().await;
                self.closing_tx.send_replace(false);
                let _ = reply.send(());
            }
        }
    }

    async fn handle_link_event(&mut self, event: LinkEvent) {
        match event {
            LinkEvent::Connected => {
                info!("Connected to signaling service");
                self.sink.emit(SessionEvent::SignalingConnected);
            }
            LinkEvent::Disconnected => {
                warn!("Signaling link disconnected");
                self.sink.emit(SessionEvent::SignalingDisconnected);
            }
            LinkEvent::Frame(text) => match serde_json::from_str::<SignalMessage>(&text) {
                Ok(msg) => self.handle_inbound(msg).await,
                Err(e) => self
                    .sink
                    .report(&SessionError::MalformedMessage(e.to_string())),
            },
        }
    }

    async fn start(&mut self) -> Result<(), SessionError> {
        let mut closing = self.closing.clone();

        let tracks = guarded(
            &mut closing,
            self.capture.acquire_local_media(&self.config.media),
        )
        .await??;

        if self.active.is_some() {
            warn!("start() on a running session: closing the existing connection");
            self.teardown().await;
        }

        self.generation += 1;
        let events = TransportEventSender::new(self.generation, self.transport_tx.clone());
        let transport = self
            .factory
            .create_connection(&self.config.transport, events)
            .await?;

        if *closing.borrow() {
            let _ = transport.close().await;
            return Err(SessionError::Closed);
        }

        if !tracks.is_empty() {
            let added = guarded(&mut closing, transport.add_local_tracks(&tracks)).await;
            if let Err(e) = added.and_then(|r| r.map_err(SessionError::from)) {
                let _ = transport.close().await;
                return Err(e);
            }
        }

        info!(
            "Session {} started (generation {}, {} local tracks)",
            self.config.local_peer,
            self.generation,
            tracks.tracks.len()
        );

        self.active = Some(ActiveConnection {
            generation: self.generation,
            negotiator: Negotiator::new(Arc::clone(&transport), self.config.candidate_queue_limit),
            transport,
            channels: DataChannelManager::new(),
            connection_state: ConnectionState::New,
            reported_signaling: SignalingState::Stable,
            outbound_candidates: Vec::new(),
        });
        self.sink
            .emit(SessionEvent::ConnectionStateChanged(ConnectionState::New));
        self.sink
            .emit(SessionEvent::SignalingStateChanged(SignalingState::Stable));
        Ok(())
    }

    async fn create_and_send_offer(&mut self) -> Result<(), SessionError> {
        let mut closing = self.closing.clone();
        let label = self.config.data_channel_label.clone();
        let active = self.active.as_mut().ok_or(SessionError::NotStarted)?;

        let state = active.negotiator.state();
        if state != SignalingState::Stable {
            return Err(SessionError::InvalidState {
                operation: "start_offer",
                state,
            });
        }

        // The offering side opens the primary channel before its first offer
        // so the offer carries the data section.
        if active.channels.is_empty() {
            guarded(&mut closing, active.transport.create_data_channel(&label)).await??;
            active.channels.register(&label);
        }

        let result = guarded(&mut closing, active.negotiator.start_offer()).await;
        self.sync_signaling_state();
        let offer = result??;

        info!("Sending offer (to {:?})", offer.to);
        self.send_signal(SignalMessage::Offer {
            to: offer.to,
            from: self.config.local_peer.clone(),
            sdp: offer.description,
        })
        .await
    }

    async fn handle_inbound(&mut self, msg: SignalMessage) {
        if let Some(to) = msg.to_peer()
            && to != &self.config.local_peer
        {
            warn!("Ignoring {} addressed to {}", msg.kind_name(), to);
            self.sink.report(&SessionError::MalformedMessage(format!(
                "{} addressed to {}, not {}",
                msg.kind_name(),
                to,
                self.config.local_peer
            )));
            return;
        }
        debug!("Inbound {} from {}", msg.kind_name(), msg.from_peer());

        let result = match msg {
            SignalMessage::Offer { from, sdp, .. } => self.on_remote_offer(sdp, from).await,
            SignalMessage::Answer { from, sdp, .. } => self.on_remote_answer(sdp, from).await,
            SignalMessage::IceCandidate {
                from, candidate, ..
            } => self.on_remote_candidate(IceCandidateMsg::new(from, candidate)).await,
        };

        if let Err(e) = result {
            self.sink.report(&e);
            if e.is_fatal() {
                self.fail(&e).await;
            }
        }
    }

    async fn on_remote_offer(
        &mut self,
        sdp: SessionDescription,
        from: PeerId,
    ) -> Result<(), SessionError> {
        let mut closing = self.closing.clone();
        let active = self.active.as_mut().ok_or(SessionError::NotStarted)?;

        info!("Remote offer from {}", from);
        let result = guarded(&mut closing, active.negotiator.on_remote_offer(sdp, from)).await;
        self.sync_signaling_state();
        result??;

        if self.config.auto_answer {
            self.answer_remote_offer().await
        } else {
            debug!("Auto-answer disabled; waiting for accept_offer()");
            Ok(())
        }
    }

    async fn answer_remote_offer(&mut self) -> Result<(), SessionError> {
        let mut closing = self.closing.clone();
        let active = self.active.as_mut().ok_or(SessionError::NotStarted)?;

        let result = guarded(&mut closing, active.negotiator.create_answer()).await;
        self.sync_signaling_state();
        let answer = result??;
        self.report_drain(answer.drained);

        info!("Sending answer to {}", answer.to);
        self.send_signal(SignalMessage::Answer {
            to: answer.to,
            from: self.config.local_peer.clone(),
            sdp: answer.description,
        })
        .await?;

        self.flush_outbound_candidates().await;
        Ok(())
    }

    async fn on_remote_answer(
        &mut self,
        sdp: SessionDescription,
        from: PeerId,
    ) -> Result<(), SessionError> {
        let mut closing = self.closing.clone();
        let active = self.active.as_mut().ok_or(SessionError::NotStarted)?;

        info!("Remote answer from {}", from);
        let result = guarded(&mut closing, active.negotiator.on_remote_answer(sdp, from)).await;
        self.sync_signaling_state();
        let drained = result??;
        self.report_drain(drained);

        self.flush_outbound_candidates().await;
        Ok(())
    }

    async fn on_remote_candidate(&mut self, candidate: IceCandidateMsg) -> Result<(), SessionError> {
        let mut closing = self.closing.clone();
        let active = self.active.as_mut().ok_or(SessionError::NotStarted)?;

        let disposition =
            guarded(&mut closing, active.negotiator.on_ice_candidate(candidate)).await??;
        debug!("Remote candidate {:?}", disposition);
        Ok(())
    }

    async fn send_data(&mut self, payload: Bytes) -> Result<(), SessionError> {
        let mut closing = self.closing.clone();
        let Some(active) = self.active.as_ref() else {
            return Err(SessionError::ChannelNotReady);
        };

        let label = match active.channels.primary_open() {
            Ok(label) => label.to_owned(),
            Err(e) => {
                warn!("send_data with no open data channel");
                return Err(e);
            }
        };

        guarded(&mut closing, active.transport.send_data(&label, payload)).await??;
        Ok(())
    }

    async fn handle_transport_event(&mut self, generation: u64, event: TransportEvent) {
        let Some(active) = self.active.as_mut() else {
            debug!("Dropping transport event: no active connection");
            return;
        };
        if active.generation != generation {
            debug!(
                "Dropping transport event from stale generation {} (current {})",
                generation, active.generation
            );
            return;
        }

        match event {
            TransportEvent::CandidateGenerated(candidate) => {
                match active.negotiator.remote_peer().cloned() {
                    Some(to) => self.send_candidate(to, candidate).await,
                    None => {
                        debug!("Holding local candidate until a remote peer is bound");
                        active.outbound_candidates.push(candidate);
                    }
                }
            }

            TransportEvent::ConnectionStateChanged(state) => {
                if active.connection_state != state {
                    if state.is_terminal() {
                        warn!("Connection reached {:?}", state);
                    } else {
                        info!(
                            "Connection state {:?} -> {:?}",
                            active.connection_state, state
                        );
                    }
                    active.connection_state = state;
                    self.sink.emit(SessionEvent::ConnectionStateChanged(state));
                }
            }

            TransportEvent::RemoteTrack(track) => {
                info!("Remote {:?} track {}", track.kind, track.id);
                self.sink.emit(SessionEvent::RemoteTrack(track));
            }

            TransportEvent::IncomingDataChannel(label) => {
                active.channels.register(&label);
            }

            TransportEvent::DataChannelOpened(label) => {
                active.channels.mark_open(&label);
                self.sink.emit(SessionEvent::DataChannelOpen(label));
            }

            TransportEvent::DataChannelClosed(label) => {
                debug!("Data channel '{}' closed", label);
                active.channels.mark_closed(&label);
            }

            TransportEvent::Message(_label, data) => {
                self.sink.emit(SessionEvent::DataMessage(data));
            }
        }
    }

    async fn flush_outbound_candidates(&mut self) {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        let Some(to) = active.negotiator.remote_peer().cloned() else {
            return;
        };
        let held = std::mem::take(&mut active.outbound_candidates);
        if held.is_empty() {
            return;
        }

        debug!("Flushing {} held local candidates to {}", held.len(), to);
        for candidate in held {
            self.send_candidate(to.clone(), candidate).await;
        }
    }

    async fn send_candidate(&self, to: PeerId, candidate: IceCandidateInit) {
        let msg = SignalMessage::IceCandidate {
            to,
            from: self.config.local_peer.clone(),
            candidate: candidate.to_blob(),
        };
        if let Err(e) = self.send_signal(msg).await {
            self.sink.report(&e);
        }
    }

    async fn send_signal(&self, msg: SignalMessage) -> Result<(), SessionError> {
        self.link.send(&msg).await
    }

    fn sync_signaling_state(&mut self) {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        let state = active.negotiator.state();
        if state != active.reported_signaling {
            active.reported_signaling = state;
            self.sink.emit(SessionEvent::SignalingStateChanged(state));
        }
    }

    fn report_drain(&self, report: DrainReport) {
        for failure in &report.failures {
            self.sink.report(failure);
        }
    }

    fn snapshot(&self) -> SessionSnapshot {
        let active = self.active.as_ref();
        SessionSnapshot {
            local_peer: self.config.local_peer.clone(),
            signaling_state: active.map(|a| a.negotiator.state()),
            connection_state: active.map(|a| a.connection_state),
            remote_peer: active.and_then(|a| a.negotiator.remote_peer().cloned()),
            pending_candidates: active.map_or(0, |a| a.negotiator.pending_candidates()),
            primary_channel: active.and_then(|a| a.channels.primary().map(str::to_owned)),
        }
    }

    /// Tear down and report the closed state. No-op when nothing is running.
    async fn close(&mut self) {
        let Some(last_state) = self.teardown().await else {
            return;
        };

        self.sink
            .emit(SessionEvent::SignalingStateChanged(SignalingState::Closed));
        if last_state != ConnectionState::Closed {
            self.sink
                .emit(SessionEvent::ConnectionStateChanged(ConnectionState::Closed));
        }
    }

    async fn fail(&mut self, err: &SessionError) {
        error!("Fatal session error, resetting: {}", err);
        self.close().await;
    }

    /// Returns the last connection state of the torn-down connection.
    async fn teardown(&mut self) -> Option<ConnectionState> {
        let mut active = self.active.take()?;

        active.negotiator.reset();
        let closed = active.channels.close_all();
        if let Err(e) = active.transport.close().await {
            warn!("Failed to close connection cleanly: {:#}", e);
        }

        info!(
            "Session {} torn down (generation {}, {} data channels closed)",
            self.config.local_peer,
            active.generation,
            closed.len()
        );
        Some(active.connection_state)
    }
}
