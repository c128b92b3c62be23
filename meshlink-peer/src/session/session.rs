use crate::bus::{AppFrame, ChatMessage, MessageKind, now_millis};
use crate::config::SessionConfig;
use crate::document::{DocumentState, OpLog, UpdateBody};
use crate::error::SessionError;
use crate::forward::{SeenSet, forward_targets};
use crate::link::{LinkContext, LinkEvent, LinkHandle, LinkReport, LinkState, LinkTable};
use crate::presence::{PresencePatch, PresenceState, PresenceTable};
use crate::session::{
    Identity, OpenGate, RoomGate, SessionCommand, SessionHandle, SessionOutput,
};
use crate::signaling::SignalingSink;
use crate::transport::TransportFactory;
use meshlink_core::{ClientSignal, IceServerConfig, PeerId, Role, RoomId, ServerSignal};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

const COMMAND_CAPACITY: usize = 64;

/// Assembles a [`Session`] and starts it on the current runtime.
pub struct SessionBuilder {
    config: SessionConfig,
    signaling: Arc<dyn SignalingSink>,
    signals: mpsc::UnboundedReceiver<ServerSignal>,
    factory: Arc<dyn TransportFactory>,
    document: Box<dyn DocumentState>,
    gate: Arc<dyn RoomGate>,
}

impl SessionBuilder {
    /// `signals` carries everything the relay sends to this participant, starting with
    /// its `welcome`.
    pub fn new(
        signaling: Arc<dyn SignalingSink>,
        signals: mpsc::UnboundedReceiver<ServerSignal>,
        factory: Arc<dyn TransportFactory>,
    ) -> Self {
        Self {
            config: SessionConfig::default(),
            signaling,
            signals,
            factory,
            document: Box::new(OpLog::new()),
            gate: Arc::new(OpenGate),
        }
    }

    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn document(mut self, document: impl DocumentState + 'static) -> Self {
        self.document = Box::new(document);
        self
    }

    pub fn room_gate(mut self, gate: impl RoomGate + 'static) -> Self {
        self.gate = Arc::new(gate);
        self
    }

    pub fn spawn(self) -> (SessionHandle, mpsc::UnboundedReceiver<SessionOutput>) {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CAPACITY);
        let (output_tx, output_rx) = mpsc::unbounded_channel();
        let (report_tx, report_rx) = mpsc::unbounded_channel();

        let session = Session {
            local_presence: PresenceState::new(self.config.display_name.clone()),
            seen: SeenSet::new(self.config.seen_capacity),
            ice_servers: self.config.ice_servers.clone(),
            config: self.config,
            local: None,
            role: None,
            room: None,
            links: LinkTable::new(),
            signaling: self.signaling,
            factory: self.factory,
            gate: self.gate,
            document: self.document,
            presence: PresenceTable::default(),
            command_rx,
            signal_rx: self.signals,
            report_tx,
            report_rx,
            output: output_tx,
        };
        tokio::spawn(session.run());

        (SessionHandle::new(command_tx), output_rx)
    }
}

/// One participant: its links, its view of the room, and the shared document.
pub struct Session {
    config: SessionConfig,
    local: Option<PeerId>,
    role: Option<Role>,
    room: Option<RoomId>,
    ice_servers: Vec<IceServerConfig>,
    links: LinkTable,
    signaling: Arc<dyn SignalingSink>,
    factory: Arc<dyn TransportFactory>,
    gate: Arc<dyn RoomGate>,
    document: Box<dyn DocumentState>,
    presence: PresenceTable,
    local_presence: PresenceState,
    seen: SeenSet,
    command_rx: mpsc::Receiver<SessionCommand>,
    signal_rx: mpsc::UnboundedReceiver<ServerSignal>,
    report_tx: mpsc::UnboundedSender<LinkReport>,
    report_rx: mpsc::UnboundedReceiver<LinkReport>,
    output: mpsc::UnboundedSender<SessionOutput>,
}

impl Session {
    pub fn builder(
        signaling: Arc<dyn SignalingSink>,
        signals: mpsc::UnboundedReceiver<ServerSignal>,
        factory: Arc<dyn TransportFactory>,
    ) -> SessionBuilder {
        SessionBuilder::new(signaling, signals, factory)
    }

    async fn run(mut self) {
        loop {
            tokio::select! {
                command = self.command_rx.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => {
                        debug!("All handles dropped, leaving");
                        self.leave().await;
                        break;
                    }
                },
                signal = self.signal_rx.recv() => match signal {
                    Some(signal) => self.handle_signal(signal).await,
                    None => {
                        warn!("Relay connection lost, stopping session");
                        self.teardown_links().await;
                        break;
                    }
                },
                Some(report) = self.report_rx.recv() => self.handle_report(report).await,
            }
        }
        info!("Session {:?} stopped", self.local);
    }

    async fn handle_command(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::Join { room, reply } => {
                let result = self.join(room).await;
                let _ = reply.send(result);
            }
            SessionCommand::Leave => self.leave().await,
            SessionCommand::SendChat { text } => self.send_chat(text).await,
            SessionCommand::PublishUpdate { update } => self.publish_update(update).await,
            SessionCommand::WriteEntry { key, value } => self.write_entry(key, value).await,
            SessionCommand::SetPresence { patch } => self.set_presence(patch).await,
            SessionCommand::Links { reply } => {
                let _ = reply.send(self.links.snapshots());
            }
            SessionCommand::Presence { reply } => {
                let _ = reply.send(self.presence.snapshot());
            }
            SessionCommand::DocumentState { reply } => {
                let _ = reply.send(self.document.encode_state());
            }
            SessionCommand::Identity { reply } => {
                let _ = reply.send(Identity {
                    peer_id: self.local,
                    role: self.role,
                    room: self.room.clone(),
                });
            }
        }
    }

    async fn join(&mut self, room: RoomId) -> Result<(), SessionError> {
        match self.gate.admit(&room).await {
            Ok(true) => {}
            Ok(false) => {
                warn!("Room '{}' rejected", room);
                self.emit(SessionOutput::RoomRejected { room: room.clone() });
                return Err(SessionError::RoomUnavailable(room));
            }
            Err(e) => {
                warn!("Room check for '{}' failed: {:?}", room, e);
                self.emit(SessionOutput::RoomRejected { room });
                return Err(SessionError::Gate(e.to_string()));
            }
        }

        if self.room.as_ref().is_some_and(|current| *current != room) {
            info!("Switching rooms, dropping current links");
            self.teardown_links().await;
            self.presence.clear();
        }
        self.room = Some(room.clone());

        info!("Joining room '{}'", room);
        self.signaling
            .send(ClientSignal::JoinRoom { room_id: room })
            .await
            .map_err(|e| SessionError::Signaling(e.to_string()))
    }

    async fn leave(&mut self) {
        if let Some(room) = self.room.take() {
            info!("Leaving room '{}'", room);
            if let Err(e) = self
                .signaling
                .send(ClientSignal::LeaveRoom { room_id: room })
                .await
            {
                warn!("Failed to announce leave: {:?}", e);
            }
        }
        self.teardown_links().await;
        self.presence.clear();
        self.role = None;
    }

    async fn send_chat(&mut self, text: String) {
        let message = ChatMessage {
            text,
            sender: self.local_presence.name.clone(),
            timestamp: now_millis(),
        };
        if let Some(frame) = self.originate(&message) {
            self.broadcast(MessageKind::Chat, frame).await;
        }
    }

    async fn publish_update(&mut self, update: Vec<u8>) {
        if let Err(e) = self.document.apply_update(&update) {
            warn!("Rejecting malformed local update: {:?}", e);
            return;
        }
        if let Some(frame) = self.originate(&UpdateBody::encode(&update)) {
            self.broadcast(MessageKind::DocUpdate, frame).await;
        }
    }

    async fn write_entry(&mut self, key: String, value: Option<Value>) {
        let update = match self.document.write(&key, value) {
            Ok(update) => update,
            Err(e) => {
                warn!("Local write of '{}' failed: {:?}", key, e);
                return;
            }
        };
        if let Some(frame) = self.originate(&UpdateBody::encode(&update)) {
            self.broadcast(MessageKind::DocUpdate, frame).await;
        }
    }

    async fn set_presence(&mut self, patch: PresencePatch) {
        self.local_presence.apply(patch);
        self.broadcast_presence().await;
    }

    async fn broadcast_presence(&mut self) {
        let state = self.local_presence.clone();
        if let Some(frame) = self.originate(&state) {
            self.broadcast(MessageKind::Presence, frame).await;
        }
    }

    async fn handle_signal(&mut self, signal: ServerSignal) {
        match signal {
            ServerSignal::Welcome {
                peer_id,
                ice_servers,
            } => {
                info!("Relay assigned peer id {}", peer_id);
                self.local = Some(peer_id);
                if !ice_servers.is_empty() {
                    self.ice_servers = ice_servers;
                }
                self.emit(SessionOutput::Identified { peer_id });
            }
            ServerSignal::Role { role } => {
                info!("Role is now {}", role);
                self.role = Some(role);
                self.local_presence.role = Some(role);
                self.emit(SessionOutput::RoleChanged { role });
                if !self.links.is_empty() {
                    self.broadcast_presence().await;
                }
            }
            ServerSignal::RoomPeers { peers } => {
                let Some(room) = self.room.clone() else {
                    warn!("Peer list without a room, ignoring");
                    return;
                };
                info!("Room '{}' has {} peers to connect to", room, peers.len());
                self.emit(SessionOutput::Joined {
                    room,
                    peers: peers.clone(),
                });
                for peer in peers {
                    if let Some(link) = self.ensure_link(peer) {
                        link.send(LinkEvent::StartOffer).await;
                    }
                }
            }
            ServerSignal::PeerJoined { peer_id } => {
                debug!("Peer {} joined, expecting its offer", peer_id);
                self.emit(SessionOutput::PeerJoined { peer_id });
            }
            ServerSignal::PeerLeft { peer_id } => {
                info!("Peer {} left", peer_id);
                if let Some(link) = self.links.remove(&peer_id) {
                    link.close().await;
                }
                self.presence.remove(&peer_id);
                self.emit(SessionOutput::PeerLeft { peer_id });
            }
            ServerSignal::Offer {
                room_id,
                offer,
                from_id,
            } => {
                if !self.in_room(&room_id) {
                    debug!("Offer from {} for room '{}' dropped", from_id, room_id);
                    return;
                }
                if let Some(link) = self.ensure_link(from_id) {
                    link.send(LinkEvent::RemoteOffer(offer)).await;
                }
            }
            ServerSignal::Answer {
                room_id,
                answer,
                from_id,
            } => {
                if !self.in_room(&room_id) {
                    debug!("Answer from {} for room '{}' dropped", from_id, room_id);
                    return;
                }
                match self.links.get(&from_id) {
                    Some(link) => {
                        link.send(LinkEvent::RemoteAnswer(answer)).await;
                    }
                    None => debug!("Answer from {} without a link, dropped", from_id),
                }
            }
            ServerSignal::IceCandidate {
                room_id,
                candidate,
                from_id,
            } => {
                if !self.in_room(&room_id) {
                    return;
                }
                if let Some(link) = self.ensure_link(from_id) {
                    link.send(LinkEvent::RemoteCandidate(candidate)).await;
                }
            }
            ServerSignal::Error { reason } => {
                warn!("Relay error: {}", reason);
                self.emit(SessionOutput::RelayError { reason });
            }
        }
    }

    async fn handle_report(&mut self, report: LinkReport) {
        let (peer_id, generation) = report.source();
        let Some(link) = self.links.current_mut(&peer_id, generation) else {
            debug!(
                "Ignoring report from retired link to {} (generation {})",
                peer_id, generation
            );
            return;
        };

        match report {
            LinkReport::State { state, .. } => {
                link.set_state(state);
                self.emit(SessionOutput::LinkState { peer_id, state });
            }
            LinkReport::Established { .. } => {
                link.mark_established();
                self.emit(SessionOutput::PeerSecured { peer_id });
                self.greet(peer_id).await;
            }
            LinkReport::Inbound { kind, frame, .. } => self.on_frame(peer_id, kind, frame).await,
            LinkReport::RemoteTrack { track_id, kind, .. } => {
                self.emit(SessionOutput::RemoteTrack {
                    peer_id,
                    track_id,
                    kind,
                });
            }
            LinkReport::Closed { .. } => {
                warn!("Link to {} stopped on its own", peer_id);
                link.set_state(LinkState::Closed);
                self.emit(SessionOutput::LinkState {
                    peer_id,
                    state: LinkState::Closed,
                });
            }
        }
    }

    /// Brings a freshly secured peer up to date with our presence and document.
    async fn greet(&mut self, peer_id: PeerId) {
        let mut frames = Vec::new();

        let presence = self.local_presence.clone();
        if let Some(frame) = self.originate(&presence) {
            frames.push((MessageKind::Presence, frame));
        }
        if !self.document.is_empty() {
            let state = UpdateBody::encode(&self.document.encode_state());
            if let Some(frame) = self.originate(&state) {
                frames.push((MessageKind::DocUpdate, frame));
            }
        }

        if let Some(link) = self.links.get(&peer_id) {
            for (kind, frame) in frames {
                link.send(LinkEvent::Send { kind, frame }).await;
            }
        }
    }

    async fn on_frame(&mut self, from: PeerId, kind: MessageKind, frame: AppFrame) {
        if !self.seen.insert(frame.id) {
            debug!("Duplicate frame {} via {} dropped", frame.id, from);
            return;
        }

        let delivered = match kind {
            MessageKind::Chat => match decode_body::<ChatMessage>(&frame.body) {
                Some(message) => {
                    self.emit(SessionOutput::Chat {
                        origin: frame.origin,
                        via: from,
                        message,
                    });
                    true
                }
                None => false,
            },
            MessageKind::Presence => match decode_body::<PresenceState>(&frame.body) {
                Some(state) => {
                    self.presence.upsert(frame.origin, state.clone());
                    self.emit(SessionOutput::Presence {
                        peer_id: frame.origin,
                        state,
                    });
                    true
                }
                None => false,
            },
            MessageKind::DocUpdate => self.merge_update(&frame),
            MessageKind::Control => false,
        };

        if delivered {
            self.forward(from, kind, &frame).await;
        }
    }

    fn merge_update(&mut self, frame: &AppFrame) -> bool {
        let Some(body) = decode_body::<UpdateBody>(&frame.body) else {
            return false;
        };
        let result = body
            .decode()
            .and_then(|update| self.document.apply_update(&update));
        match result {
            Ok(changed) => {
                self.emit(SessionOutput::DocumentUpdated {
                    origin: frame.origin,
                    changed,
                });
                true
            }
            Err(e) => {
                warn!("Update {} from {} rejected: {:?}", frame.id, frame.origin, e);
                false
            }
        }
    }

    async fn forward(&self, from: PeerId, kind: MessageKind, frame: &AppFrame) {
        let targets = forward_targets(
            self.config.forward_policy,
            self.role,
            from,
            frame.origin,
            self.links.peers(),
        );
        if targets.is_empty() {
            return;
        }

        debug!("Forwarding {:?} {} to {} peers", kind, frame.id, targets.len());
        for peer in targets {
            if let Some(link) = self.links.get(&peer) {
                link.send(LinkEvent::Send {
                    kind,
                    frame: frame.clone(),
                })
                .await;
            }
        }
    }

    async fn broadcast(&self, kind: MessageKind, frame: AppFrame) {
        for link in self.links.iter() {
            link.send(LinkEvent::Send {
                kind,
                frame: frame.clone(),
            })
            .await;
        }
    }

    /// Wraps a locally produced body in a frame and remembers its id.
    fn originate(&mut self, body: &impl Serialize) -> Option<AppFrame> {
        let Some(local) = self.local else {
            warn!("No peer id assigned yet, dropping outgoing frame");
            return None;
        };
        let body = match serde_json::to_value(body) {
            Ok(body) => body,
            Err(e) => {
                error!("Failed to encode frame body: {}", e);
                return None;
            }
        };

        let frame = AppFrame::new(local, body);
        self.seen.insert(frame.id);
        Some(frame)
    }

    fn ensure_link(&mut self, peer_id: PeerId) -> Option<&mut LinkHandle> {
        let ctx = self.link_context()?;
        if peer_id == ctx.local {
            warn!("Refusing to link to ourselves");
            return None;
        }
        Some(self.links.ensure(&ctx, peer_id))
    }

    fn link_context(&self) -> Option<LinkContext> {
        let (Some(local), Some(room)) = (self.local, self.room.clone()) else {
            warn!("Negotiation before the relay identified us, dropping");
            return None;
        };

        Some(LinkContext {
            local,
            room,
            ice_servers: self.ice_servers.clone(),
            signaling: Arc::clone(&self.signaling),
            factory: Arc::clone(&self.factory),
            reports: self.report_tx.clone(),
            retry_interval: self.config.handshake_retry_interval,
            max_key_attempts: self.config.handshake_max_attempts,
            outbox_limit: self.config.outbox_limit,
        })
    }

    fn in_room(&self, room_id: &RoomId) -> bool {
        self.room.as_ref() == Some(room_id)
    }

    async fn teardown_links(&mut self) {
        for link in self.links.drain() {
            link.close().await;
        }
    }

    fn emit(&self, output: SessionOutput) {
        let _ = self.output.send(output);
    }
}

fn decode_body<T: DeserializeOwned>(body: &Value) -> Option<T> {
    match serde_json::from_value(body.clone()) {
        Ok(value) => Some(value),
        Err(e) => {
            debug!("Malformed frame body: {}", e);
            None
        }
    }
}
