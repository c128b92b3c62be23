use crate::bus::{AppFrame, ControlAction, Inbound, MessageBus, MessageKind};
use crate::link::{CandidateOutcome, LinkState, OfferOutcome, PeerLink};
use crate::secure::{KeyAction, SecureChannel};
use crate::signaling::SignalingSink;
use crate::transport::{TransportEvent, TransportFactory};
use meshlink_core::{ClientSignal, IceServerConfig, PeerId, RoomId};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, interval_at};
use tracing::{debug, error, info, warn};

const INBOX_CAPACITY: usize = 256;
const TRANSPORT_EVENT_CAPACITY: usize = 256;
const MIN_RETRY_INTERVAL: Duration = Duration::from_millis(10);

/// Instructions from the session to one link.
#[derive(Debug)]
pub enum LinkEvent {
    StartOffer,
    RemoteOffer(String),
    RemoteAnswer(String),
    RemoteCandidate(String),
    /// Encrypt and send, or queue until the secure channel is up.
    Send { kind: MessageKind, frame: AppFrame },
    Close,
}

/// What a link tells the session. `generation` tells a replaced link's leftovers apart
/// from the current link to the same peer.
#[derive(Debug)]
pub enum LinkReport {
    State {
        peer_id: PeerId,
        generation: u64,
        state: LinkState,
    },
    Established {
        peer_id: PeerId,
        generation: u64,
    },
    Inbound {
        peer_id: PeerId,
        generation: u64,
        kind: MessageKind,
        frame: AppFrame,
    },
    RemoteTrack {
        peer_id: PeerId,
        generation: u64,
        track_id: String,
        kind: String,
    },
    Closed {
        peer_id: PeerId,
        generation: u64,
    },
}

impl LinkReport {
    pub fn source(&self) -> (PeerId, u64) {
        match self {
            LinkReport::State {
                peer_id,
                generation,
                ..
            }
            | LinkReport::Established {
                peer_id,
                generation,
            }
            | LinkReport::Inbound {
                peer_id,
                generation,
                ..
            }
            | LinkReport::RemoteTrack {
                peer_id,
                generation,
                ..
            }
            | LinkReport::Closed {
                peer_id,
                generation,
            } => (*peer_id, *generation),
        }
    }
}

/// Everything a link needs from its session.
#[derive(Clone)]
pub struct LinkContext {
    pub local: PeerId,
    pub room: RoomId,
    pub ice_servers: Vec<IceServerConfig>,
    pub signaling: Arc<dyn SignalingSink>,
    pub factory: Arc<dyn TransportFactory>,
    pub reports: mpsc::UnboundedSender<LinkReport>,
    pub retry_interval: Duration,
    pub max_key_attempts: u32,
    pub outbox_limit: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkSnapshot {
    pub peer_id: PeerId,
    pub generation: u64,
    pub state: LinkState,
    pub established: bool,
}

/// Session-side handle to a running link actor, plus the last state it reported.
pub struct LinkHandle {
    remote: PeerId,
    generation: u64,
    inbox: mpsc::Sender<LinkEvent>,
    state: LinkState,
    established: bool,
    task: JoinHandle<()>,
}

impl LinkHandle {
    pub fn spawn(ctx: LinkContext, remote: PeerId, generation: u64) -> Self {
        let (inbox, inbox_rx) = mpsc::channel(INBOX_CAPACITY);
        let task = tokio::spawn(run_link(ctx, remote, generation, inbox_rx));
        Self {
            remote,
            generation,
            inbox,
            state: LinkState::New,
            established: false,
            task,
        }
    }

    pub fn remote(&self) -> PeerId {
        self.remote
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn is_established(&self) -> bool {
        self.established
    }

    pub fn set_state(&mut self, state: LinkState) {
        self.state = state;
    }

    pub fn mark_established(&mut self) {
        self.established = true;
    }

    pub fn snapshot(&self) -> LinkSnapshot {
        LinkSnapshot {
            peer_id: self.remote,
            generation: self.generation,
            state: self.state,
            established: self.established,
        }
    }

    pub async fn send(&self, event: LinkEvent) -> bool {
        if self.inbox.send(event).await.is_err() {
            debug!("Link to {} is gone", self.remote);
            return false;
        }
        true
    }

    /// Asks the actor to close its transport and stop.
    pub async fn close(self) {
        if self.inbox.send(LinkEvent::Close).await.is_err() {
            self.task.abort();
        }
    }
}

async fn run_link(
    ctx: LinkContext,
    remote: PeerId,
    generation: u64,
    mut inbox: mpsc::Receiver<LinkEvent>,
) {
    let (transport_tx, mut transport_rx) = mpsc::channel(TRANSPORT_EVENT_CAPACITY);
    let transport = match ctx
        .factory
        .create(ctx.local, remote, &ctx.ice_servers, transport_tx)
        .await
    {
        Ok(transport) => transport,
        Err(e) => {
            error!("Failed to create transport to {}: {:?}", remote, e);
            let _ = ctx.reports.send(LinkReport::State {
                peer_id: remote,
                generation,
                state: LinkState::Failed,
            });
            return;
        }
    };

    let period = ctx.retry_interval.max(MIN_RETRY_INTERVAL);
    let mut actor = LinkActor {
        link: PeerLink::new(ctx.local, remote, transport),
        secure: SecureChannel::new(ctx.local, remote),
        bus: MessageBus::new(remote),
        outbox: VecDeque::new(),
        reported: LinkState::New,
        channel_open: false,
        key_attempts: 0,
        remote,
        generation,
        ctx,
    };
    let mut retry = interval_at(Instant::now() + period, period);

    debug!("Link to {} started (generation {})", remote, generation);

    loop {
        tokio::select! {
            event = inbox.recv() => match event {
                Some(LinkEvent::Close) | None => break,
                Some(event) => actor.handle_event(event).await,
            },
            event = transport_rx.recv() => match event {
                Some(event) => actor.handle_transport(event).await,
                None => {
                    warn!("Transport to {} stopped reporting", remote);
                    break;
                }
            },
            _ = retry.tick(), if actor.awaiting_key() => actor.retry_handshake().await,
        }
    }

    actor.shutdown().await;
}

struct LinkActor {
    ctx: LinkContext,
    remote: PeerId,
    generation: u64,
    link: PeerLink,
    secure: SecureChannel,
    bus: MessageBus,
    outbox: VecDeque<(MessageKind, AppFrame)>,
    reported: LinkState,
    channel_open: bool,
    key_attempts: u32,
}

impl LinkActor {
    async fn handle_event(&mut self, event: LinkEvent) {
        match event {
            LinkEvent::StartOffer => match self.link.start_offer().await {
                Ok(Some(offer)) => {
                    self.signal(ClientSignal::Offer {
                        room_id: self.ctx.room.clone(),
                        offer,
                        target_id: Some(self.remote),
                    })
                    .await
                }
                Ok(None) => {}
                Err(e) => warn!("Failed to create offer for {}: {:?}", self.remote, e),
            },
            LinkEvent::RemoteOffer(sdp) => match self.link.handle_offer(sdp).await {
                Ok(OfferOutcome::Answer(answer)) => {
                    self.signal(ClientSignal::Answer {
                        room_id: self.ctx.room.clone(),
                        answer,
                        target_id: Some(self.remote),
                    })
                    .await
                }
                Ok(_) => {}
                Err(e) => warn!("Failed to answer offer from {}: {:?}", self.remote, e),
            },
            LinkEvent::RemoteAnswer(sdp) => {
                if let Err(e) = self.link.handle_answer(sdp).await {
                    warn!("Failed to apply answer from {}: {:?}", self.remote, e);
                }
            }
            LinkEvent::RemoteCandidate(candidate) => {
                match self.link.handle_candidate(candidate).await {
                    Ok(CandidateOutcome::Queued) => {
                        debug!("Candidate from {} queued", self.remote)
                    }
                    Ok(_) => {}
                    Err(e) => warn!("Failed to apply candidate from {}: {:?}", self.remote, e),
                }
            }
            LinkEvent::Send { kind, frame } => self.send_frame(kind, frame).await,
            LinkEvent::Close => {}
        }
        self.sync_state();
    }

    async fn handle_transport(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::CandidateGenerated(_, candidate) => {
                self.signal(ClientSignal::IceCandidate {
                    room_id: self.ctx.room.clone(),
                    candidate,
                    target_id: Some(self.remote),
                })
                .await
            }
            TransportEvent::Connected(_) => {
                if self.link.recover() {
                    info!("Connection to {} is back", self.remote);
                    self.channel_open = self.link.transport().is_open().await;
                    if self.channel_open && !self.secure.is_established() {
                        self.key_attempts = 0;
                        self.send_public_key().await;
                    }
                }
            }
            TransportEvent::ChannelOpen(_) => {
                info!("Channel to {} open, starting key exchange", self.remote);
                self.channel_open = true;
                self.send_public_key().await;
            }
            TransportEvent::ChannelClosed(_) => {
                debug!("Channel to {} closed", self.remote);
                self.channel_open = false;
            }
            TransportEvent::Message(_, raw) => self.on_message(&raw).await,
            TransportEvent::RemoteTrack {
                track_id, kind, ..
            } => self.report(LinkReport::RemoteTrack {
                peer_id: self.remote,
                generation: self.generation,
                track_id,
                kind,
            }),
            TransportEvent::Disconnected(_) => {
                warn!("Connection to {} lost", self.remote);
                self.channel_open = false;
                self.link.mark_failed();
            }
        }
        self.sync_state();
    }

    fn awaiting_key(&self) -> bool {
        self.channel_open && !self.secure.is_established() && self.link.state() != LinkState::Failed
    }

    async fn retry_handshake(&mut self) {
        if self.key_attempts >= self.ctx.max_key_attempts {
            warn!(
                "No key from {} after {} attempts, giving up",
                self.remote, self.key_attempts
            );
            self.link.mark_failed();
            self.sync_state();
            return;
        }
        debug!("Re-sending public key to {}", self.remote);
        self.send_public_key().await;
    }

    async fn send_public_key(&mut self) {
        self.key_attempts += 1;
        let action = ControlAction::PublicKey {
            key: self.secure.public_key_b64(),
        };
        if let Err(e) = self.bus.send_control(self.link.transport(), &action).await {
            warn!("Failed to send public key to {}: {:?}", self.remote, e);
        }
    }

    async fn on_message(&mut self, raw: &[u8]) {
        match self.bus.receive(raw, self.secure.key()) {
            Some(Inbound::Control(action)) => self.on_control(action).await,
            Some(Inbound::Frame { kind, frame }) => self.report(LinkReport::Inbound {
                peer_id: self.remote,
                generation: self.generation,
                kind,
                frame,
            }),
            None => {}
        }
    }

    async fn on_control(&mut self, action: ControlAction) {
        match action {
            ControlAction::PublicKey { key } => match self.secure.on_public_key(&key) {
                Ok(KeyAction::Wait) => {}
                Ok(KeyAction::SendWrappedKey {
                    wrapped,
                    newly_established,
                }) => {
                    let reply = ControlAction::SetKeySecure { key: wrapped };
                    if let Err(e) = self.bus.send_control(self.link.transport(), &reply).await {
                        warn!("Failed to send wrapped key to {}: {:?}", self.remote, e);
                    }
                    if newly_established {
                        self.on_established().await;
                    }
                }
                Err(e) => warn!("Unusable public key from {}: {}", self.remote, e),
            },
            ControlAction::SetKeySecure { key } => match self.secure.on_wrapped_key(&key) {
                Ok(true) => self.on_established().await,
                Ok(false) => {}
                Err(e) => warn!("Unusable wrapped key from {}: {}", self.remote, e),
            },
        }
    }

    async fn on_established(&mut self) {
        if self.link.recover() {
            info!("Late key from {}, link usable again", self.remote);
        }
        self.report(LinkReport::Established {
            peer_id: self.remote,
            generation: self.generation,
        });

        let queued: Vec<_> = self.outbox.drain(..).collect();
        if !queued.is_empty() {
            debug!("Flushing {} queued frames to {}", queued.len(), self.remote);
        }
        for (kind, frame) in queued {
            self.send_frame(kind, frame).await;
        }
    }

    async fn send_frame(&mut self, kind: MessageKind, frame: AppFrame) {
        let Some(key) = self.secure.key() else {
            if self.outbox.len() >= self.ctx.outbox_limit.max(1) {
                warn!("Outbox for {} full, dropping oldest frame", self.remote);
                self.outbox.pop_front();
            }
            self.outbox.push_back((kind, frame));
            return;
        };

        match self
            .bus
            .send_frame(self.link.transport(), key, kind, &frame)
            .await
        {
            Ok(true) => debug!("Sent {:?} {} to {}", kind, frame.id, self.remote),
            Ok(false) => {}
            Err(e) => warn!("Failed to send {:?} to {}: {:?}", kind, self.remote, e),
        }
    }

    async fn signal(&self, signal: ClientSignal) {
        if let Err(e) = self.ctx.signaling.send(signal).await {
            warn!("Failed to signal {}: {:?}", self.remote, e);
        }
    }

    fn sync_state(&mut self) {
        let state = self.link.state();
        if state != self.reported {
            debug!("Link to {}: {} -> {}", self.remote, self.reported, state);
            self.reported = state;
            self.report(LinkReport::State {
                peer_id: self.remote,
                generation: self.generation,
                state,
            });
        }
    }

    fn report(&self, report: LinkReport) {
        let _ = self.ctx.reports.send(report);
    }

    async fn shutdown(&mut self) {
        if let Err(e) = self.link.close().await {
            debug!("Closing transport to {}: {:?}", self.remote, e);
        }
        self.outbox.clear();
        self.report(LinkReport::Closed {
            peer_id: self.remote,
            generation: self.generation,
        });
        debug!("Link to {} stopped (generation {})", self.remote, self.generation);
    }
}
