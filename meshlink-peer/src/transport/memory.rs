use crate::transport::{Transport, TransportEvent, TransportFactory};
use anyhow::{Context, Result, anyhow, bail, ensure};
use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use meshlink_core::{IceServerConfig, PeerId};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum DescriptionKind {
    Offer,
    Answer,
}

/// What a memory transport puts where a real one would put SDP.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct MemoryDescription {
    kind: DescriptionKind,
    from: PeerId,
    to: PeerId,
}

#[derive(Debug, Default)]
struct EndpointState {
    local: Option<DescriptionKind>,
    remote: Option<DescriptionKind>,
    open: bool,
    closed: bool,
    applied_candidates: Vec<String>,
}

struct Endpoint {
    local: PeerId,
    remote: PeerId,
    events: mpsc::Sender<TransportEvent>,
    state: Mutex<EndpointState>,
}

impl Endpoint {
    fn state(&self) -> MutexGuard<'_, EndpointState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn negotiated(&self) -> bool {
        let state = self.state();
        state.local.is_some() && state.remote.is_some() && !state.closed
    }
}

struct NetworkInner {
    endpoints: DashMap<(PeerId, PeerId), Arc<Endpoint>>,
    pairing: Mutex<()>,
}

/// In-process stand-in for the network: every transport created on the same network can
/// reach the transport its remote peer created towards it.
///
/// A channel opens once both ends hold a local and a remote description. Candidates are
/// synthetic and only recorded.
#[derive(Clone)]
pub struct MemoryNetwork {
    inner: Arc<NetworkInner>,
}

impl Default for MemoryNetwork {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryNetwork {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(NetworkInner {
                endpoints: DashMap::new(),
                pairing: Mutex::new(()),
            }),
        }
    }

    pub fn endpoint_count(&self) -> usize {
        self.inner.endpoints.len()
    }

    /// Candidates the `local -> remote` transport applied, in application order.
    pub fn applied_candidates(&self, local: PeerId, remote: PeerId) -> Vec<String> {
        self.endpoint(local, remote)
            .map(|endpoint| endpoint.state().applied_candidates.clone())
            .unwrap_or_default()
    }

    pub fn is_open(&self, local: PeerId, remote: PeerId) -> bool {
        self.endpoint(local, remote)
            .map(|endpoint| endpoint.state().open)
            .unwrap_or(false)
    }

    fn endpoint(&self, local: PeerId, remote: PeerId) -> Option<Arc<Endpoint>> {
        self.inner
            .endpoints
            .get(&(local, remote))
            .map(|entry| Arc::clone(entry.value()))
    }

    fn register(&self, endpoint: Arc<Endpoint>) {
        self.inner
            .endpoints
            .insert((endpoint.local, endpoint.remote), endpoint);
    }

    fn unregister(&self, endpoint: &Arc<Endpoint>) {
        self.inner
            .endpoints
            .remove_if(&(endpoint.local, endpoint.remote), |_, current| {
                Arc::ptr_eq(current, endpoint)
            });
    }

    /// Opens both ends of a pair if both are negotiated. Returns the peer end when it did.
    fn try_open(&self, endpoint: &Arc<Endpoint>) -> Option<Arc<Endpoint>> {
        let _pairing = self
            .inner
            .pairing
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let peer = self.endpoint(endpoint.remote, endpoint.local)?;
        if !endpoint.negotiated() || !peer.negotiated() {
            return None;
        }

        let mut ours = endpoint.state();
        let mut theirs = peer.state();
        if ours.open && theirs.open {
            return None;
        }
        ours.open = true;
        theirs.open = true;
        drop(ours);
        drop(theirs);
        Some(peer)
    }
}

pub struct MemoryTransport {
    network: MemoryNetwork,
    endpoint: Arc<Endpoint>,
    candidate_seq: AtomicU32,
}

impl MemoryTransport {
    pub fn new(
        network: MemoryNetwork,
        local: PeerId,
        remote: PeerId,
        events: mpsc::Sender<TransportEvent>,
    ) -> Self {
        let endpoint = Arc::new(Endpoint {
            local,
            remote,
            events,
            state: Mutex::new(EndpointState::default()),
        });
        network.register(Arc::clone(&endpoint));
        Self {
            network,
            endpoint,
            candidate_seq: AtomicU32::new(0),
        }
    }

    fn describe(&self, kind: DescriptionKind) -> Result<String> {
        let description = MemoryDescription {
            kind,
            from: self.endpoint.local,
            to: self.endpoint.remote,
        };
        Ok(serde_json::to_string(&description)?)
    }

    fn parse(&self, sdp: &str, expected: DescriptionKind) -> Result<()> {
        let description: MemoryDescription =
            serde_json::from_str(sdp).context("Malformed memory description")?;
        ensure!(
            description.kind == expected,
            "Expected {:?}, got {:?}",
            expected,
            description.kind
        );
        ensure!(
            description.from == self.endpoint.remote && description.to == self.endpoint.local,
            "Description {} -> {} is not addressed to this transport",
            description.from,
            description.to
        );
        Ok(())
    }

    async fn announce_candidate(&self) {
        let seq = self.candidate_seq.fetch_add(1, Ordering::Relaxed);
        let candidate = format!(
            "memory {} -> {} #{}",
            self.endpoint.local, self.endpoint.remote, seq
        );
        let _ = self
            .endpoint
            .events
            .send(TransportEvent::CandidateGenerated(
                self.endpoint.remote,
                candidate,
            ))
            .await;
    }

    async fn open_if_ready(&self) {
        if let Some(peer) = self.network.try_open(&self.endpoint) {
            debug!(
                "Memory channel {} <-> {} open",
                self.endpoint.local, self.endpoint.remote
            );
            let _ = self
                .endpoint
                .events
                .send(TransportEvent::ChannelOpen(self.endpoint.remote))
                .await;
            let _ = peer
                .events
                .send(TransportEvent::ChannelOpen(peer.remote))
                .await;
        }
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn create_offer(&self) -> Result<String> {
        {
            let mut state = self.endpoint.state();
            ensure!(!state.closed, "Transport closed");
            state.local = Some(DescriptionKind::Offer);
        }
        self.announce_candidate().await;
        self.describe(DescriptionKind::Offer)
    }

    async fn rollback(&self) -> Result<()> {
        let mut state = self.endpoint.state();
        if state.local == Some(DescriptionKind::Offer) {
            state.local = None;
        }
        Ok(())
    }

    async fn set_remote_offer(&self, sdp: String) -> Result<()> {
        self.parse(&sdp, DescriptionKind::Offer)?;
        let mut state = self.endpoint.state();
        ensure!(
            state.local != Some(DescriptionKind::Offer),
            "Remote offer while a local offer is pending"
        );
        state.remote = Some(DescriptionKind::Offer);
        Ok(())
    }

    async fn create_answer(&self) -> Result<String> {
        {
            let mut state = self.endpoint.state();
            ensure!(
                state.remote == Some(DescriptionKind::Offer),
                "No remote offer to answer"
            );
            state.local = Some(DescriptionKind::Answer);
        }
        self.announce_candidate().await;
        let answer = self.describe(DescriptionKind::Answer)?;
        self.open_if_ready().await;
        Ok(answer)
    }

    async fn set_remote_answer(&self, sdp: String) -> Result<()> {
        self.parse(&sdp, DescriptionKind::Answer)?;
        {
            let mut state = self.endpoint.state();
            ensure!(
                state.local == Some(DescriptionKind::Offer),
                "Answer without a local offer"
            );
            state.remote = Some(DescriptionKind::Answer);
        }
        self.open_if_ready().await;
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: String) -> Result<()> {
        let mut state = self.endpoint.state();
        if state.remote.is_none() {
            bail!("Candidate before remote description");
        }
        state.applied_candidates.push(candidate);
        Ok(())
    }

    async fn send(&self, data: Bytes) -> Result<()> {
        ensure!(self.endpoint.state().open, "Data channel not open");
        let peer = self
            .network
            .endpoint(self.endpoint.remote, self.endpoint.local)
            .ok_or_else(|| anyhow!("Remote end {} is gone", self.endpoint.remote))?;
        peer.events
            .send(TransportEvent::Message(peer.remote, data))
            .await
            .map_err(|_| anyhow!("Remote end {} stopped listening", self.endpoint.remote))
    }

    async fn is_open(&self) -> bool {
        self.endpoint.state().open
    }

    async fn close(&self) -> Result<()> {
        let was_open = {
            let mut state = self.endpoint.state();
            let was_open = state.open;
            state.closed = true;
            state.open = false;
            was_open
        };
        self.network.unregister(&self.endpoint);

        if was_open
            && let Some(peer) = self
                .network
                .endpoint(self.endpoint.remote, self.endpoint.local)
        {
            peer.state().open = false;
            let _ = peer
                .events
                .send(TransportEvent::ChannelClosed(peer.remote))
                .await;
            let _ = peer
                .events
                .send(TransportEvent::Disconnected(peer.remote))
                .await;
        }
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct MemoryTransportFactory {
    network: MemoryNetwork,
}

impl MemoryTransportFactory {
    pub fn new(network: MemoryNetwork) -> Self {
        Self { network }
    }

    pub fn network(&self) -> &MemoryNetwork {
        &self.network
    }
}

#[async_trait]
impl TransportFactory for MemoryTransportFactory {
    async fn create(
        &self,
        local: PeerId,
        remote: PeerId,
        _ice_servers: &[IceServerConfig],
        events: mpsc::Sender<TransportEvent>,
    ) -> Result<Box<dyn Transport>> {
        Ok(Box::new(MemoryTransport::new(
            self.network.clone(),
            local,
            remote,
            events,
        )))
    }
}
