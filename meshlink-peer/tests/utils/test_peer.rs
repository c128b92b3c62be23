use crate::utils::LocalRelay;
use meshlink_core::{PeerId, Role};
use meshlink_peer::link::{LinkSnapshot, LinkState};
use meshlink_peer::transport::{MemoryNetwork, MemoryTransportFactory};
use meshlink_peer::{SessionBuilder, SessionConfig, SessionHandle, SessionOutput};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Timeout for a single expected outcome (ms).
pub const STEP_TIMEOUT_MS: u64 = 5000;

pub fn test_config(name: &str) -> SessionConfig {
    SessionConfig {
        display_name: name.to_owned(),
        handshake_retry_interval: Duration::from_millis(200),
        ..SessionConfig::default()
    }
}

/// A session on the in-memory network plus everything it has reported so far.
pub struct TestPeer {
    pub id: PeerId,
    pub handle: SessionHandle,
    outputs: mpsc::UnboundedReceiver<SessionOutput>,
    history: Vec<SessionOutput>,
}

impl TestPeer {
    pub async fn start(relay: &LocalRelay, network: &MemoryNetwork, config: SessionConfig) -> Self {
        Self::start_with(relay, network, |builder| builder.config(config)).await
    }

    pub async fn start_with(
        relay: &LocalRelay,
        network: &MemoryNetwork,
        configure: impl FnOnce(SessionBuilder) -> SessionBuilder,
    ) -> Self {
        let (id, sink, signals) = relay.connect();
        let factory = Arc::new(MemoryTransportFactory::new(network.clone()));
        let (handle, outputs) = configure(SessionBuilder::new(sink, signals, factory)).spawn();

        let mut peer = Self {
            id,
            handle,
            outputs,
            history: Vec::new(),
        };
        peer.wait_for(|o| matches!(o, SessionOutput::Identified { .. }))
            .await;
        peer
    }

    /// Joins `room` and waits for the relay to assign a role.
    pub async fn join(&mut self, room: &str) -> Role {
        let start = self.history.len();
        self.handle.join(room).await.expect("Join rejected");
        match self
            .wait_for_since(start, |o| matches!(o, SessionOutput::RoleChanged { .. }))
            .await
        {
            SessionOutput::RoleChanged { role } => role,
            _ => unreachable!(),
        }
    }

    /// First output matching `pred`, looking at what was already reported first.
    pub async fn wait_for(&mut self, pred: impl Fn(&SessionOutput) -> bool) -> SessionOutput {
        self.wait_for_since(0, pred).await
    }

    /// Like `wait_for`, ignoring the first `start` outputs of the history.
    pub async fn wait_for_since(
        &mut self,
        start: usize,
        pred: impl Fn(&SessionOutput) -> bool,
    ) -> SessionOutput {
        if let Some(found) = self.history.iter().skip(start).find(|o| pred(*o)) {
            return found.clone();
        }

        let deadline = tokio::time::Instant::now() + Duration::from_millis(STEP_TIMEOUT_MS);
        loop {
            let next = tokio::time::timeout_at(deadline, self.outputs.recv())
                .await
                .unwrap_or_else(|_| panic!("Timeout waiting for output on {}", self.id))
                .expect("Session stopped");
            self.history.push(next.clone());
            if pred(&next) {
                return next;
            }
        }
    }

    /// Collects outputs for `ms` milliseconds.
    pub async fn settle(&mut self, ms: u64) {
        let deadline = tokio::time::Instant::now() + Duration::from_millis(ms);
        while let Ok(Some(next)) = tokio::time::timeout_at(deadline, self.outputs.recv()).await {
            self.history.push(next);
        }
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn count(&self, pred: impl Fn(&SessionOutput) -> bool) -> usize {
        self.history.iter().filter(|o| pred(*o)).count()
    }

    /// Waits until exactly `peers` links exist and all are stable and secured.
    pub async fn wait_for_mesh(&self, peers: usize) -> Vec<LinkSnapshot> {
        let deadline = tokio::time::Instant::now() + Duration::from_millis(STEP_TIMEOUT_MS);
        loop {
            let links = self.handle.links().await.expect("Session stopped");
            let ready = links.len() == peers
                && links
                    .iter()
                    .all(|l| l.state == LinkState::Stable && l.established);
            if ready {
                return links;
            }
            if tokio::time::Instant::now() > deadline {
                panic!("Mesh of {} peers not ready on {}: {:?}", peers, self.id, links);
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    /// Waits until the link to `peer` reports `state`.
    pub async fn wait_for_link_state(&self, peer: PeerId, state: LinkState) {
        let deadline = tokio::time::Instant::now() + Duration::from_millis(STEP_TIMEOUT_MS);
        loop {
            let links = self.handle.links().await.expect("Session stopped");
            if links.iter().any(|l| l.peer_id == peer && l.state == state) {
                return;
            }
            if tokio::time::Instant::now() > deadline {
                panic!("Link {} -> {} never reached {}: {:?}", self.id, peer, state, links);
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }
}
