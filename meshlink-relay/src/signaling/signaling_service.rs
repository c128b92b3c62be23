use crate::signaling::SignalingOutput;
use async_trait::async_trait;
use axum::extract::ws::Message;
use dashmap::DashMap;
use meshlink_core::{IceServerConfig, PeerId, ServerSignal};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, warn};

struct SignalingInner {
    sessions: DashMap<PeerId, mpsc::UnboundedSender<Message>>,
    ice_servers: Vec<IceServerConfig>,
}

/// Outbound half of every websocket session, keyed by the session's peer id.
#[derive(Clone)]
pub struct SignalingService {
    inner: Arc<SignalingInner>,
}

impl SignalingService {
    pub fn new(ice_servers: Vec<IceServerConfig>) -> Self {
        Self {
            inner: Arc::new(SignalingInner {
                sessions: DashMap::new(),
                ice_servers,
            }),
        }
    }

    pub fn ice_servers(&self) -> Vec<IceServerConfig> {
        self.inner.ice_servers.clone()
    }

    pub fn add_session(&self, peer_id: PeerId, tx: mpsc::UnboundedSender<Message>) {
        self.inner.sessions.insert(peer_id, tx);
    }

    pub fn remove_session(&self, peer_id: &PeerId) {
        self.inner.sessions.remove(peer_id);
    }

    pub fn session_count(&self) -> usize {
        self.inner.sessions.len()
    }

    pub fn send_signal(&self, peer_id: PeerId, msg: &ServerSignal) {
        let Some(session) = self.inner.sessions.get(&peer_id) else {
            warn!("Attempted to send signal to disconnected peer {}", peer_id);
            return;
        };

        match serde_json::to_string(msg) {
            Ok(json) => {
                if let Err(e) = session.send(Message::Text(json.into())) {
                    error!("Failed to send WS message to {}: {:?}", peer_id, e);
                }
            }
            Err(e) => error!("Failed to serialize signal message: {}", e),
        }
    }
}

#[async_trait]
impl SignalingOutput for SignalingService {
    async fn deliver(&self, peer_id: PeerId, signal: ServerSignal) {
        self.send_signal(peer_id, &signal);
    }
}
