use crate::signaling::{Relay, SignalingService};
use axum::Router;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Json;
use futures::{SinkExt, StreamExt};
use meshlink_core::{ClientSignal, PeerId, ServerSignal};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

#[derive(Clone)]
pub struct AppState {
    pub signaling: SignalingService,
    pub relay: Arc<Relay>,
}

impl AppState {
    pub fn new(signaling: SignalingService, promote_host: bool) -> Self {
        let relay = Arc::new(Relay::new(Arc::new(signaling.clone()), promote_host));
        Self { signaling, relay }
    }
}

#[derive(Debug, Serialize)]
struct Health {
    status: &'static str,
    rooms: usize,
    sessions: usize,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(Health {
        status: "ok",
        rooms: state.relay.room_count(),
        sessions: state.signaling.session_count(),
    })
}

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let peer_id = PeerId::new();
    info!("New WebSocket session: {}", peer_id);

    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel();

    state.signaling.add_session(peer_id, tx);
    state.signaling.send_signal(
        peer_id,
        &ServerSignal::Welcome {
            peer_id,
            ice_servers: state.signaling.ice_servers(),
        },
    );

    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sender.send(msg).await.is_err() {
                break;
            }
        }
    });

    let mut recv_task = tokio::spawn({
        let state = state.clone();

        async move {
            while let Some(Ok(msg)) = receiver.next().await {
                match msg {
                    Message::Text(text) => match serde_json::from_str::<ClientSignal>(&text) {
                        Ok(signal) => {
                            debug!("Signal from {}: {:?}", peer_id, signal);
                            if let Err(e) = state.relay.handle(peer_id, signal).await {
                                warn!("Dropped signal from {}: {}", peer_id, e);
                            }
                        }
                        Err(e) => warn!("Invalid ClientSignal from {}: {:?}", peer_id, e),
                    },
                    Message::Close(_) => break,
                    _ => {}
                }
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    };

    state.relay.disconnect(peer_id).await;
    state.signaling.remove_session(&peer_id);
    info!("WebSocket session closed: {}", peer_id);
}
