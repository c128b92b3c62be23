pub mod test_join_and_forward;
pub mod test_peer_left;

use meshlink_relay::{AppState, SignalingService, router};
use std::net::SocketAddr;
use tracing::Level;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_test_writer()
        .try_init();
}

/// Serves the relay on an ephemeral local port.
pub async fn spawn_relay() -> SocketAddr {
    let state = AppState::new(SignalingService::new(Vec::new()), true);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test relay");
    let addr = listener.local_addr().expect("No local address");

    tokio::spawn(async move {
        axum::serve(listener, router(state)).await.ok();
    });

    addr
}
