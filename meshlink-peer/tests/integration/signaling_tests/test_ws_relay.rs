use meshlink_core::Role;
use meshlink_peer::signaling::WsSignaling;
use meshlink_peer::transport::{MemoryNetwork, MemoryTransportFactory};
use meshlink_peer::{SessionBuilder, SessionHandle, SessionOutput};
use meshlink_relay::{AppState, SignalingService, router};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::integration::{ROOM, init_tracing};
use crate::utils::{STEP_TIMEOUT_MS, test_config};

async fn spawn_relay() -> String {
    let state = AppState::new(SignalingService::new(Vec::new()), true);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test relay");
    let addr = listener.local_addr().expect("No local address");

    tokio::spawn(async move {
        axum::serve(listener, router(state)).await.ok();
    });

    format!("ws://{}/ws", addr)
}

async fn connect(
    url: &str,
    network: &MemoryNetwork,
    name: &str,
) -> (SessionHandle, mpsc::UnboundedReceiver<SessionOutput>) {
    let (sink, signals) = WsSignaling::connect(url).await.expect("Connect failed");
    let factory = Arc::new(MemoryTransportFactory::new(network.clone()));
    SessionBuilder::new(Arc::new(sink), signals, factory)
        .config(test_config(name))
        .spawn()
}

async fn next_matching(
    outputs: &mut mpsc::UnboundedReceiver<SessionOutput>,
    pred: impl Fn(&SessionOutput) -> bool,
) -> SessionOutput {
    tokio::time::timeout(Duration::from_millis(STEP_TIMEOUT_MS), async {
        loop {
            let next = outputs.recv().await.expect("Session stopped");
            if pred(&next) {
                return next;
            }
        }
    })
    .await
    .expect("Timeout waiting for output")
}

#[tokio::test]
async fn test_chat_over_websocket_relay() {
    init_tracing();

    let url = spawn_relay().await;
    let network = MemoryNetwork::new();

    let (x, mut x_out) = connect(&url, &network, "x").await;
    let x_id = match next_matching(&mut x_out, |o| matches!(o, SessionOutput::Identified { .. })).await {
        SessionOutput::Identified { peer_id } => peer_id,
        _ => unreachable!(),
    };
    x.join(ROOM).await.expect("Join failed");
    next_matching(&mut x_out, |o| {
        matches!(o, SessionOutput::RoleChanged { role: Role::Host })
    })
    .await;

    let (y, mut y_out) = connect(&url, &network, "y").await;
    y.join(ROOM).await.expect("Join failed");
    next_matching(&mut y_out, |o| {
        matches!(o, SessionOutput::PeerSecured { peer_id } if *peer_id == x_id)
    })
    .await;
    next_matching(&mut x_out, |o| matches!(o, SessionOutput::PeerSecured { .. })).await;

    x.send_chat("over the wire").await.expect("Send failed");
    match next_matching(&mut y_out, |o| matches!(o, SessionOutput::Chat { .. })).await {
        SessionOutput::Chat { origin, message, .. } => {
            assert_eq!(origin, x_id);
            assert_eq!(message.text, "over the wire");
        }
        _ => unreachable!(),
    }
}
