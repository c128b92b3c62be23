use meshlink_core::Role;
use meshlink_peer::SessionOutput;
use meshlink_peer::transport::MemoryNetwork;

use crate::integration::{ROOM, init_tracing, start_mesh};
use crate::utils::LocalRelay;

#[tokio::test]
async fn test_session_survives_leave_and_rejoins() {
    init_tracing();

    let relay = LocalRelay::new();
    let network = MemoryNetwork::new();
    let mut peers = start_mesh(&relay, &network, &["x", "y"], |c| c).await;
    let (x_id, y_id) = (peers[0].id, peers[1].id);
    let first = peers[0].wait_for_mesh(1).await[0].generation;

    peers[1].handle.leave().await.expect("Leave failed");
    peers[0]
        .wait_for(|o| matches!(o, SessionOutput::PeerLeft { peer_id } if *peer_id == y_id))
        .await;
    assert!(peers[1].handle.links().await.unwrap().is_empty());
    assert_eq!(peers[1].handle.identity().await.unwrap().room, None);
    assert!(!peers[1].handle.is_closed());

    assert_eq!(peers[1].join(ROOM).await, Role::Peer);
    let y_links = peers[1].wait_for_mesh(1).await;
    let x_links = peers[0].wait_for_mesh(1).await;
    assert_eq!(y_links[0].peer_id, x_id);
    assert!(x_links[0].generation > first);

    let mark = peers[1].history_len();
    peers[0].handle.send_chat("welcome back").await.expect("Send failed");
    peers[1]
        .wait_for_since(mark, |o| {
            matches!(o, SessionOutput::Chat { message, .. } if message.text == "welcome back")
        })
        .await;
}
