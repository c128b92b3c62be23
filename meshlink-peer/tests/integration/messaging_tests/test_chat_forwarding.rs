use meshlink_peer::SessionOutput;
use meshlink_peer::forward::ForwardPolicy;
use meshlink_peer::transport::MemoryNetwork;

use crate::integration::{init_tracing, start_mesh};
use crate::utils::LocalRelay;

fn chats_from(peer: &crate::utils::TestPeer, origin: meshlink_core::PeerId, text: &str) -> usize {
    peer.count(|o| {
        matches!(o, SessionOutput::Chat { origin: from, message, .. } if *from == origin && message.text == text)
    })
}

#[tokio::test]
async fn test_host_forwarding_is_delivered_once() {
    init_tracing();

    let relay = LocalRelay::new();
    let network = MemoryNetwork::new();
    let mut peers = start_mesh(&relay, &network, &["x", "y", "z"], |c| c).await;
    let sender = peers[1].id;

    peers[1].handle.send_chat("once").await.expect("Send failed");

    for i in [0, 2] {
        peers[i]
            .wait_for(|o| matches!(o, SessionOutput::Chat { message, .. } if message.text == "once"))
            .await;
        peers[i].settle(300).await;
        assert_eq!(chats_from(&peers[i], sender, "once"), 1);
    }

    // the sender never hears its own message back
    peers[1].settle(100).await;
    assert_eq!(chats_from(&peers[1], sender, "once"), 0);
}

#[tokio::test]
async fn test_mesh_forwarding_is_delivered_once() {
    init_tracing();

    let relay = LocalRelay::new();
    let network = MemoryNetwork::new();
    let mut peers = start_mesh(&relay, &network, &["a", "b", "c", "d"], |mut c| {
        c.forward_policy = ForwardPolicy::Mesh;
        c
    })
    .await;
    let sender = peers[3].id;

    peers[3].handle.send_chat("flood").await.expect("Send failed");

    for peer in peers.iter_mut().take(3) {
        peer.wait_for(|o| matches!(o, SessionOutput::Chat { message, .. } if message.text == "flood"))
            .await;
        peer.settle(300).await;
        assert_eq!(chats_from(peer, sender, "flood"), 1);
    }
}
