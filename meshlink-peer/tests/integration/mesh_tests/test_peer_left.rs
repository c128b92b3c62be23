use meshlink_peer::SessionOutput;
use meshlink_peer::transport::MemoryNetwork;

use crate::integration::{ROOM, init_tracing, start_mesh};
use crate::utils::LocalRelay;

#[tokio::test]
async fn test_leaving_peer_is_torn_down_everywhere() {
    init_tracing();

    let relay = LocalRelay::new();
    let network = MemoryNetwork::new();
    let mut peers = start_mesh(&relay, &network, &["x", "y", "z"], |c| c).await;
    let leaving = peers[2].id;

    peers[2].handle.leave().await.expect("Leave failed");

    for peer in peers.iter_mut().take(2) {
        peer.wait_for(|o| matches!(o, SessionOutput::PeerLeft { peer_id } if *peer_id == leaving))
            .await;
        let links = peer.wait_for_mesh(1).await;
        assert!(links.iter().all(|l| l.peer_id != leaving));

        let presence = peer.handle.presence().await.unwrap();
        assert!(presence.iter().all(|(id, _)| *id != leaving));
    }

    assert_eq!(relay.members(ROOM), vec![peers[0].id, peers[1].id]);
    assert!(peers[2].handle.links().await.unwrap().is_empty());
}
