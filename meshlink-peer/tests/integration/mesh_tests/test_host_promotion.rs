use meshlink_core::Role;
use meshlink_peer::SessionOutput;
use meshlink_peer::transport::MemoryNetwork;

use crate::integration::{init_tracing, start_mesh};
use crate::utils::LocalRelay;

#[tokio::test]
async fn test_host_disconnect_promotes_earliest_peer() {
    init_tracing();

    let relay = LocalRelay::new();
    let network = MemoryNetwork::new();
    let mut peers = start_mesh(&relay, &network, &["x", "y", "z"], |c| c).await;
    let host = peers[0].id;

    relay.disconnect(host).await;

    peers[1]
        .wait_for(|o| matches!(o, SessionOutput::RoleChanged { role: Role::Host }))
        .await;
    let identity = peers[1].handle.identity().await.unwrap();
    assert_eq!(identity.role, Some(Role::Host));

    peers[2]
        .wait_for(|o| matches!(o, SessionOutput::PeerLeft { peer_id } if *peer_id == host))
        .await;
    peers[2].settle(200).await;
    assert_eq!(
        peers[2].count(|o| matches!(o, SessionOutput::RoleChanged { role: Role::Host })),
        0
    );
}
