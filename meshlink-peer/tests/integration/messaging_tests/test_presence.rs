use meshlink_core::Role;
use meshlink_peer::SessionOutput;
use meshlink_peer::presence::{PresencePatch, PresenceStatus, color_for};
use meshlink_peer::transport::MemoryNetwork;

use crate::integration::{init_tracing, start_mesh};
use crate::utils::LocalRelay;

#[tokio::test]
async fn test_presence_is_exchanged_on_connect() {
    init_tracing();

    let relay = LocalRelay::new();
    let network = MemoryNetwork::new();
    let mut peers = start_mesh(&relay, &network, &["x", "y"], |c| c).await;
    let (x_id, y_id) = (peers[0].id, peers[1].id);

    peers[1]
        .wait_for(|o| matches!(o, SessionOutput::Presence { peer_id, .. } if *peer_id == x_id))
        .await;
    peers[0]
        .wait_for(|o| matches!(o, SessionOutput::Presence { peer_id, .. } if *peer_id == y_id))
        .await;

    let seen_by_y = peers[1].handle.presence().await.unwrap();
    assert_eq!(seen_by_y.len(), 1);
    let (id, state) = &seen_by_y[0];
    assert_eq!(*id, x_id);
    assert_eq!(state.name, "x");
    assert_eq!(state.role, Some(Role::Host));
    assert_eq!(state.color, color_for("x"));
}

#[tokio::test]
async fn test_presence_update_propagates() {
    init_tracing();

    let relay = LocalRelay::new();
    let network = MemoryNetwork::new();
    let mut peers = start_mesh(&relay, &network, &["x", "y", "z"], |c| c).await;
    let z_id = peers[2].id;

    peers[2]
        .handle
        .set_presence(PresencePatch {
            name: Some("zed".into()),
            status: Some(PresenceStatus::Busy),
            ..Default::default()
        })
        .await
        .expect("Update failed");

    for peer in peers.iter_mut().take(2) {
        match peer
            .wait_for(|o| {
                matches!(o, SessionOutput::Presence { peer_id, state } if *peer_id == z_id && state.name == "zed")
            })
            .await
        {
            SessionOutput::Presence { state, .. } => {
                assert_eq!(state.status, PresenceStatus::Busy);
                assert_eq!(state.color, color_for("zed"));
            }
            _ => unreachable!(),
        }

        let table = peer.handle.presence().await.unwrap();
        let (_, state) = table.iter().find(|(id, _)| *id == z_id).unwrap();
        assert_eq!(state.name, "zed");
    }
}
