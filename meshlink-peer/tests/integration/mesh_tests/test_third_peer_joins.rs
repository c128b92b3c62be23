use meshlink_peer::SessionOutput;
use meshlink_peer::transport::MemoryNetwork;

use crate::integration::{ROOM, init_tracing, start_mesh};
use crate::utils::{LocalRelay, TestPeer, test_config};

#[tokio::test]
async fn test_third_peer_joins() {
    init_tracing();

    let relay = LocalRelay::new();
    let network = MemoryNetwork::new();
    let mut peers = start_mesh(&relay, &network, &["x", "y"], |c| c).await;

    let before_x = peers[0].wait_for_mesh(1).await;
    let before_y = peers[1].wait_for_mesh(1).await;

    let mut z = TestPeer::start(&relay, &network, test_config("z")).await;
    z.join(ROOM).await;

    match z
        .wait_for(|o| matches!(o, SessionOutput::Joined { .. }))
        .await
    {
        SessionOutput::Joined { peers: listed, .. } => {
            assert_eq!(listed, vec![peers[0].id, peers[1].id])
        }
        _ => unreachable!(),
    }

    let z_links = z.wait_for_mesh(2).await;
    let after_x = peers[0].wait_for_mesh(2).await;
    let after_y = peers[1].wait_for_mesh(2).await;
    assert_eq!(z_links.len(), 2);

    // x <-> y is the same link as before z arrived
    let x_to_y = after_x.iter().find(|l| l.peer_id == peers[1].id).unwrap();
    let y_to_x = after_y.iter().find(|l| l.peer_id == peers[0].id).unwrap();
    assert_eq!(x_to_y.generation, before_x[0].generation);
    assert_eq!(y_to_x.generation, before_y[0].generation);

    z.handle.send_chat("hello both").await.expect("Send failed");
    for peer in peers.iter_mut() {
        peer.wait_for(
            |o| matches!(o, SessionOutput::Chat { message, .. } if message.text == "hello both"),
        )
        .await;
    }
}
