use meshlink_core::ServerSignal;
use meshlink_peer::SessionOutput;
use meshlink_peer::link::LinkState;
use meshlink_peer::transport::MemoryNetwork;

use crate::integration::{ROOM, init_tracing};
use crate::utils::{LocalRelay, TestPeer, test_config};

#[tokio::test]
async fn test_crossing_offers_settle_on_one_link() {
    init_tracing();

    let relay = LocalRelay::new();
    let network = MemoryNetwork::new();

    let mut x = TestPeer::start(&relay, &network, test_config("x")).await;
    x.join(ROOM).await;

    relay.hold_negotiation();

    let mut y = TestPeer::start(&relay, &network, test_config("y")).await;
    y.join(ROOM).await;
    y.wait_for_link_state(x.id, LinkState::HaveLocalOffer).await;

    // Make x offer too while y's offer is still in flight
    relay.inject(x.id, ServerSignal::RoomPeers { peers: vec![y.id] });
    x.wait_for_link_state(y.id, LinkState::HaveLocalOffer).await;

    relay.release().await;

    let x_links = x.wait_for_mesh(1).await;
    let y_links = y.wait_for_mesh(1).await;
    assert_eq!(x_links.len(), 1);
    assert_eq!(y_links.len(), 1);
    assert_eq!(x_links[0].generation, 1);
    assert_eq!(y_links[0].generation, 1);

    x.handle.send_chat("after glare").await.expect("Send failed");
    y.wait_for(|o| matches!(o, SessionOutput::Chat { message, .. } if message.text == "after glare"))
        .await;
}
