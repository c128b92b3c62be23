use meshlink_core::RoomId;
use meshlink_peer::transport::MemoryNetwork;
use meshlink_peer::{AllowList, SessionError, SessionOutput};

use crate::integration::{ROOM, init_tracing};
use crate::utils::{LocalRelay, TestPeer, test_config};

#[tokio::test]
async fn test_unknown_room_never_reaches_relay() {
    init_tracing();

    let relay = LocalRelay::new();
    let network = MemoryNetwork::new();
    let mut peer = TestPeer::start_with(&relay, &network, |builder| {
        builder
            .config(test_config("x"))
            .room_gate(AllowList::new([RoomId::from(ROOM)]))
    })
    .await;

    let err = peer.handle.join("nope").await.unwrap_err();
    assert!(matches!(err, SessionError::RoomUnavailable(room) if room.as_str() == "nope"));
    peer.wait_for(|o| matches!(o, SessionOutput::RoomRejected { .. }))
        .await;
    assert!(relay.members("nope").is_empty());

    peer.join(ROOM).await;
    assert_eq!(relay.members(ROOM), vec![peer.id]);
}
