use meshlink_core::{ClientSignal, Role, RoomId, ServerSignal};

use crate::integration::{init_tracing, spawn_relay};
use crate::utils::TestSignalClient;

#[tokio::test]
async fn test_two_peers_join_and_exchange_offer() {
    init_tracing();
    let addr = spawn_relay().await;
    let room = RoomId::from("r1");

    let mut x = TestSignalClient::connect(addr).await.expect("x connect");
    x.send(ClientSignal::JoinRoom {
        room_id: room.clone(),
    })
    .await
    .unwrap();
    assert_eq!(x.recv().await.unwrap(), ServerSignal::Role { role: Role::Host });
    assert_eq!(
        x.recv().await.unwrap(),
        ServerSignal::RoomPeers { peers: vec![] }
    );

    let mut y = TestSignalClient::connect(addr).await.expect("y connect");
    y.send(ClientSignal::JoinRoom {
        room_id: room.clone(),
    })
    .await
    .unwrap();
    assert_eq!(y.recv().await.unwrap(), ServerSignal::Role { role: Role::Peer });
    assert_eq!(
        y.recv().await.unwrap(),
        ServerSignal::RoomPeers {
            peers: vec![x.peer_id]
        }
    );
    assert_eq!(
        x.recv().await.unwrap(),
        ServerSignal::PeerJoined { peer_id: y.peer_id }
    );

    x.send(ClientSignal::Offer {
        room_id: room.clone(),
        offer: "v=0 offer".into(),
        target_id: Some(y.peer_id),
    })
    .await
    .unwrap();
    assert_eq!(
        y.recv().await.unwrap(),
        ServerSignal::Offer {
            room_id: room.clone(),
            offer: "v=0 offer".into(),
            from_id: x.peer_id,
        }
    );

    y.send(ClientSignal::Answer {
        room_id: room.clone(),
        answer: "v=0 answer".into(),
        target_id: Some(x.peer_id),
    })
    .await
    .unwrap();
    assert_eq!(
        x.recv().await.unwrap(),
        ServerSignal::Answer {
            room_id: room,
            answer: "v=0 answer".into(),
            from_id: y.peer_id,
        }
    );
}

#[tokio::test]
async fn test_envelope_to_foreign_room_member_is_dropped() {
    init_tracing();
    let addr = spawn_relay().await;

    let mut a = TestSignalClient::connect(addr).await.unwrap();
    let mut b = TestSignalClient::connect(addr).await.unwrap();
    a.send(ClientSignal::JoinRoom {
        room_id: RoomId::from("a"),
    })
    .await
    .unwrap();
    b.send(ClientSignal::JoinRoom {
        room_id: RoomId::from("b"),
    })
    .await
    .unwrap();
    for _ in 0..2 {
        a.recv().await.unwrap();
        b.recv().await.unwrap();
    }

    a.send(ClientSignal::IceCandidate {
        room_id: RoomId::from("a"),
        candidate: "candidate:1".into(),
        target_id: Some(b.peer_id),
    })
    .await
    .unwrap();

    assert!(b.expect_silence(300).await);
}
