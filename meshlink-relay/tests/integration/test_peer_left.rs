use meshlink_core::{ClientSignal, Role, RoomId, ServerSignal};

use crate::integration::{init_tracing, spawn_relay};
use crate::utils::TestSignalClient;

#[tokio::test]
async fn test_host_disconnect_notifies_and_promotes() {
    init_tracing();
    let addr = spawn_relay().await;
    let room = RoomId::from("r1");

    let mut x = TestSignalClient::connect(addr).await.unwrap();
    x.send(ClientSignal::JoinRoom {
        room_id: room.clone(),
    })
    .await
    .unwrap();
    x.recv().await.unwrap();
    x.recv().await.unwrap();

    let mut y = TestSignalClient::connect(addr).await.unwrap();
    y.send(ClientSignal::JoinRoom {
        room_id: room.clone(),
    })
    .await
    .unwrap();
    y.recv().await.unwrap();
    y.recv().await.unwrap();

    let x_id = x.peer_id;
    x.close().await.unwrap();

    assert_eq!(
        y.recv().await.unwrap(),
        ServerSignal::PeerLeft { peer_id: x_id }
    );
    assert_eq!(y.recv().await.unwrap(), ServerSignal::Role { role: Role::Host });
}

#[tokio::test]
async fn test_explicit_leave_notifies_remaining() {
    init_tracing();
    let addr = spawn_relay().await;
    let room = RoomId::from("r2");

    let mut x = TestSignalClient::connect(addr).await.unwrap();
    let mut y = TestSignalClient::connect(addr).await.unwrap();
    for client in [&mut x, &mut y] {
        client
            .send(ClientSignal::JoinRoom {
                room_id: room.clone(),
            })
            .await
            .unwrap();
        client.recv().await.unwrap();
        client.recv().await.unwrap();
    }
    assert_eq!(
        x.recv().await.unwrap(),
        ServerSignal::PeerJoined { peer_id: y.peer_id }
    );

    y.send(ClientSignal::LeaveRoom {
        room_id: room.clone(),
    })
    .await
    .unwrap();

    assert_eq!(
        x.recv().await.unwrap(),
        ServerSignal::PeerLeft { peer_id: y.peer_id }
    );
}
