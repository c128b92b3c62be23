use meshlink_peer::SessionOutput;
use meshlink_peer::document::{DocumentState, OpLog};
use meshlink_peer::forward::ForwardPolicy;
use meshlink_peer::transport::MemoryNetwork;
use serde_json::json;

use crate::integration::{ROOM, init_tracing, start_mesh};
use crate::utils::{LocalRelay, TestPeer, test_config};

fn decode(state: &[u8]) -> OpLog {
    let mut doc = OpLog::new();
    doc.apply_update(state).expect("Bad document state");
    doc
}

#[tokio::test]
async fn test_update_reaches_every_peer_once() {
    init_tracing();

    let relay = LocalRelay::new();
    let network = MemoryNetwork::new();
    let mut peers = start_mesh(&relay, &network, &["a", "b", "c"], |mut c| {
        c.forward_policy = ForwardPolicy::Mesh;
        c
    })
    .await;
    let origin = peers[0].id;

    let mut writer = OpLog::new();
    let update = writer.set("title", json!("Minutes"));
    peers[0]
        .handle
        .publish_update(update)
        .await
        .expect("Publish failed");

    for peer in peers.iter_mut().skip(1) {
        peer.wait_for(|o| matches!(o, SessionOutput::DocumentUpdated { origin: from, changed: true } if *from == origin))
            .await;
        peer.settle(300).await;
        assert_eq!(
            peer.count(|o| matches!(o, SessionOutput::DocumentUpdated { origin: from, .. } if *from == origin)),
            1
        );

        let state = peer.handle.document_state().await.unwrap();
        assert_eq!(decode(&state).get("title"), Some(&json!("Minutes")));
    }

    let local = peers[0].handle.document_state().await.unwrap();
    assert_eq!(decode(&local).get("title"), Some(&json!("Minutes")));
}

#[tokio::test]
async fn test_late_joiner_receives_document() {
    init_tracing();

    let relay = LocalRelay::new();
    let network = MemoryNetwork::new();
    let peers = start_mesh(&relay, &network, &["a", "b"], |c| c).await;

    peers[1]
        .handle
        .set_entry("title", json!("Draft"))
        .await
        .expect("Write failed");
    peers[1]
        .handle
        .set_entry("owner", json!("b"))
        .await
        .expect("Write failed");

    let mut late = TestPeer::start(&relay, &network, test_config("c")).await;
    late.join(ROOM).await;
    late.wait_for_mesh(2).await;
    late.wait_for(|o| matches!(o, SessionOutput::DocumentUpdated { changed: true, .. }))
        .await;
    late.settle(200).await;

    let doc = decode(&late.handle.document_state().await.unwrap());
    assert_eq!(doc.get("title"), Some(&json!("Draft")));
    assert_eq!(doc.get("owner"), Some(&json!("b")));
}

#[tokio::test]
async fn test_local_write_wins_after_remote_edits() {
    init_tracing();

    let relay = LocalRelay::new();
    let network = MemoryNetwork::new();
    let mut peers = start_mesh(&relay, &network, &["a", "b"], |c| c).await;
    let (a_id, b_id) = (peers[0].id, peers[1].id);

    for value in ["b1", "b2", "b3"] {
        peers[1]
            .handle
            .set_entry("k", json!(value))
            .await
            .expect("Write failed");
    }
    let from_b =
        |o: &SessionOutput| matches!(o, SessionOutput::DocumentUpdated { origin, changed: true } if *origin == b_id);
    for _ in 0..100 {
        if peers[0].count(from_b) == 3 {
            break;
        }
        peers[0].settle(50).await;
    }
    assert_eq!(peers[0].count(from_b), 3);

    peers[0]
        .handle
        .set_entry("k", json!("a-later"))
        .await
        .expect("Write failed");

    let local = decode(&peers[0].handle.document_state().await.unwrap());
    assert_eq!(local.get("k"), Some(&json!("a-later")));

    peers[1]
        .wait_for(|o| matches!(o, SessionOutput::DocumentUpdated { origin, changed: true } if *origin == a_id))
        .await;
    let remote = decode(&peers[1].handle.document_state().await.unwrap());
    assert_eq!(remote.get("k"), Some(&json!("a-later")));

    peers[1].handle.remove_entry("k").await.expect("Write failed");
    peers[0].settle(200).await;
    let local = decode(&peers[0].handle.document_state().await.unwrap());
    assert_eq!(local.get("k"), None);
}

#[tokio::test]
async fn test_malformed_update_is_not_published() {
    init_tracing();

    let relay = LocalRelay::new();
    let network = MemoryNetwork::new();
    let mut peers = start_mesh(&relay, &network, &["a", "b"], |c| c).await;

    peers[0]
        .handle
        .publish_update(b"not an update".to_vec())
        .await
        .expect("Publish failed");
    peers[1].settle(300).await;

    assert_eq!(
        peers[1].count(|o| matches!(o, SessionOutput::DocumentUpdated { .. })),
        0
    );
    assert!(decode(&peers[0].handle.document_state().await.unwrap()).entries().is_empty());
}
