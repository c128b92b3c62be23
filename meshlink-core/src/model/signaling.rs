use crate::model::peer::PeerId;
use crate::model::room::{Role, RoomId};
use serde::{Deserialize, Serialize};

/// Public STUN server used when nothing else is configured.
pub const DEFAULT_STUN_ADDR: &str = "stun:stun.l.google.com:19302";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IceServerConfig {
    pub urls: Vec<String>,
    pub username: Option<String>,
    pub credential: Option<String>,
}

impl IceServerConfig {
    pub fn default_stun() -> Self {
        Self {
            urls: vec![DEFAULT_STUN_ADDR.to_owned()],
            username: None,
            credential: None,
        }
    }
}

/// Messages a peer sends to the relay.
///
/// `offer`, `answer` and `ice-candidate` payloads are opaque to the relay: it forwards
/// them verbatim to `target_id`, or to the rest of the room when no target is named.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(
    tag = "op",
    content = "d",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum ClientSignal {
    JoinRoom {
        room_id: RoomId,
    },
    LeaveRoom {
        room_id: RoomId,
    },
    Offer {
        room_id: RoomId,
        offer: String,
        target_id: Option<PeerId>,
    },
    Answer {
        room_id: RoomId,
        answer: String,
        target_id: Option<PeerId>,
    },
    IceCandidate {
        room_id: RoomId,
        candidate: String,
        target_id: Option<PeerId>,
    },
}

/// Messages the relay sends to a peer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(
    tag = "op",
    content = "d",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum ServerSignal {
    Welcome {
        peer_id: PeerId,
        ice_servers: Vec<IceServerConfig>,
    },
    Role {
        role: Role,
    },
    RoomPeers {
        peers: Vec<PeerId>,
    },
    PeerJoined {
        peer_id: PeerId,
    },
    PeerLeft {
        peer_id: PeerId,
    },
    Offer {
        room_id: RoomId,
        offer: String,
        from_id: PeerId,
    },
    Answer {
        room_id: RoomId,
        answer: String,
        from_id: PeerId,
    },
    IceCandidate {
        room_id: RoomId,
        candidate: String,
        from_id: PeerId,
    },
    Error {
        reason: String,
    },
}
