use crate::bus::ChatMessage;
use crate::link::LinkState;
use crate::presence::PresenceState;
use meshlink_core::{PeerId, Role, RoomId};

/// Everything the session reports to the application.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionOutput {
    /// The relay assigned our peer id.
    Identified { peer_id: PeerId },
    Joined { room: RoomId, peers: Vec<PeerId> },
    RoomRejected { room: RoomId },
    RoleChanged { role: Role },
    PeerJoined { peer_id: PeerId },
    PeerLeft { peer_id: PeerId },
    LinkState { peer_id: PeerId, state: LinkState },
    /// The secure channel with `peer_id` is up.
    PeerSecured { peer_id: PeerId },
    Chat {
        origin: PeerId,
        via: PeerId,
        message: ChatMessage,
    },
    Presence { peer_id: PeerId, state: PresenceState },
    DocumentUpdated { origin: PeerId, changed: bool },
    RemoteTrack {
        peer_id: PeerId,
        track_id: String,
        kind: String,
    },
    RelayError { reason: String },
}
