use meshlink_core::{PeerId, RoomId};
use thiserror::Error;

/// Reasons the relay refuses to act on a client signal.
///
/// None of these are fatal: the caller logs them and the envelope is dropped.
#[derive(Debug, Error, PartialEq)]
pub enum RelayError {
    #[error("peer {peer_id} is not a member of room '{room_id}'")]
    NotInRoom { peer_id: PeerId, room_id: RoomId },

    #[error("target {target_id} is not present in room '{room_id}'")]
    UnknownTarget { target_id: PeerId, room_id: RoomId },
}
