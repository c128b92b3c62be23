use crate::error::SessionError;
use crate::link::LinkSnapshot;
use crate::presence::{PresencePatch, PresenceState};
use meshlink_core::{PeerId, Role, RoomId};
use serde_json::Value;
use tokio::sync::oneshot;

/// Who this session is, as far as the relay has told it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Identity {
    pub peer_id: Option<PeerId>,
    pub role: Option<Role>,
    pub room: Option<RoomId>,
}

pub enum SessionCommand {
    Join {
        room: RoomId,
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    Leave,
    SendChat {
        text: String,
    },
    PublishUpdate {
        update: Vec<u8>,
    },
    WriteEntry {
        key: String,
        value: Option<Value>,
    },
    SetPresence {
        patch: PresencePatch,
    },
    Links {
        reply: oneshot::Sender<Vec<LinkSnapshot>>,
    },
    Presence {
        reply: oneshot::Sender<Vec<(PeerId, PresenceState)>>,
    },
    DocumentState {
        reply: oneshot::Sender<Vec<u8>>,
    },
    Identity {
        reply: oneshot::Sender<Identity>,
    },
}
