use anyhow::Result;
use async_trait::async_trait;
use meshlink_core::RoomId;
use std::collections::HashSet;

/// Decides whether a room code may be joined before anything reaches the relay.
#[async_trait]
pub trait RoomGate: Send + Sync {
    async fn admit(&self, room: &RoomId) -> Result<bool>;
}

/// Admits every non-empty code.
pub struct OpenGate;

#[async_trait]
impl RoomGate for OpenGate {
    async fn admit(&self, room: &RoomId) -> Result<bool> {
        Ok(!room.as_str().trim().is_empty())
    }
}

/// Admits only the listed codes.
pub struct AllowList {
    rooms: HashSet<RoomId>,
}

impl AllowList {
    pub fn new(rooms: impl IntoIterator<Item = RoomId>) -> Self {
        Self {
            rooms: rooms.into_iter().collect(),
        }
    }
}

#[async_trait]
impl RoomGate for AllowList {
    async fn admit(&self, room: &RoomId) -> Result<bool> {
        Ok(self.rooms.contains(room))
    }
}
