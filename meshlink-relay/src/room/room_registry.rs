use crate::room::Room;
use meshlink_core::{PeerId, Role, RoomId};
use std::collections::HashMap;
use tracing::{debug, info};

/// Result of admitting a session into a room.
#[derive(Debug, PartialEq)]
pub struct JoinOutcome {
    pub role: Role,
    /// Members present before the joiner, in join order.
    pub existing: Vec<PeerId>,
    /// Set when the session was moved out of another room first.
    pub previous: Option<LeaveOutcome>,
    /// The session was already a member of this room; nobody needs notifying.
    pub already_member: bool,
}

#[derive(Debug, PartialEq)]
pub struct LeaveOutcome {
    pub room_id: RoomId,
    pub remaining: Vec<PeerId>,
    pub promoted: Option<PeerId>,
}

/// Room membership table: room id to members, plus the reverse session index.
///
/// A session belongs to at most one room at a time.
#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: HashMap<RoomId, Room>,
    sessions: HashMap<PeerId, RoomId>,
    promote_host: bool,
}

impl RoomRegistry {
    pub fn new(promote_host: bool) -> Self {
        Self {
            rooms: HashMap::new(),
            sessions: HashMap::new(),
            promote_host,
        }
    }

    pub fn join(&mut self, room_id: RoomId, peer_id: PeerId) -> JoinOutcome {
        let mut previous = None;

        if let Some(current) = self.sessions.get(&peer_id) {
            if current == &room_id {
                let room = &self.rooms[&room_id];
                let role = room.member(&peer_id).map(|m| m.role).unwrap_or_default();
                let existing = room
                    .peer_ids()
                    .into_iter()
                    .filter(|id| id != &peer_id)
                    .collect();

                return JoinOutcome {
                    role,
                    existing,
                    previous: None,
                    already_member: true,
                };
            }

            previous = self.leave(&peer_id);
        }

        let room = self.rooms.entry(room_id.clone()).or_insert_with(|| {
            info!("Creating room '{}'", room_id);
            Room::new(room_id.clone())
        });

        let existing = room.peer_ids();
        let role = room.admit(peer_id);
        self.sessions.insert(peer_id, room_id.clone());

        info!("Peer {} joined room '{}' as {}", peer_id, room_id, role);

        JoinOutcome {
            role,
            existing,
            previous,
            already_member: false,
        }
    }

    /// Removes the session from whichever room it is in.
    pub fn leave(&mut self, peer_id: &PeerId) -> Option<LeaveOutcome> {
        let room_id = self.sessions.remove(peer_id)?;
        let room = self.rooms.get_mut(&room_id)?;

        let departed = room.remove(peer_id);
        debug!("Peer {} left room '{}': {:?}", peer_id, room_id, departed);

        if room.is_empty() {
            info!("Room '{}' is empty, removing it", room_id);
            self.rooms.remove(&room_id);
            return Some(LeaveOutcome {
                room_id,
                remaining: Vec::new(),
                promoted: None,
            });
        }

        let promoted = if self.promote_host {
            room.promote_earliest()
        } else {
            None
        };
        if let Some(host) = promoted {
            info!("Peer {} promoted to host of '{}'", host, room_id);
        }

        Some(LeaveOutcome {
            remaining: room.peer_ids(),
            room_id,
            promoted,
        })
    }

    pub fn room_of(&self, peer_id: &PeerId) -> Option<&RoomId> {
        self.sessions.get(peer_id)
    }

    pub fn room(&self, room_id: &RoomId) -> Option<&Room> {
        self.rooms.get(room_id)
    }

    pub fn is_member(&self, room_id: &RoomId, peer_id: &PeerId) -> bool {
        self.sessions.get(peer_id) == Some(room_id)
    }

    pub fn members(&self, room_id: &RoomId) -> Vec<PeerId> {
        self.rooms
            .get(room_id)
            .map(Room::peer_ids)
            .unwrap_or_default()
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}
