use meshlink_core::{PeerId, Role, RoomId};
use std::time::SystemTime;

#[derive(Debug, Clone)]
pub struct Member {
    pub peer_id: PeerId,
    pub role: Role,
    pub joined_at: SystemTime,
}

/// Members of one room, kept in join order.
#[derive(Debug)]
pub struct Room {
    pub id: RoomId,
    members: Vec<Member>,
}

impl Room {
    pub(crate) fn new(id: RoomId) -> Self {
        Self {
            id,
            members: Vec::new(),
        }
    }

    pub fn members(&self) -> &[Member] {
        &self.members
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, peer_id: &PeerId) -> bool {
        self.members.iter().any(|m| &m.peer_id == peer_id)
    }

    pub fn member(&self, peer_id: &PeerId) -> Option<&Member> {
        self.members.iter().find(|m| &m.peer_id == peer_id)
    }

    pub fn host(&self) -> Option<&Member> {
        self.members.iter().find(|m| m.role == Role::Host)
    }

    pub fn peer_ids(&self) -> Vec<PeerId> {
        self.members.iter().map(|m| m.peer_id).collect()
    }

    /// Adds a member; the first entrant of an empty room becomes the host.
    pub(crate) fn admit(&mut self, peer_id: PeerId) -> Role {
        let role = if self.members.is_empty() {
            Role::Host
        } else {
            Role::Peer
        };

        self.members.push(Member {
            peer_id,
            role,
            joined_at: SystemTime::now(),
        });

        role
    }

    pub(crate) fn remove(&mut self, peer_id: &PeerId) -> Option<Member> {
        let index = self.members.iter().position(|m| &m.peer_id == peer_id)?;
        Some(self.members.remove(index))
    }

    /// Hands the host role to the earliest remaining member if nobody holds it.
    pub(crate) fn promote_earliest(&mut self) -> Option<PeerId> {
        if self.host().is_some() {
            return None;
        }

        let next = self.members.first_mut()?;
        next.role = Role::Host;
        Some(next.peer_id)
    }
}
