use meshlink_core::{PeerId, Role};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    #[default]
    Online,
    Away,
    Busy,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Cursor {
    pub x: f64,
    pub y: f64,
}

/// What a participant advertises about themselves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresenceState {
    pub name: String,
    pub role: Option<Role>,
    pub color: String,
    pub cursor: Option<Cursor>,
    pub status: PresenceStatus,
}

impl PresenceState {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            color: color_for(&name),
            name,
            role: None,
            cursor: None,
            status: PresenceStatus::default(),
        }
    }

    /// A new name without an explicit colour also picks the name's colour.
    pub fn apply(&mut self, patch: PresencePatch) {
        if let Some(name) = patch.name {
            if patch.color.is_none() {
                self.color = color_for(&name);
            }
            self.name = name;
        }
        if let Some(color) = patch.color {
            self.color = color;
        }
        if let Some(cursor) = patch.cursor {
            self.cursor = cursor;
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
    }
}

/// Partial update of the local presence. `None` fields are left as they are.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PresencePatch {
    pub name: Option<String>,
    pub color: Option<String>,
    pub cursor: Option<Option<Cursor>>,
    pub status: Option<PresenceStatus>,
}

/// Deterministic HSL colour for a display name.
pub fn color_for(name: &str) -> String {
    let mut hash: i32 = 0;
    for unit in name.encode_utf16() {
        hash = i32::from(unit).wrapping_add(hash.wrapping_shl(5).wrapping_sub(hash));
    }
    let hue = i64::from(hash).abs() % 360;
    format!("hsl({hue}, 70%, 55%)")
}

/// Last known presence of every remote participant, keyed by origin peer.
#[derive(Debug, Default)]
pub struct PresenceTable {
    entries: HashMap<PeerId, PresenceState>,
}

impl PresenceTable {
    pub fn upsert(&mut self, peer_id: PeerId, state: PresenceState) {
        self.entries.insert(peer_id, state);
    }

    pub fn remove(&mut self, peer_id: &PeerId) -> Option<PresenceState> {
        self.entries.remove(peer_id)
    }

    pub fn get(&self, peer_id: &PeerId) -> Option<&PresenceState> {
        self.entries.get(peer_id)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn snapshot(&self) -> Vec<(PeerId, PresenceState)> {
        let mut entries: Vec<_> = self
            .entries
            .iter()
            .map(|(peer, state)| (*peer, state.clone()))
            .collect();
        entries.sort_by_key(|(peer, _)| *peer);
        entries
    }
}
