use crate::secure::WrappedKey;
use meshlink_core::PeerId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MessageKind {
    Chat,
    Control,
    Presence,
    DocUpdate,
}

/// What travels over a data channel.
///
/// `payload` is a [`ControlAction`] for control envelopes and a sealed [`AppFrame`]
/// for everything else.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub payload: Value,
    pub ts: u64,
}

impl Envelope {
    pub fn new(kind: MessageKind, payload: Value) -> Self {
        Self {
            kind,
            payload,
            ts: now_millis(),
        }
    }
}

/// Key agreement messages. These are the only payloads sent in the clear.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlAction {
    PublicKey { key: String },
    SetKeySecure { key: WrappedKey },
}

/// Plaintext of every encrypted envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppFrame {
    pub id: Uuid,
    pub origin: PeerId,
    pub body: Value,
}

impl AppFrame {
    pub fn new(origin: PeerId, body: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            origin,
            body,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub text: String,
    pub sender: String,
    pub timestamp: u64,
}

pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
