mod op_log;

pub use op_log::*;

use anyhow::Result;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A replicated document the session keeps in sync across the room.
///
/// Updates are opaque bytes. Applying the same update twice, or two updates in either
/// order, must leave the document in the same state.
pub trait DocumentState: Send + Sync {
    /// Merges a remote update. Returns `true` if the document changed.
    fn apply_update(&mut self, update: &[u8]) -> Result<bool>;

    /// Writes `key` locally (`None` removes it) and returns the update to publish.
    fn write(&mut self, key: &str, value: Option<Value>) -> Result<Vec<u8>>;

    /// The full state, encoded as a single update.
    fn encode_state(&self) -> Vec<u8>;

    fn is_empty(&self) -> bool;
}

/// Frame body carrying a document update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateBody {
    pub update: String,
}

impl UpdateBody {
    pub fn encode(update: &[u8]) -> Self {
        Self {
            update: BASE64.encode(update),
        }
    }

    pub fn decode(&self) -> Result<Vec<u8>> {
        Ok(BASE64.decode(&self.update)?)
    }
}
