use async_trait::async_trait;
use meshlink_core::{PeerId, ServerSignal};

/// Delivery side of the relay: whatever owns the client connections implements this
/// so the relay can push events to a specific session.
#[async_trait]
pub trait SignalingOutput: Send + Sync {
    /// Fire-and-forget delivery; an unknown or closed session is logged and skipped.
    async fn deliver(&self, peer_id: PeerId, signal: ServerSignal);
}
