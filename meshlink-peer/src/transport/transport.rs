use crate::transport::TransportEvent;
use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use meshlink_core::{IceServerConfig, PeerId};
use tokio::sync::mpsc;

/// One direct connection to one remote peer.
///
/// Descriptions and candidates are opaque strings carried through the relay.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Creates the local offer and installs it as the local description.
    async fn create_offer(&self) -> Result<String>;

    /// Discards a local offer that has not been answered.
    async fn rollback(&self) -> Result<()>;

    async fn set_remote_offer(&self, sdp: String) -> Result<()>;

    /// Creates the local answer to the installed remote offer.
    async fn create_answer(&self) -> Result<String>;

    async fn set_remote_answer(&self, sdp: String) -> Result<()>;

    async fn add_ice_candidate(&self, candidate: String) -> Result<()>;

    async fn send(&self, data: Bytes) -> Result<()>;

    async fn is_open(&self) -> bool;

    async fn close(&self) -> Result<()>;
}

#[async_trait]
pub trait TransportFactory: Send + Sync {
    /// Builds the transport from `local` to `remote`. Everything it observes is pushed
    /// into `events`.
    async fn create(
        &self,
        local: PeerId,
        remote: PeerId,
        ice_servers: &[IceServerConfig],
        events: mpsc::Sender<TransportEvent>,
    ) -> Result<Box<dyn Transport>>;
}
