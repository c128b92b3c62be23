use anyhow::Result;
use async_trait::async_trait;
use meshlink_core::ClientSignal;

/// Outbound half of the relay connection.
#[async_trait]
pub trait SignalingSink: Send + Sync {
    async fn send(&self, signal: ClientSignal) -> Result<()>;
}
