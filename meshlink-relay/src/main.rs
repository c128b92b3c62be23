use anyhow::{Context, Result};
use clap::Parser;
use meshlink_relay::{AppState, RelayConfig, SignalingService, router};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = RelayConfig::parse();
    info!("Initializing signaling relay...");

    let signaling = SignalingService::new(config.ice_servers());
    let state = AppState::new(signaling, config.promote_host);
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind))?;
    info!("Signaling relay listening on ws://{}/ws", config.bind);

    axum::serve(listener, app).await.context("Relay server failed")?;
    Ok(())
}
