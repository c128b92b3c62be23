use clap::Parser;
use meshlink_core::{DEFAULT_STUN_ADDR, IceServerConfig};
use std::net::SocketAddr;

/// Runtime configuration of the signaling relay.
#[derive(Debug, Clone, Parser)]
#[command(name = "meshlink-relay", about = "Signaling relay for meshlink rooms")]
pub struct RelayConfig {
    /// Address the websocket endpoint listens on.
    #[arg(long, env = "MESHLINK_BIND", default_value = "0.0.0.0:3000")]
    pub bind: SocketAddr,

    /// STUN/TURN urls handed to peers in the welcome message.
    #[arg(
        long = "ice-url",
        env = "MESHLINK_ICE_URLS",
        value_delimiter = ',',
        default_value = DEFAULT_STUN_ADDR
    )]
    pub ice_urls: Vec<String>,

    #[arg(long, env = "MESHLINK_TURN_USERNAME")]
    pub turn_username: Option<String>,

    #[arg(long, env = "MESHLINK_TURN_CREDENTIAL")]
    pub turn_credential: Option<String>,

    /// Promote the earliest remaining member when the host leaves.
    #[arg(
        long,
        env = "MESHLINK_PROMOTE_HOST",
        default_value_t = true,
        action = clap::ArgAction::Set
    )]
    pub promote_host: bool,
}

impl RelayConfig {
    pub fn ice_servers(&self) -> Vec<IceServerConfig> {
        if self.ice_urls.is_empty() {
            return Vec::new();
        }

        vec![IceServerConfig {
            urls: self.ice_urls.clone(),
            username: self.turn_username.clone(),
            credential: self.turn_credential.clone(),
        }]
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 3000)),
            ice_urls: vec![DEFAULT_STUN_ADDR.to_owned()],
            turn_username: None,
            turn_credential: None,
            promote_host: true,
        }
    }
}
