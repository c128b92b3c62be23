use crate::forward::ForwardPolicy;
use meshlink_core::IceServerConfig;
use std::time::Duration;

/// Tunables for one participant session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Name advertised through presence.
    pub display_name: String,
    /// Used when the relay's welcome carries no ICE servers.
    pub ice_servers: Vec<IceServerConfig>,
    pub forward_policy: ForwardPolicy,
    /// Interval between `PUBLIC_KEY` re-sends while a pair is not yet established.
    pub handshake_retry_interval: Duration,
    /// Total `PUBLIC_KEY` sends per link, including the first one.
    pub handshake_max_attempts: u32,
    /// Application frames queued per link before its secure channel is up.
    pub outbox_limit: usize,
    /// Frame ids remembered for duplicate suppression.
    pub seen_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            display_name: "anonymous".to_owned(),
            ice_servers: vec![IceServerConfig::default_stun()],
            forward_policy: ForwardPolicy::default(),
            handshake_retry_interval: Duration::from_secs(3),
            handshake_max_attempts: 5,
            outbox_limit: 256,
            seen_capacity: 4096,
        }
    }
}
