use meshlink_core::IceServerConfig;

/// WebRTC settings
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Used when the relay hands out no ICE servers of its own.
    pub ice_servers: Vec<IceServerConfig>,
    pub data_channel_label: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            ice_servers: vec![IceServerConfig::default_stun()],
            data_channel_label: "chat".to_owned(),
        }
    }
}
