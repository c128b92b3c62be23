use meshlink_core::{PeerId, Role};
use serde::{Deserialize, Serialize};

/// Who re-broadcasts frames received from other peers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ForwardPolicy {
    /// Only the room host forwards.
    #[default]
    HostOnly,
    /// Every peer forwards. Relies on duplicate suppression to terminate.
    Mesh,
}

impl ForwardPolicy {
    pub fn forwards(self, role: Option<Role>) -> bool {
        match self {
            ForwardPolicy::HostOnly => role == Some(Role::Host),
            ForwardPolicy::Mesh => true,
        }
    }
}

/// Links a frame that arrived over `arrived_from` should be re-sent to.
///
/// Never the arrival link, never the origin.
pub fn forward_targets(
    policy: ForwardPolicy,
    role: Option<Role>,
    arrived_from: PeerId,
    origin: PeerId,
    peers: impl IntoIterator<Item = PeerId>,
) -> Vec<PeerId> {
    if !policy.forwards(role) {
        return Vec::new();
    }

    peers
        .into_iter()
        .filter(|peer| *peer != arrived_from && *peer != origin)
        .collect()
}
