use serde::{Deserialize, Serialize};
use std::fmt;

/// Negotiation state of one link.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LinkState {
    #[default]
    New,
    HaveLocalOffer,
    HaveRemoteOffer,
    Stable,
    /// The transport reported a failure. Only a `peer-left` clears it.
    Failed,
    Closed,
}

impl LinkState {
    pub fn is_stable(self) -> bool {
        self == LinkState::Stable
    }
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LinkState::New => "new",
            LinkState::HaveLocalOffer => "have-local-offer",
            LinkState::HaveRemoteOffer => "have-remote-offer",
            LinkState::Stable => "stable",
            LinkState::Failed => "failed",
            LinkState::Closed => "closed",
        };
        f.write_str(name)
    }
}
