pub use meshlink_core::model::{PeerId, Role, RoomId};

pub mod model {
    pub use meshlink_core::model::*;
}

#[cfg(feature = "relay")]
pub mod relay {
    pub use meshlink_relay::*;
}

#[cfg(feature = "peer")]
pub mod peer {
    pub use meshlink_peer::*;
}
