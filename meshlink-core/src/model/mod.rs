mod peer;
mod room;
mod signaling;

pub use peer::PeerId;
pub use room::{Role, RoomId};
pub use signaling::{ClientSignal, DEFAULT_STUN_ADDR, IceServerConfig, ServerSignal};
