mod memory;
mod transport;
mod transport_config;
mod transport_event;
mod webrtc_transport;

pub use memory::*;
pub use transport::*;
pub use transport_config::*;
pub use transport_event::*;
pub use webrtc_transport::*;
