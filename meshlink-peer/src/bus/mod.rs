mod envelope;
mod message_bus;

pub use envelope::*;
pub use message_bus::*;
