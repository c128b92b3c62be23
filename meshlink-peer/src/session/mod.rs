mod room_gate;
mod session;
mod session_command;
mod session_handle;
mod session_output;

pub use room_gate::*;
pub use session::*;
pub use session_command::*;
pub use session_handle::*;
pub use session_output::*;
