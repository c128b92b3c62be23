pub mod bus;
pub mod config;
pub mod document;
pub mod error;
pub mod forward;
pub mod link;
pub mod presence;
pub mod secure;
pub mod session;
pub mod signaling;
pub mod transport;

pub use config::SessionConfig;
pub use error::{CryptoError, SessionError};
pub use session::*;
