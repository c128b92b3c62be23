mod cipher;
mod key_wrap;
mod secure_channel;

pub use cipher::*;
pub use key_wrap::*;
pub use secure_channel::*;
