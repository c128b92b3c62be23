use meshlink_core::RoomId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("invalid key encoding: {0}")]
    InvalidEncoding(String),

    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    #[error("encryption failed")]
    Encrypt,

    #[error("decryption failed")]
    Decrypt,

    #[error("key derivation failed")]
    KeyDerivation,

    #[error("wrapped key received by the originating side")]
    UnexpectedWrappedKey,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("room '{0}' is not available")]
    RoomUnavailable(RoomId),

    #[error("session is closed")]
    Closed,

    #[error("room check failed: {0}")]
    Gate(String),

    #[error("signaling failed: {0}")]
    Signaling(String),
}
