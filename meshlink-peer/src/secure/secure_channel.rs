use crate::error::CryptoError;
use crate::secure::{KeyPair, SymmetricKey, WrappedKey, decode_public_key, unwrap_key, wrap_key};
use meshlink_core::PeerId;
use tracing::{debug, info};

/// What the link has to do after a `PUBLIC_KEY` arrives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyAction {
    /// We are the answering side of the key exchange; wait for the wrapped key.
    Wait,
    /// Send `SET_KEY_SECURE` with this payload. The first time this happens the
    /// channel becomes established.
    SendWrappedKey {
        wrapped: WrappedKey,
        newly_established: bool,
    },
}

/// Key agreement for one pair of peers.
///
/// The lower peer id generates the pair key and wraps it for the other side. The key
/// never changes for the lifetime of the channel.
pub struct SecureChannel {
    local: PeerId,
    remote: PeerId,
    key_pair: KeyPair,
    key: Option<SymmetricKey>,
    established: bool,
}

impl SecureChannel {
    pub fn new(local: PeerId, remote: PeerId) -> Self {
        Self {
            local,
            remote,
            key_pair: KeyPair::generate(),
            key: None,
            established: false,
        }
    }

    pub fn is_originator(&self) -> bool {
        self.local < self.remote
    }

    pub fn is_established(&self) -> bool {
        self.established
    }

    pub fn public_key_b64(&self) -> String {
        self.key_pair.public_b64()
    }

    /// The pair key, once established.
    pub fn key(&self) -> Option<&SymmetricKey> {
        if self.established {
            self.key.as_ref()
        } else {
            None
        }
    }

    pub fn on_public_key(&mut self, key_b64: &str) -> Result<KeyAction, CryptoError> {
        let remote_public = decode_public_key(key_b64)?;
        if !self.is_originator() {
            debug!("Public key from {}, waiting for wrapped key", self.remote);
            return Ok(KeyAction::Wait);
        }

        let key = self.key.get_or_insert_with(SymmetricKey::generate);
        let wrapped = wrap_key(key, &remote_public)?;

        let newly_established = !self.established;
        if newly_established {
            info!("Secure channel with {} established (originator)", self.remote);
        }
        self.established = true;

        Ok(KeyAction::SendWrappedKey {
            wrapped,
            newly_established,
        })
    }

    /// Returns `true` when this call established the channel. Replays are ignored.
    pub fn on_wrapped_key(&mut self, wrapped: &WrappedKey) -> Result<bool, CryptoError> {
        if self.is_originator() {
            return Err(CryptoError::UnexpectedWrappedKey);
        }
        if self.established {
            debug!("Duplicate wrapped key from {} dropped", self.remote);
            return Ok(false);
        }

        self.key = Some(unwrap_key(wrapped, &self.key_pair)?);
        self.established = true;
        info!("Secure channel with {} established", self.remote);
        Ok(true)
    }
}
