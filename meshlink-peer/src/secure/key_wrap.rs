use crate::error::CryptoError;
use crate::secure::cipher::{KEY_LEN, SymmetricKey, decode_b64};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use hkdf::Hkdf;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use x25519_dalek::{EphemeralSecret, PublicKey, StaticSecret};

const WRAP_INFO: &[u8] = b"meshlink-key-wrap-v1";

/// Per-link X25519 key pair. Lives as long as the link's secure channel.
pub struct KeyPair {
    secret: StaticSecret,
    public: PublicKey,
}

impl KeyPair {
    pub fn generate() -> Self {
        let secret = StaticSecret::random_from_rng(OsRng);
        let public = PublicKey::from(&secret);
        Self { secret, public }
    }

    pub fn public_key(&self) -> PublicKey {
        self.public
    }

    pub fn public_b64(&self) -> String {
        BASE64.encode(self.public.as_bytes())
    }
}

pub fn decode_public_key(value: &str) -> Result<PublicKey, CryptoError> {
    let raw = decode_b64(value)?;
    let raw: [u8; 32] = raw
        .as_slice()
        .try_into()
        .map_err(|_| CryptoError::InvalidKeyLength {
            expected: 32,
            actual: raw.len(),
        })?;
    Ok(PublicKey::from(raw))
}

/// Symmetric key sealed for one recipient: ephemeral X25519, HKDF-SHA256, AES-256-GCM.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WrappedKey {
    pub epk: String,
    pub iv: String,
    pub cipher: String,
}

pub fn wrap_key(key: &SymmetricKey, recipient: &PublicKey) -> Result<WrappedKey, CryptoError> {
    let ephemeral_secret = EphemeralSecret::random_from_rng(OsRng);
    let ephemeral_public = PublicKey::from(&ephemeral_secret);
    let shared = ephemeral_secret.diffie_hellman(recipient);

    let wrapping_key = derive_wrapping_key(shared.as_bytes(), recipient)?;
    let (nonce, ciphertext) = wrapping_key.encrypt(key.as_bytes())?;

    Ok(WrappedKey {
        epk: BASE64.encode(ephemeral_public.as_bytes()),
        iv: BASE64.encode(nonce),
        cipher: BASE64.encode(ciphertext),
    })
}

pub fn unwrap_key(wrapped: &WrappedKey, pair: &KeyPair) -> Result<SymmetricKey, CryptoError> {
    let ephemeral_public = decode_public_key(&wrapped.epk)?;
    let shared = pair.secret.diffie_hellman(&ephemeral_public);

    let wrapping_key = derive_wrapping_key(shared.as_bytes(), &pair.public)?;
    let nonce = decode_b64(&wrapped.iv)?;
    let ciphertext = decode_b64(&wrapped.cipher)?;
    let raw = wrapping_key.decrypt(&nonce, &ciphertext)?;
    SymmetricKey::from_slice(&raw)
}

fn derive_wrapping_key(shared: &[u8], recipient: &PublicKey) -> Result<SymmetricKey, CryptoError> {
    let hk = Hkdf::<Sha256>::new(Some(recipient.as_bytes()), shared);
    let mut okm = [0u8; KEY_LEN];
    hk.expand(WRAP_INFO, &mut okm)
        .map_err(|_| CryptoError::KeyDerivation)?;
    Ok(SymmetricKey::from_bytes(okm))
}
