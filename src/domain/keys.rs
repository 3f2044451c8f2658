use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use x25519_dalek::{PublicKey, StaticSecret};

/// Base64 encoded curve25519 key pair, as used in WireGuard configurations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPair {
    pub private_key: String,
    pub public_key: String,
}

impl KeyPair {
    pub fn generate() -> Self {
        let mut private_key: [u8; 32] = rand::random();
        // RFC 7748 clamping, the form `wg genkey` emits
        private_key[0] &= 248;
        private_key[31] &= 127;
        private_key[31] |= 64;

        let secret = StaticSecret::from(private_key);
        let public = PublicKey::from(&secret);

        Self {
            private_key: STANDARD.encode(secret.to_bytes()),
            public_key: STANDARD.encode(public.as_bytes()),
        }
    }

    /// Builds the pair for an existing private key.
    pub fn from_private_key(private_key: &str) -> Option<Self> {
        let public_key = public_key_from_private_key(private_key)?;
        Some(Self {
            private_key: private_key.trim().to_string(),
            public_key,
        })
    }
}

/// Derives the base64 public key, `None` if the input is not a base64 encoded
/// 32 byte key.
pub fn public_key_from_private_key(private_key: &str) -> Option<String> {
    let raw = STANDARD.decode(private_key.trim()).ok()?;
    let bytes: [u8; 32] = raw.try_into().ok()?;

    let secret = StaticSecret::from(bytes);
    Some(STANDARD.encode(PublicKey::from(&secret).as_bytes()))
}
