//! API credential generation and validation for service accounts

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use uuid::Uuid;

/// A freshly generated key/secret pair. The secret is shown to the caller once.
#[derive(Debug, Clone, Copy)]
pub struct ApiCredentials {
    pub api_key: Uuid,
    pub api_secret: Uuid,
}

impl ApiCredentials {
    /// Generate a new pair of random (v4) UUIDs
    pub fn generate() -> Self {
        Self {
            api_key: Uuid::new_v4(),
            api_secret: Uuid::new_v4(),
        }
    }

    /// Parse presented credentials; either half malformed means no match
    pub fn parse(api_key: &str, api_secret: &str) -> Option<Self> {
        let api_key = Uuid::parse_str(api_key.trim()).ok()?;
        let api_secret = Uuid::parse_str(api_secret.trim()).ok()?;
        Some(Self {
            api_key,
            api_secret,
        })
    }
}

/// Hash an API secret for storage using SHA-256
pub fn hash_secret(secret: &Uuid) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

/// Compare a presented secret with a stored digest in constant time
pub fn verify_secret(secret: &Uuid, stored_hash: &str) -> bool {
    let presented = hash_secret(secret);
    presented.as_bytes().ct_eq(stored_hash.as_bytes()).into()
}
