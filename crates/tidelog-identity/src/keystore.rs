//! In-memory store of ed25519 private keys.

use std::collections::HashMap;
use std::sync::RwLock;

use ed25519_dalek::SigningKey;
use tracing::debug;

use crate::error::IdentityError;

/// Private keys indexed by their hex public key.
#[derive(Default)]
pub struct Keystore {
    keys: RwLock<HashMap<String, SigningKey>>,
}

impl Keystore {
    /// Create an empty keystore.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a key and return its hex public key.
    pub fn insert(&self, key: SigningKey) -> String {
        let public_key = hex::encode(key.verifying_key().as_bytes());
        debug!(%public_key, "added key to keystore");
        self.keys
            .write()
            .expect("lock poisoned")
            .insert(public_key.clone(), key);
        public_key
    }

    /// Look up the private key for a hex public key.
    pub fn get(&self, public_key: &str) -> Result<SigningKey, IdentityError> {
        self.keys
            .read()
            .expect("lock poisoned")
            .get(public_key)
            .cloned()
            .ok_or_else(|| IdentityError::KeyNotFound(public_key.to_string()))
    }

    /// Whether a private key is held for `public_key`.
    pub fn contains(&self, public_key: &str) -> bool {
        self.keys.read().expect("lock poisoned").contains_key(public_key)
    }

    /// Number of keys held.
    pub fn len(&self) -> usize {
        self.keys.read().expect("lock poisoned").len()
    }

    /// Whether the keystore holds no keys.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
