//! Signing and verification through an identity provider.

use std::sync::Arc;

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use tracing::debug;

use crate::error::IdentityError;
use crate::identity::{ED25519_TYPE, Identity, IdentityDescriptor, IdentitySignatures};
use crate::keystore::Keystore;

/// Signature version tags a provider must accept.
pub const SIGNATURE_VERSIONS: [&str; 2] = ["v0", "v1"];

const SIGNING_KEY_CONTEXT: &str = "tidelog 2024 identity signing key";

/// Signs on behalf of identities and checks signatures and identities.
#[async_trait::async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Sign `data` with the signing key of `identity`. Returns a hex signature.
    async fn sign(&self, identity: &Identity, data: &[u8]) -> Result<String, IdentityError>;

    /// Check a hex signature over `data` by the hex `public_key`.
    ///
    /// A well-formed but wrong signature is `Ok(false)`.
    async fn verify(
        &self,
        signature: &str,
        public_key: &str,
        data: &[u8],
        version: &str,
    ) -> Result<bool, IdentityError>;

    /// Check the cross-signatures binding an identity's two keys.
    async fn verify_identity(&self, identity: &Identity) -> Result<bool, IdentityError>;
}

/// Ed25519 identity provider with an in-memory keystore.
#[derive(Clone, Default)]
pub struct Ed25519Provider {
    keystore: Arc<Keystore>,
}

impl Ed25519Provider {
    /// Create a provider with an empty keystore.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a provider over an existing keystore.
    pub fn with_keystore(keystore: Arc<Keystore>) -> Self {
        Self { keystore }
    }

    /// The keystore holding this provider's private keys.
    pub fn keystore(&self) -> &Arc<Keystore> {
        &self.keystore
    }

    /// Create a new identity from freshly generated keys.
    pub fn create_identity(&self) -> Result<Identity, IdentityError> {
        let id_key = SigningKey::generate(&mut OsRng);
        let signing_key = SigningKey::generate(&mut OsRng);
        self.bind(id_key, signing_key)
    }

    /// Create an identity deterministically from a 32-byte seed.
    ///
    /// The same seed always yields the same identity.
    pub fn create_identity_from_seed(&self, seed: [u8; 32]) -> Result<Identity, IdentityError> {
        let id_key = SigningKey::from_bytes(&seed);
        let signing_key = SigningKey::from_bytes(&blake3::derive_key(SIGNING_KEY_CONTEXT, &seed));
        self.bind(id_key, signing_key)
    }

    fn bind(&self, id_key: SigningKey, signing_key: SigningKey) -> Result<Identity, IdentityError> {
        let id = hex::encode(id_key.verifying_key().as_bytes());
        let public_key = hex::encode(signing_key.verifying_key().as_bytes());

        let id_signature = hex::encode(signing_key.sign(id.as_bytes()).to_bytes());
        let key_signature =
            hex::encode(id_key.sign(format!("{public_key}{id_signature}").as_bytes()).to_bytes());

        self.keystore.insert(id_key);
        self.keystore.insert(signing_key);
        debug!(%id, %public_key, "created identity");

        Ok(Identity::from_descriptor(IdentityDescriptor {
            id,
            public_key,
            signatures: IdentitySignatures {
                id: id_signature,
                public_key: key_signature,
            },
            kind: ED25519_TYPE.to_string(),
        }))
    }
}

fn parse_public_key(public_key: &str) -> Result<VerifyingKey, IdentityError> {
    let bytes = hex::decode(public_key).map_err(|e| IdentityError::InvalidKey(e.to_string()))?;
    let array: [u8; 32] = bytes
        .try_into()
        .map_err(|_| IdentityError::InvalidKey(format!("expected 32 bytes: {public_key}")))?;
    VerifyingKey::from_bytes(&array).map_err(|e| IdentityError::InvalidKey(e.to_string()))
}

fn check(key: &VerifyingKey, signature: &str, data: &[u8]) -> bool {
    let Ok(bytes) = hex::decode(signature) else {
        return false;
    };
    let Ok(array) = <[u8; 64]>::try_from(bytes.as_slice()) else {
        return false;
    };
    key.verify(data, &Signature::from_bytes(&array)).is_ok()
}

#[async_trait::async_trait]
impl IdentityProvider for Ed25519Provider {
    async fn sign(&self, identity: &Identity, data: &[u8]) -> Result<String, IdentityError> {
        let key = self.keystore.get(identity.public_key())?;
        Ok(hex::encode(key.sign(data).to_bytes()))
    }

    async fn verify(
        &self,
        signature: &str,
        public_key: &str,
        data: &[u8],
        version: &str,
    ) -> Result<bool, IdentityError> {
        if !SIGNATURE_VERSIONS.contains(&version) {
            return Err(IdentityError::InvalidSignature(format!(
                "unsupported signature version: {version}"
            )));
        }
        let key = parse_public_key(public_key)?;
        Ok(check(&key, signature, data))
    }

    async fn verify_identity(&self, identity: &Identity) -> Result<bool, IdentityError> {
        if identity.kind() != ED25519_TYPE {
            return Ok(false);
        }
        let id_key = parse_public_key(identity.id())?;
        let signing_key = parse_public_key(identity.public_key())?;
        let signatures = identity.signatures();

        let binds_id = check(&signing_key, &signatures.id, identity.id().as_bytes());
        let binds_key = check(
            &id_key,
            &signatures.public_key,
            format!("{}{}", identity.public_key(), signatures.id).as_bytes(),
        );
        Ok(binds_id && binds_key)
    }
}
