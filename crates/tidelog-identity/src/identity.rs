//! Identity value types.

use serde::{Deserialize, Serialize};

/// Key type tag written into every descriptor.
pub const ED25519_TYPE: &str = "ed25519";

/// The two cross-signatures binding an identity key to a signing key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdentitySignatures {
    /// Signature over `id`, made with the signing key.
    pub id: String,
    /// Signature over `public_key ++ signatures.id`, made with the identity key.
    #[serde(rename = "publicKey")]
    pub public_key: String,
}

/// Serializable, public-only description of an identity.
///
/// This is what gets embedded in every signed entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdentityDescriptor {
    /// Hex public key of the identity key.
    pub id: String,
    /// Hex public key of the signing key.
    #[serde(rename = "publicKey")]
    pub public_key: String,
    /// Cross-signatures.
    pub signatures: IdentitySignatures,
    /// Key type tag.
    #[serde(rename = "type")]
    pub kind: String,
}

/// A writer identity.
///
/// Holds public material only; private keys live in the provider's
/// keystore, looked up by [`Identity::public_key`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity {
    descriptor: IdentityDescriptor,
}

impl Identity {
    /// Wrap a descriptor, e.g. one read back from an entry.
    pub fn from_descriptor(descriptor: IdentityDescriptor) -> Self {
        Self { descriptor }
    }

    /// Hex public key of the identity key.
    pub fn id(&self) -> &str {
        &self.descriptor.id
    }

    /// Hex public key of the signing key. Used as the clock id of entries
    /// this identity writes.
    pub fn public_key(&self) -> &str {
        &self.descriptor.public_key
    }

    /// The cross-signatures.
    pub fn signatures(&self) -> &IdentitySignatures {
        &self.descriptor.signatures
    }

    /// Key type tag.
    pub fn kind(&self) -> &str {
        &self.descriptor.kind
    }

    /// Serializable form of this identity.
    pub fn descriptor(&self) -> IdentityDescriptor {
        self.descriptor.clone()
    }
}

impl From<IdentityDescriptor> for Identity {
    fn from(descriptor: IdentityDescriptor) -> Self {
        Self::from_descriptor(descriptor)
    }
}
