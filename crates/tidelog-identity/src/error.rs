//! Error types for identity and signing operations.

/// Errors that can occur while creating identities or signing.
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    /// No private key is held for the given public key.
    #[error("signing key not found: {0}")]
    KeyNotFound(String),

    /// A public or private key could not be decoded.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// A signature could not be produced or has an unusable shape.
    #[error("invalid signature: {0}")]
    InvalidSignature(String),
}
