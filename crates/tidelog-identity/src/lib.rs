//! Writer identities for tidelog.
//!
//! An [`Identity`] pairs a long-lived identity key with the signing key that
//! actually signs log entries; the two keys cross-sign each other so a
//! verifier can check the binding. [`IdentityProvider`] is the seam the log
//! signs and verifies through, and [`Ed25519Provider`] is the bundled
//! implementation backed by an in-memory [`Keystore`].

mod error;
mod identity;
mod keystore;
mod provider;

pub use error::IdentityError;
pub use identity::{Identity, IdentityDescriptor, IdentitySignatures};
pub use keystore::Keystore;
pub use provider::{Ed25519Provider, IdentityProvider, SIGNATURE_VERSIONS};
