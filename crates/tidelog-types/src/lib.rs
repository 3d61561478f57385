//! Shared types for tidelog.
//!
//! This crate defines the value types every other tidelog crate builds on:
//! the content address ([`Cid`]), the per-writer Lamport clock
//! ([`LamportClock`]), and the [`canonical`] JSON encoder used wherever
//! bytes must be identical across replicas.

pub mod canonical;
mod clock;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub use clock::LamportClock;

// ---------------------------------------------------------------------------
// Content address
// ---------------------------------------------------------------------------

/// Content address of a stored block: `blake3(block_bytes)`.
///
/// Serialized as a lowercase hex string so that it can live inside JSON
/// records. Ordering is byte-wise and serves as the last-resort tie-break
/// between distinct entries.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub struct Cid([u8; 32]);

impl Cid {
    /// Create an address by hashing arbitrary data with BLAKE3.
    pub fn from_data(data: &[u8]) -> Self {
        Self(blake3::hash(data).into())
    }

    /// Return the raw 32-byte representation.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl From<[u8; 32]> for Cid {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Cid {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Cid({self})")
    }
}

/// Error returned when parsing a [`Cid`] from a string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseCidError {
    /// The input is not valid hex.
    #[error("invalid hex in content address: {0}")]
    Hex(String),

    /// The decoded input is not 32 bytes long.
    #[error("content address must be 32 bytes, got {0}")]
    Length(usize),
}

impl FromStr for Cid {
    type Err = ParseCidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|e| ParseCidError::Hex(e.to_string()))?;
        let len = bytes.len();
        let array: [u8; 32] = bytes.try_into().map_err(|_| ParseCidError::Length(len))?;
        Ok(Self(array))
    }
}

impl Serialize for Cid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Cid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
