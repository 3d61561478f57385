//! Error types for block storage operations.

use tidelog_types::Cid;

/// Errors that can occur during block storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested block was not found.
    #[error("block not found: {0}")]
    NotFound(Cid),

    /// An I/O error occurred.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A block or record could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(String),

    /// The store has reached its capacity limit.
    #[error("store capacity exceeded: need {needed} bytes, only {available} available")]
    CapacityExceeded {
        /// Bytes needed for the operation.
        needed: u64,
        /// Bytes currently available.
        available: u64,
    },

    /// Block data does not match its content address.
    #[error("block corruption detected: expected {expected}, actual hash {actual}")]
    CorruptBlock {
        /// The address that was requested.
        expected: Cid,
        /// The address computed from the data actually stored.
        actual: Cid,
    },
}

impl From<postcard::Error> for StoreError {
    fn from(e: postcard::Error) -> Self {
        Self::Codec(e.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        Self::Codec(e.to_string())
    }
}

impl From<tidelog_types::canonical::CanonicalError> for StoreError {
    fn from(e: tidelog_types::canonical::CanonicalError) -> Self {
        Self::Codec(e.to_string())
    }
}
