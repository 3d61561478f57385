//! Error types for the log crate.

use tidelog_identity::IdentityError;
use tidelog_store::StoreError;
use tidelog_types::Cid;
use tidelog_types::canonical::CanonicalError;
use tokio::task::JoinError;

/// Errors that can occur during log operations.
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    /// A caller-supplied argument was rejected before any I/O.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// An entry's signature did not verify.
    #[error("invalid signature on entry {hash}")]
    SignatureInvalid {
        /// Address of the offending entry.
        hash: Cid,
    },

    /// The object store has no block at this address.
    #[error("object not found: {0}")]
    ObjectNotFound(Cid),

    /// Any other object store failure.
    #[error("object store error: {0}")]
    ObjectStore(StoreError),

    /// Two logs with different ids were joined.
    #[error("log id mismatch: expected {expected}, found {found}")]
    LogIdMismatch {
        /// Id of the receiving log.
        expected: String,
        /// Id of the log being joined.
        found: String,
    },

    /// A record does not have the shape of an entry.
    #[error("malformed entry: {0}")]
    MalformedEntry(String),

    /// The access controller refused the entry.
    #[error("access denied for key {key}")]
    AccessDenied {
        /// Signing key of the refused entry.
        key: String,
    },

    /// Signing or key lookup failed.
    #[error("identity error: {0}")]
    Identity(#[from] IdentityError),

    /// The next clock time would not fit in a `u64`.
    #[error("clock time {time} cannot be advanced")]
    ClockOverflow {
        /// Latest time known to the log.
        time: u64,
    },

    /// A verification or fetch task was cancelled before it finished.
    #[error("task cancelled: {0}")]
    TaskCancelled(String),

    /// Configuration could not be read or parsed.
    #[error("config error: {0}")]
    Config(String),
}

impl From<StoreError> for LogError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(cid) => Self::ObjectNotFound(cid),
            other => Self::ObjectStore(other),
        }
    }
}

/// Map a failed task to an error, re-raising its panic on this thread.
pub(crate) fn task_failed(e: JoinError) -> LogError {
    if e.is_panic() {
        std::panic::resume_unwind(e.into_panic());
    }
    LogError::TaskCancelled(e.to_string())
}

impl From<serde_json::Error> for LogError {
    fn from(e: serde_json::Error) -> Self {
        Self::MalformedEntry(e.to_string())
    }
}

impl From<CanonicalError> for LogError {
    fn from(e: CanonicalError) -> Self {
        Self::MalformedEntry(e.to_string())
    }
}
