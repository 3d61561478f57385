//! TOML configuration for logs.
//!
//! Every section and field is optional; missing values fall back to the
//! defaults below.
//!
//! ```toml
//! [log]
//! id = "events"
//! max_length = 1000
//! pointer_count = 16
//!
//! [traversal]
//! concurrency = 32
//! signatures = "tolerate"
//!
//! [join]
//! concurrency = 8
//! ```

use std::path::Path;

use serde::Deserialize;

use crate::error::LogError;
use crate::traversal::{DEFAULT_CONCURRENCY, SignaturePolicy};

/// Top-level configuration, parsed from TOML.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log identity and append/join tuning.
    pub log: LogSection,
    /// Loading logs from the store.
    pub traversal: TraversalSection,
    /// Merging logs.
    pub join: JoinSection,
}

/// `[log]` section.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LogSection {
    /// Log identifier. A timestamp is used when omitted.
    pub id: Option<String>,
    /// Entries kept by `Log::join_default`. Unbounded when omitted.
    pub max_length: Option<usize>,
    /// Pointer count used by `Log::append_default`.
    pub pointer_count: usize,
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            id: None,
            max_length: None,
            pointer_count: 1,
        }
    }
}

/// `[traversal]` section.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct TraversalSection {
    /// Maximum entries loaded. Unbounded when omitted.
    pub length: Option<usize>,
    /// Concurrent block fetches.
    pub concurrency: usize,
    /// `"enforce"` (default) or `"tolerate"`.
    pub signatures: SignaturePolicy,
}

impl Default for TraversalSection {
    fn default() -> Self {
        Self {
            length: None,
            concurrency: DEFAULT_CONCURRENCY,
            signatures: SignaturePolicy::Enforce,
        }
    }
}

/// `[join]` section.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct JoinSection {
    /// Foreign entries verified at once.
    pub concurrency: usize,
}

impl Default for JoinSection {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

impl LogConfig {
    /// Load config from a TOML file.
    pub fn load(path: &Path) -> Result<Self, LogError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| LogError::Config(format!("failed to read {}: {e}", path.display())))?;
        Self::from_toml(&contents)
    }

    /// Parse config from a TOML string.
    pub fn from_toml(contents: &str) -> Result<Self, LogError> {
        toml::from_str(contents).map_err(|e| LogError::Config(e.to_string()))
    }
}
