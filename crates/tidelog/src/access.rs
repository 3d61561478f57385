//! Write permission checks for appended and merged entries.

use std::collections::HashSet;

use tidelog_identity::{Identity, IdentityProvider};
use tracing::debug;

use crate::entry::Entry;
use crate::error::LogError;

/// Key that grants write access to everyone in a [`KeyListAccess`].
pub const ANY_KEY: &str = "*";

/// Decides whether an entry may enter a log.
#[async_trait::async_trait]
pub trait AccessController: Send + Sync {
    /// Return `true` if `entry` may be appended or merged.
    async fn can_append(&self, entry: &Entry, provider: &dyn IdentityProvider) -> Result<bool, LogError>;
}

/// Allows every entry.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

#[async_trait::async_trait]
impl AccessController for AllowAll {
    async fn can_append(&self, _entry: &Entry, _provider: &dyn IdentityProvider) -> Result<bool, LogError> {
        Ok(true)
    }
}

/// Allows entries whose signer is on a fixed list of keys.
///
/// A key matches either the entry's signing key or its identity id. When
/// the entry carries an identity, the identity's cross-signatures must also
/// verify and its signing key must be the one that signed the entry.
#[derive(Debug, Clone, Default)]
pub struct KeyListAccess {
    keys: HashSet<String>,
}

impl KeyListAccess {
    /// Allow the given hex keys.
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether `key` is on the list (or the list contains [`ANY_KEY`]).
    pub fn allows(&self, key: &str) -> bool {
        self.keys.contains(ANY_KEY) || self.keys.contains(key)
    }
}

#[async_trait::async_trait]
impl AccessController for KeyListAccess {
    async fn can_append(&self, entry: &Entry, provider: &dyn IdentityProvider) -> Result<bool, LogError> {
        let Some(key) = &entry.key else {
            return Ok(false);
        };

        let listed = match &entry.identity {
            Some(descriptor) => self.allows(key) || self.allows(&descriptor.id),
            None => self.allows(key),
        };
        if !listed {
            debug!(hash = %entry.hash, %key, "key not in access list");
            return Ok(false);
        }

        match &entry.identity {
            Some(descriptor) if descriptor.public_key != *key => Ok(false),
            Some(descriptor) => {
                let identity = Identity::from_descriptor(descriptor.clone());
                Ok(provider.verify_identity(&identity).await?)
            }
            None => Ok(true),
        }
    }
}
