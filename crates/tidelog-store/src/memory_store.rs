//! In-memory block storage backend.

use std::collections::HashMap;
use std::sync::RwLock;

use bytes::Bytes;
use tidelog_types::Cid;
use tracing::debug;

use crate::error::StoreError;
use crate::traits::ObjectStore;

/// In-memory block store backed by a `RwLock<HashMap>`.
///
/// The default store for logs that do not need to survive the process.
/// Optionally tracks total bytes stored against a maximum.
#[derive(Default)]
pub struct MemoryStore {
    blocks: RwLock<HashMap<Cid, Bytes>>,
    max_bytes: Option<u64>,
}

impl MemoryStore {
    /// Create an unbounded in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an in-memory store that refuses writes past `max_bytes`.
    pub fn with_max_bytes(max_bytes: u64) -> Self {
        Self {
            blocks: RwLock::new(HashMap::new()),
            max_bytes: Some(max_bytes),
        }
    }

    /// Total bytes currently held.
    pub fn used_bytes(&self) -> u64 {
        let map = self.blocks.read().expect("lock poisoned");
        Self::used_bytes_unlocked(&map)
    }

    /// Replace a block's bytes without re-addressing it (for corruption tests).
    #[cfg(test)]
    pub(crate) fn overwrite(&self, id: Cid, data: Bytes) {
        let mut map = self.blocks.write().expect("lock poisoned");
        map.insert(id, data);
    }

    fn used_bytes_unlocked(map: &HashMap<Cid, Bytes>) -> u64 {
        map.values().map(|v| v.len() as u64).sum()
    }
}

#[async_trait::async_trait]
impl ObjectStore for MemoryStore {
    async fn put(&self, id: Cid, data: Bytes) -> Result<(), StoreError> {
        let mut map = self.blocks.write().expect("lock poisoned");
        if map.contains_key(&id) {
            return Ok(());
        }

        if let Some(max_bytes) = self.max_bytes {
            let used = Self::used_bytes_unlocked(&map);
            let needed = data.len() as u64;
            if used + needed > max_bytes {
                return Err(StoreError::CapacityExceeded {
                    needed,
                    available: max_bytes.saturating_sub(used),
                });
            }
        }

        debug!(%id, size = data.len(), "storing block in memory");
        map.insert(id, data);
        Ok(())
    }

    async fn get(&self, id: Cid) -> Result<Option<Bytes>, StoreError> {
        let map = self.blocks.read().expect("lock poisoned");
        Ok(map.get(&id).cloned())
    }

    async fn contains(&self, id: Cid) -> Result<bool, StoreError> {
        let map = self.blocks.read().expect("lock poisoned");
        Ok(map.contains_key(&id))
    }

    async fn list(&self) -> Result<Vec<Cid>, StoreError> {
        let map = self.blocks.read().expect("lock poisoned");
        Ok(map.keys().copied().collect())
    }

    async fn verify(&self, id: Cid) -> Result<bool, StoreError> {
        let map = self.blocks.read().expect("lock poisoned");
        match map.get(&id) {
            Some(data) => Ok(Cid::from_data(data) == id),
            None => Err(StoreError::NotFound(id)),
        }
    }
}
