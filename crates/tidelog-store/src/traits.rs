//! Core trait for content-addressed block storage.

use bytes::Bytes;
use serde_json::Value;
use tidelog_types::Cid;
use tracing::debug;

use crate::codec::{self, Format};
use crate::error::StoreError;

/// Trait for storing and retrieving immutable, content-addressed blocks.
///
/// Blocks are never deleted or rewritten: a given [`Cid`] always maps to the
/// same bytes. All implementations must be `Send + Sync` so a store can be
/// shared by concurrent fetch tasks behind an `Arc`.
#[async_trait::async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store a block under the given address.
    async fn put(&self, id: Cid, data: Bytes) -> Result<(), StoreError>;

    /// Retrieve a block by address. Returns `None` if not found.
    async fn get(&self, id: Cid) -> Result<Option<Bytes>, StoreError>;

    /// Check whether a block exists.
    async fn contains(&self, id: Cid) -> Result<bool, StoreError>;

    /// List all stored block addresses.
    async fn list(&self) -> Result<Vec<Cid>, StoreError>;

    /// Verify block integrity by re-hashing and comparing to the address.
    async fn verify(&self, id: Cid) -> Result<bool, StoreError>;

    /// Encode a JSON record, store it, and return its address.
    ///
    /// Fields named in `links` must hold hex addresses (or arrays of them).
    async fn write(&self, format: Format, record: &Value, links: &[&str]) -> Result<Cid, StoreError> {
        let bytes = codec::encode_record(format, record, links)?;
        let id = Cid::from_data(&bytes);
        if !self.contains(id).await? {
            self.put(id, Bytes::from(bytes)).await?;
        }
        debug!(%id, ?format, "wrote record");
        Ok(id)
    }

    /// Fetch and decode a record written by [`ObjectStore::write`].
    async fn read(&self, id: Cid, links: &[&str]) -> Result<(Format, Value), StoreError> {
        let bytes = self.get(id).await?.ok_or(StoreError::NotFound(id))?;
        codec::decode_record(&bytes, links)
    }
}
