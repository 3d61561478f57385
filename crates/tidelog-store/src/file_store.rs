//! File-based block storage backend.
//!
//! Stores one file per block with a 2-level fan-out directory structure:
//! `{base_dir}/{hex[0..2]}/{hex[2..4]}/{hex}`.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use tidelog_types::Cid;
use tracing::{debug, error};

use crate::error::StoreError;
use crate::traits::ObjectStore;

/// File-based block store with 2-level fan-out directory layout.
///
/// Writes go to a temporary file first and are renamed into place, so a
/// reader never observes a half-written block.
pub struct FileStore {
    base_dir: PathBuf,
}

impl FileStore {
    /// Create a new file store rooted at the given directory.
    ///
    /// The directory is created if it does not exist.
    pub fn new(base_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let base_dir = base_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&base_dir)?;
        Ok(Self { base_dir })
    }

    /// Root directory of this store.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn block_path(&self, id: &Cid) -> PathBuf {
        let hex = id.to_string();
        self.base_dir.join(&hex[0..2]).join(&hex[2..4]).join(&hex)
    }
}

#[async_trait::async_trait]
impl ObjectStore for FileStore {
    async fn put(&self, id: Cid, data: Bytes) -> Result<(), StoreError> {
        let path = self.block_path(&id);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp_path = path.with_extension("tmp");
        tokio::fs::write(&tmp_path, &data).await?;
        tokio::fs::rename(&tmp_path, &path).await?;

        debug!(%id, path = %path.display(), size = data.len(), "stored block to file");
        Ok(())
    }

    async fn get(&self, id: Cid) -> Result<Option<Bytes>, StoreError> {
        let path = self.block_path(&id);
        match tokio::fs::read(&path).await {
            Ok(data) => {
                // A block whose bytes no longer hash to its address is never returned.
                let actual = Cid::from_data(&data);
                if actual != id {
                    error!(expected = %id, %actual, "block corruption detected on read");
                    return Err(StoreError::CorruptBlock { expected: id, actual });
                }
                Ok(Some(Bytes::from(data)))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    async fn contains(&self, id: Cid) -> Result<bool, StoreError> {
        let path = self.block_path(&id);
        match tokio::fs::metadata(&path).await {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    async fn list(&self) -> Result<Vec<Cid>, StoreError> {
        let mut ids = Vec::new();

        // base/XX/YY/<hex>
        let mut level0 = tokio::fs::read_dir(&self.base_dir).await?;
        while let Some(d0) = level0.next_entry().await? {
            if !d0.file_type().await?.is_dir() {
                continue;
            }
            let mut level1 = tokio::fs::read_dir(d0.path()).await?;
            while let Some(d1) = level1.next_entry().await? {
                if !d1.file_type().await?.is_dir() {
                    continue;
                }
                let mut files = tokio::fs::read_dir(d1.path()).await?;
                while let Some(entry) = files.next_entry().await? {
                    if !entry.file_type().await?.is_file() {
                        continue;
                    }
                    if let Some(name) = entry.file_name().to_str()
                        && let Ok(id) = name.parse::<Cid>()
                    {
                        ids.push(id);
                    }
                }
            }
        }
        Ok(ids)
    }

    async fn verify(&self, id: Cid) -> Result<bool, StoreError> {
        let path = self.block_path(&id);
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Cid::from_data(&data) == id),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StoreError::NotFound(id)),
            Err(e) => Err(StoreError::Io(e)),
        }
    }
}
