//! Content-addressed block storage for tidelog.
//!
//! This crate defines the [`ObjectStore`] trait the log writes entries
//! through, the [`Format`] tags that select a block's record encoding, and
//! two concrete backends:
//!
//! - [`MemoryStore`]: in-memory storage backed by a `RwLock<HashMap>`.
//! - [`FileStore`]: file-based storage with a 2-level fan-out directory layout.
//!
//! [`ChaosStore`] wraps either backend with injected latency and write
//! failures for tests.

mod chaos_store;
pub mod codec;
mod error;
mod file_store;
mod memory_store;
mod traits;

pub use chaos_store::ChaosStore;
pub use codec::{Block, Format};
pub use error::StoreError;
pub use file_store::FileStore;
pub use memory_store::MemoryStore;
pub use traits::ObjectStore;
