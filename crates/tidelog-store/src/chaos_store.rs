//! An [`ObjectStore`] wrapper that injects latency and write failures.
//!
//! ```ignore
//! let chaos = ChaosStore::new(inner)
//!     .read_latency(1, 10) // 1-10 ms per read
//!     .seed(42);
//! chaos.fail_writes(true);
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tidelog_types::Cid;

use crate::error::StoreError;
use crate::traits::ObjectStore;

/// Store wrapper for tests: random read/write latency from a seeded RNG,
/// and a switch that makes every `put` fail.
pub struct ChaosStore {
    inner: Arc<dyn ObjectStore>,
    read_latency_ms: (u64, u64),
    write_latency_ms: (u64, u64),
    fail_writes: AtomicBool,
    rng: Mutex<StdRng>,
}

impl ChaosStore {
    /// Wrap an existing store as a pass-through.
    pub fn new(inner: Arc<dyn ObjectStore>) -> Self {
        Self {
            inner,
            read_latency_ms: (0, 0),
            write_latency_ms: (0, 0),
            fail_writes: AtomicBool::new(false),
            rng: Mutex::new(StdRng::seed_from_u64(0)),
        }
    }

    /// Set the read latency range in milliseconds (uniform random).
    pub fn read_latency(mut self, min_ms: u64, max_ms: u64) -> Self {
        self.read_latency_ms = (min_ms, max_ms);
        self
    }

    /// Set the write latency range in milliseconds (uniform random).
    pub fn write_latency(mut self, min_ms: u64, max_ms: u64) -> Self {
        self.write_latency_ms = (min_ms, max_ms);
        self
    }

    /// Set the RNG seed.
    pub fn seed(self, seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            ..self
        }
    }

    /// Make subsequent writes fail (or succeed again).
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    async fn delay(&self, range: (u64, u64)) {
        let (min, max) = range;
        if max == 0 {
            return;
        }

        let ms = if min >= max {
            min
        } else {
            self.rng.lock().expect("lock poisoned").gen_range(min..=max)
        };

        if ms > 0 {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
    }
}

#[async_trait::async_trait]
impl ObjectStore for ChaosStore {
    async fn put(&self, id: Cid, data: Bytes) -> Result<(), StoreError> {
        self.delay(self.write_latency_ms).await;
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Io(std::io::Error::other("injected write failure")));
        }
        self.inner.put(id, data).await
    }

    async fn get(&self, id: Cid) -> Result<Option<Bytes>, StoreError> {
        self.delay(self.read_latency_ms).await;
        self.inner.get(id).await
    }

    async fn contains(&self, id: Cid) -> Result<bool, StoreError> {
        self.delay(self.read_latency_ms).await;
        self.inner.contains(id).await
    }

    async fn list(&self) -> Result<Vec<Cid>, StoreError> {
        self.inner.list().await
    }

    async fn verify(&self, id: Cid) -> Result<bool, StoreError> {
        self.delay(self.read_latency_ms).await;
        self.inner.verify(id).await
    }
}
