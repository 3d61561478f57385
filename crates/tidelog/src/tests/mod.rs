//! Tests for the log crate.

mod access_tests;
mod config_tests;
mod traversal_tests;

use std::sync::Arc;

use serde_json::json;
use tidelog_identity::{Ed25519Provider, Identity, IdentityProvider};
use tidelog_store::{MemoryStore, ObjectStore};
use tidelog_types::{Cid, LamportClock};

use crate::entry::{Entry, EntryVersion};
use crate::log::{Log, LogOptions};

/// Install a test-writer subscriber once; `RUST_LOG` controls the level.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A store and an identity provider shared by every log in a test, the way
/// replicas share a content-addressed network.
struct TestEnv {
    store: Arc<dyn ObjectStore>,
    provider: Arc<Ed25519Provider>,
}

impl TestEnv {
    fn new() -> Self {
        Self::with_store(Arc::new(MemoryStore::new()))
    }

    fn with_store(store: Arc<dyn ObjectStore>) -> Self {
        init_tracing();
        Self {
            store,
            provider: Arc::new(Ed25519Provider::new()),
        }
    }

    fn provider(&self) -> Arc<dyn IdentityProvider> {
        self.provider.clone()
    }

    /// Deterministic identity from a seed byte.
    fn identity(&self, seed: u8) -> Identity {
        self.provider.create_identity_from_seed([seed; 32]).unwrap()
    }

    /// Empty log with the given id.
    fn log(&self, identity: &Identity, id: &str) -> Log {
        self.log_with(identity, LogOptions::new().with_id(id))
    }

    fn log_with(&self, identity: &Identity, options: LogOptions) -> Log {
        Log::new(self.store.clone(), self.provider(), identity.clone(), options).unwrap()
    }

    /// A second, independent instance holding the same entries as `log`.
    fn replica(&self, log: &Log, identity: &Identity) -> Log {
        let snapshot = log.to_snapshot();
        self.log_with(
            identity,
            LogOptions::new()
                .with_id(snapshot.id)
                .with_entries(snapshot.values)
                .with_heads(snapshot.heads),
        )
    }
}

/// Append each payload in turn with a single back-reference.
async fn append_all(log: &mut Log, payloads: &[&str]) -> Vec<Entry> {
    let mut out = Vec::new();
    for payload in payloads {
        out.push(log.append(json!(payload), 1).await.unwrap());
    }
    out
}

/// An unsigned entry with a synthetic address, for pure ordering tests.
fn fake_entry(seed: u8, writer: &str, time: u64) -> Entry {
    Entry {
        hash: Cid::from([seed; 32]),
        id: "A".into(),
        payload: json!(seed),
        next: Vec::new(),
        v: EntryVersion::V1,
        clock: LamportClock::with_time(writer, time),
        key: None,
        identity: None,
        sig: None,
    }
}

/// A copy of `entry` with a different payload and a recomputed address, so
/// its signature no longer matches.
fn tampered(entry: &Entry, payload: &str) -> Entry {
    let mut forged = entry.clone();
    forged.payload = json!(payload);
    forged.hash = forged.address().unwrap();
    forged
}

/// Sorted addresses, for order-insensitive comparisons.
fn sorted_hashes<'a>(entries: impl IntoIterator<Item = &'a Entry>) -> Vec<Cid> {
    let mut hashes: Vec<Cid> = entries.into_iter().map(|e| e.hash).collect();
    hashes.sort();
    hashes
}
