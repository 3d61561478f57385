//! Loading entries from the store by walking `next` links.

use std::sync::Arc;

use serde_json::json;
use tidelog_store::{ChaosStore, MemoryStore, ObjectStore};
use tidelog_types::Cid;

use super::{TestEnv, append_all, tampered};
use crate::config::LogConfig;
use crate::entry::Entry;
use crate::error::LogError;
use crate::traversal::{self, SignaturePolicy, TraversalOptions};

fn hashes(entries: &[Entry]) -> Vec<Cid> {
    entries.iter().map(|e| e.hash).collect()
}

#[tokio::test]
async fn test_load_everything_reachable() {
    let env = TestEnv::new();
    let mut log = env.log(&env.identity(1), "A");
    let entries = append_all(&mut log, &["one", "two", "three", "four"]).await;

    let loaded = traversal::load_from_hashes(
        env.store.clone(),
        env.provider(),
        [entries[3].hash],
        &TraversalOptions::default(),
    )
    .await
    .unwrap();

    assert_eq!(hashes(&loaded), entries.iter().rev().map(|e| e.hash).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_load_respects_length() {
    let env = TestEnv::new();
    let mut log = env.log(&env.identity(1), "A");
    let entries = append_all(&mut log, &["one", "two", "three", "four"]).await;

    let loaded = traversal::load_from_hashes(
        env.store.clone(),
        env.provider(),
        [entries[3].hash],
        &TraversalOptions::default().with_length(2),
    )
    .await
    .unwrap();

    assert_eq!(hashes(&loaded), vec![entries[3].hash, entries[2].hash]);
}

#[tokio::test]
async fn test_load_skips_excluded() {
    let env = TestEnv::new();
    let mut log = env.log(&env.identity(1), "A");
    let entries = append_all(&mut log, &["one", "two", "three", "four"]).await;

    let loaded = traversal::load_from_hashes(
        env.store.clone(),
        env.provider(),
        [entries[3].hash],
        &TraversalOptions::default().with_exclude([entries[1].hash]),
    )
    .await
    .unwrap();

    // Excluding an entry also cuts off everything only reachable through it.
    assert_eq!(hashes(&loaded), vec![entries[3].hash, entries[2].hash]);
}

#[tokio::test]
async fn test_load_deduplicates_shared_ancestors() {
    let env = TestEnv::new();
    let mut log1 = env.log(&env.identity(1), "A");
    let mut log2 = env.log(&env.identity(2), "A");
    let root = log1.append(json!("root"), 1).await.unwrap();
    log2.join(&log1, None).await.unwrap();
    let left = log1.append(json!("left"), 1).await.unwrap();
    let right = log2.append(json!("right"), 1).await.unwrap();

    let loaded = traversal::load_from_hashes(
        env.store.clone(),
        env.provider(),
        [left.hash, right.hash, left.hash],
        &TraversalOptions::default(),
    )
    .await
    .unwrap();

    assert_eq!(hashes(&loaded), vec![left.hash, right.hash, root.hash]);
}

#[tokio::test]
async fn test_load_missing_head() {
    let env = TestEnv::new();
    let missing = Cid::from_data(b"absent");
    let result = traversal::load_from_hashes(
        env.store.clone(),
        env.provider(),
        [missing],
        &TraversalOptions::default(),
    )
    .await;
    assert!(matches!(result, Err(LogError::ObjectNotFound(cid)) if cid == missing));
}

#[tokio::test]
async fn test_load_missing_ancestor() {
    let source = TestEnv::new();
    let mut log = source.log(&source.identity(1), "A");
    let entries = append_all(&mut log, &["one", "two"]).await;

    // Copy only the newest block into a second store.
    let partial: Arc<dyn ObjectStore> = Arc::new(MemoryStore::new());
    let block = source.store.get(entries[1].hash).await.unwrap().unwrap();
    partial.put(entries[1].hash, block).await.unwrap();

    let result = traversal::load_from_hashes(
        partial,
        source.provider(),
        [entries[1].hash],
        &TraversalOptions::default(),
    )
    .await;
    assert!(matches!(result, Err(LogError::ObjectNotFound(cid)) if cid == entries[0].hash));
}

/// A chain whose middle entry has been re-signed over a different payload.
async fn forged_chain(env: &TestEnv) -> (Entry, Entry, Entry) {
    let mut log = env.log(&env.identity(1), "A");
    let root = log.append(json!("root"), 1).await.unwrap();
    let genuine = log.append(json!("middle"), 1).await.unwrap();

    let forged = tampered(&genuine, "forged");
    Entry::to_cid(env.store.as_ref(), &forged).await.unwrap();

    let identity = env.identity(1);
    let top = Entry::create(
        env.store.as_ref(),
        env.provider.as_ref(),
        &identity,
        "A",
        json!("top"),
        vec![forged.hash],
        Some(tidelog_types::LamportClock::with_time(identity.public_key(), 3)),
    )
    .await
    .unwrap();
    (root, forged, top)
}

#[tokio::test]
async fn test_enforce_rejects_invalid_signature() {
    let env = TestEnv::new();
    let (_, forged, top) = forged_chain(&env).await;

    let result = traversal::load_from_hashes(
        env.store.clone(),
        env.provider(),
        [top.hash],
        &TraversalOptions::default(),
    )
    .await;
    assert!(matches!(result, Err(LogError::SignatureInvalid { hash }) if hash == forged.hash));
}

#[tokio::test]
async fn test_tolerate_drops_invalid_entry() {
    let env = TestEnv::new();
    let (root, forged, top) = forged_chain(&env).await;

    let loaded = traversal::load_from_hashes(
        env.store.clone(),
        env.provider(),
        [top.hash],
        &TraversalOptions::default().with_signatures(SignaturePolicy::Tolerate),
    )
    .await
    .unwrap();

    // The forged entry is dropped and its links are not followed.
    assert_eq!(hashes(&loaded), vec![top.hash]);
    assert!(!loaded.iter().any(|e| e.hash == forged.hash || e.hash == root.hash));
}

#[tokio::test]
async fn test_load_from_entries_counts_seeds() {
    let env = TestEnv::new();
    let mut log = env.log(&env.identity(1), "A");
    let entries = append_all(&mut log, &["one", "two", "three", "four"]).await;

    let loaded = traversal::load_from_entries(
        env.store.clone(),
        env.provider(),
        vec![entries[3].clone(), entries[2].clone()],
        &TraversalOptions::default().with_length(3),
    )
    .await
    .unwrap();
    assert_eq!(
        hashes(&loaded),
        vec![entries[3].hash, entries[2].hash, entries[1].hash]
    );

    let seeds_only = traversal::load_from_entries(
        env.store.clone(),
        env.provider(),
        vec![entries[3].clone(), entries[2].clone()],
        &TraversalOptions::default().with_length(1),
    )
    .await
    .unwrap();
    assert_eq!(hashes(&seeds_only), vec![entries[3].hash]);
}

#[tokio::test]
async fn test_load_from_entries_checks_seed_signatures() {
    let env = TestEnv::new();
    let mut log = env.log(&env.identity(1), "A");
    let entry = log.append(json!("one"), 1).await.unwrap();
    let forged = tampered(&entry, "forged");

    let result = traversal::load_from_entries(
        env.store.clone(),
        env.provider(),
        vec![forged.clone()],
        &TraversalOptions::default(),
    )
    .await;
    assert!(matches!(result, Err(LogError::SignatureInvalid { hash }) if hash == forged.hash));
}

#[tokio::test]
async fn test_order_independent_of_latency_and_concurrency() {
    let inner: Arc<dyn ObjectStore> = Arc::new(MemoryStore::new());
    let env = TestEnv::with_store(inner.clone());

    // Three writers with interleaved joins give a wide frontier.
    let mut logs = vec![
        env.log(&env.identity(1), "A"),
        env.log(&env.identity(2), "A"),
        env.log(&env.identity(3), "A"),
    ];
    for round in 0..4 {
        for log in logs.iter_mut() {
            log.append(json!(format!("round{round}")), 2).await.unwrap();
        }
        let snapshot = env.replica(&logs[0], &env.identity(9));
        for log in logs.iter_mut().skip(1) {
            log.join(&snapshot, None).await.unwrap();
        }
    }
    let heads: Vec<Cid> = logs.iter().flat_map(|log| log.heads()).map(|e| e.hash).collect();

    let chaos: Arc<dyn ObjectStore> =
        Arc::new(ChaosStore::new(inner.clone()).read_latency(0, 5).seed(11));
    let serial = traversal::load_from_hashes(
        chaos.clone(),
        env.provider(),
        heads.clone(),
        &TraversalOptions {
            concurrency: 1,
            ..TraversalOptions::default()
        },
    )
    .await
    .unwrap();
    let parallel = traversal::load_from_hashes(
        chaos,
        env.provider(),
        heads.clone(),
        &TraversalOptions::default(),
    )
    .await
    .unwrap();
    let direct = traversal::load_from_hashes(
        inner,
        env.provider(),
        heads,
        &TraversalOptions {
            concurrency: 3,
            ..TraversalOptions::default()
        },
    )
    .await
    .unwrap();

    assert_eq!(serial.len(), 12);
    assert_eq!(hashes(&serial), hashes(&parallel));
    assert_eq!(hashes(&serial), hashes(&direct));
}

#[test]
fn test_options_from_config() {
    let config = LogConfig::from_toml(
        r#"
        [traversal]
        length = 10
        concurrency = 0
        signatures = "tolerate"
        "#,
    )
    .unwrap();
    let options = TraversalOptions::from_config(&config);

    assert_eq!(options.length, Some(10));
    assert_eq!(options.concurrency, 1);
    assert_eq!(options.signatures, SignaturePolicy::Tolerate);
    assert!(options.exclude.is_empty());

    let defaults = TraversalOptions::from_config(&LogConfig::default());
    assert_eq!(defaults.length, None);
    assert_eq!(defaults.concurrency, crate::traversal::DEFAULT_CONCURRENCY);
    assert_eq!(defaults.signatures, SignaturePolicy::Enforce);
}
