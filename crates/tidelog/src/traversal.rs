//! Reconstruction of a log subgraph by walking `next` links from the store.
//!
//! The walk is breadth-first. Each frontier layer is fetched concurrently on
//! tokio tasks, `concurrency` at a time; results are consumed in frontier
//! order so the output is deterministic. Only the visited set and the next
//! frontier are updated between fetches.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Deserialize;
use tidelog_identity::IdentityProvider;
use tidelog_store::ObjectStore;
use tidelog_types::Cid;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::config::LogConfig;
use crate::entry::{self, Entry};
use crate::error::{self, LogError};

type Result<T> = std::result::Result<T, LogError>;

/// Default number of concurrent block fetches.
pub const DEFAULT_CONCURRENCY: usize = 16;

/// What to do with entries whose signature does not verify.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignaturePolicy {
    /// Abort the load with [`LogError::SignatureInvalid`].
    #[default]
    Enforce,
    /// Drop the entry, log a warning, and do not follow its links.
    Tolerate,
}

/// Bounds and filters for a traversal.
#[derive(Debug, Clone)]
pub struct TraversalOptions {
    /// Maximum number of entries to return. `None` loads everything reachable.
    pub length: Option<usize>,
    /// Addresses never fetched or returned.
    pub exclude: HashSet<Cid>,
    /// Number of blocks fetched at once.
    pub concurrency: usize,
    /// Handling of invalid signatures.
    pub signatures: SignaturePolicy,
}

impl Default for TraversalOptions {
    fn default() -> Self {
        Self {
            length: None,
            exclude: HashSet::new(),
            concurrency: DEFAULT_CONCURRENCY,
            signatures: SignaturePolicy::Enforce,
        }
    }
}

impl TraversalOptions {
    /// Options taken from the `[traversal]` section of a config.
    pub fn from_config(config: &LogConfig) -> Self {
        Self {
            length: config.traversal.length,
            concurrency: config.traversal.concurrency.max(1),
            signatures: config.traversal.signatures,
            ..Self::default()
        }
    }

    /// Limit the number of returned entries.
    pub fn with_length(mut self, length: usize) -> Self {
        self.length = Some(length);
        self
    }

    /// Skip the given addresses.
    pub fn with_exclude(mut self, exclude: impl IntoIterator<Item = Cid>) -> Self {
        self.exclude.extend(exclude);
        self
    }

    /// Set the signature policy.
    pub fn with_signatures(mut self, signatures: SignaturePolicy) -> Self {
        self.signatures = signatures;
        self
    }

    fn is_full(&self, collected: usize) -> bool {
        self.length.is_some_and(|length| collected >= length)
    }
}

/// Load entries reachable from `heads`.
///
/// Returns entries in traversal order, without duplicates. A head or link
/// the store cannot resolve is [`LogError::ObjectNotFound`].
pub async fn load_from_hashes(
    store: Arc<dyn ObjectStore>,
    provider: Arc<dyn IdentityProvider>,
    heads: impl IntoIterator<Item = Cid>,
    options: &TraversalOptions,
) -> Result<Vec<Entry>> {
    let mut visited = options.exclude.clone();
    let frontier: Vec<Cid> = heads.into_iter().filter(|hash| visited.insert(*hash)).collect();

    walk(store, provider, Vec::new(), frontier, visited, options).await
}

/// Load entries reachable from already materialized `entries`.
///
/// The seeds themselves are verified and count toward the length bound.
pub async fn load_from_entries(
    store: Arc<dyn ObjectStore>,
    provider: Arc<dyn IdentityProvider>,
    entries: impl IntoIterator<Item = Entry>,
    options: &TraversalOptions,
) -> Result<Vec<Entry>> {
    let mut visited = options.exclude.clone();
    let mut result = Vec::new();
    let mut frontier = Vec::new();

    for seed in entries {
        if options.is_full(result.len()) {
            break;
        }
        if !visited.insert(seed.hash) {
            continue;
        }
        let valid = entry::is_valid(provider.as_ref(), &seed).await;
        if !accept(&seed, valid, options.signatures)? {
            continue;
        }
        frontier.extend(seed.next.iter().copied().filter(|hash| visited.insert(*hash)));
        result.push(seed);
    }

    walk(store, provider, result, frontier, visited, options).await
}

async fn walk(
    store: Arc<dyn ObjectStore>,
    provider: Arc<dyn IdentityProvider>,
    mut result: Vec<Entry>,
    mut frontier: Vec<Cid>,
    mut visited: HashSet<Cid>,
    options: &TraversalOptions,
) -> Result<Vec<Entry>> {
    let concurrency = options.concurrency.max(1);

    'layers: while !frontier.is_empty() && !options.is_full(result.len()) {
        debug!(layer = frontier.len(), loaded = result.len(), "traversing layer");
        let mut next_frontier = Vec::new();

        for chunk in frontier.chunks(concurrency) {
            for (entry, valid) in fetch_chunk(&store, &provider, chunk).await? {
                if !accept(&entry, valid, options.signatures)? {
                    continue;
                }
                next_frontier.extend(entry.next.iter().copied().filter(|hash| visited.insert(*hash)));
                result.push(entry);

                if options.is_full(result.len()) {
                    break 'layers;
                }
            }
        }

        frontier = next_frontier;
    }

    Ok(result)
}

/// Fetch and verify a chunk of addresses concurrently, in chunk order.
async fn fetch_chunk(
    store: &Arc<dyn ObjectStore>,
    provider: &Arc<dyn IdentityProvider>,
    chunk: &[Cid],
) -> Result<Vec<(Entry, bool)>> {
    let mut tasks = JoinSet::new();
    for (index, hash) in chunk.iter().copied().enumerate() {
        let store = store.clone();
        let provider = provider.clone();
        tasks.spawn(async move {
            let entry = Entry::from_cid(store.as_ref(), hash).await?;
            let valid = entry::is_valid(provider.as_ref(), &entry).await;
            Ok::<_, LogError>((index, entry, valid))
        });
    }

    let mut slots: Vec<Option<(Entry, bool)>> = vec![None; chunk.len()];
    while let Some(joined) = tasks.join_next().await {
        let (index, entry, valid) = joined.map_err(error::task_failed)??;
        slots[index] = Some((entry, valid));
    }

    Ok(slots.into_iter().flatten().collect())
}

fn accept(entry: &Entry, valid: bool, policy: SignaturePolicy) -> Result<bool> {
    if valid {
        return Ok(true);
    }
    match policy {
        SignaturePolicy::Enforce => Err(LogError::SignatureInvalid { hash: entry.hash }),
        SignaturePolicy::Tolerate => {
            warn!(hash = %entry.hash, "dropping entry with invalid signature");
            Ok(false)
        }
    }
}
