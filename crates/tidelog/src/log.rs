//! The log container: an entry set with derived heads and tails.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tidelog_identity::{Identity, IdentityProvider};
use tidelog_store::{Format, ObjectStore};
use tidelog_types::{Cid, LamportClock};
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::access::{AccessController, AllowAll};
use crate::config::LogConfig;
use crate::entry::{self, Entry};
use crate::error::{self, LogError};
use crate::sort::{self, SortFn};
use crate::traversal::{self, DEFAULT_CONCURRENCY, TraversalOptions};

type Result<T> = std::result::Result<T, LogError>;

/// Record fields of a log manifest that hold entry addresses.
pub const MANIFEST_LINKS: &[&str] = &["heads"];

/// A log's id and current heads. Enough to load the log back from a store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogHeads {
    /// Log identifier.
    pub id: String,
    /// Head addresses, newest first.
    pub heads: Vec<Cid>,
}

/// Full in-memory contents of a log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSnapshot {
    /// Log identifier.
    pub id: String,
    /// Head addresses, newest first.
    pub heads: Vec<Cid>,
    /// All entries in log order.
    pub values: Vec<Entry>,
}

/// Construction parameters for a [`Log`].
#[derive(Clone)]
pub struct LogOptions {
    /// Log identifier. Defaults to the current unix time in milliseconds.
    pub log_id: Option<String>,
    /// Entries the log starts with.
    pub entries: Vec<Entry>,
    /// Explicit heads among `entries`. Derived from `entries` when omitted.
    pub heads: Option<Vec<Cid>>,
    /// Starting clock. Its time is raised to the latest head time.
    pub clock: Option<LamportClock>,
    /// Entry order. Always made total with [`sort::no_zeroes`].
    pub sort_fn: Option<SortFn>,
    /// Write permission check. Defaults to [`AllowAll`].
    pub access: Option<Arc<dyn AccessController>>,
    /// Foreign entries verified at once during a join.
    pub join_concurrency: usize,
    /// `next` references used by [`Log::append_default`].
    pub pointer_count: usize,
    /// Entries kept by [`Log::join_default`]. Unbounded when `None`.
    pub max_length: Option<usize>,
}

impl Default for LogOptions {
    fn default() -> Self {
        Self {
            log_id: None,
            entries: Vec::new(),
            heads: None,
            clock: None,
            sort_fn: None,
            access: None,
            join_concurrency: DEFAULT_CONCURRENCY,
            pointer_count: 1,
            max_length: None,
        }
    }
}

impl LogOptions {
    /// Default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Options taken from the `[log]` and `[join]` sections of a config.
    pub fn from_config(config: &LogConfig) -> Self {
        Self {
            log_id: config.log.id.clone(),
            join_concurrency: config.join.concurrency.max(1),
            pointer_count: config.log.pointer_count.max(1),
            max_length: config.log.max_length,
            ..Self::default()
        }
    }

    /// Set the log identifier.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.log_id = Some(id.into());
        self
    }

    /// Seed the log with entries.
    pub fn with_entries(mut self, entries: Vec<Entry>) -> Self {
        self.entries = entries;
        self
    }

    /// Set explicit heads.
    pub fn with_heads(mut self, heads: Vec<Cid>) -> Self {
        self.heads = Some(heads);
        self
    }

    /// Set the starting clock.
    pub fn with_clock(mut self, clock: LamportClock) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Set the entry order.
    pub fn with_sort_fn(mut self, sort_fn: SortFn) -> Self {
        self.sort_fn = Some(sort_fn);
        self
    }

    /// Set the access controller.
    pub fn with_access(mut self, access: Arc<dyn AccessController>) -> Self {
        self.access = Some(access);
        self
    }

    /// Set the default pointer count for appends.
    pub fn with_pointer_count(mut self, pointer_count: usize) -> Self {
        self.pointer_count = pointer_count;
        self
    }

    /// Set the default length bound for joins.
    pub fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = Some(max_length);
        self
    }
}

/// An append-only, signed, causally ordered log.
///
/// Entries live in an arena keyed by content address; `next` links are
/// always resolved through it. Heads and the clock are recomputed whenever
/// the entry set changes, and mutation goes through `&mut self` so that a
/// failed `append` or `join` leaves the log exactly as it was.
pub struct Log {
    id: String,
    identity: Identity,
    store: Arc<dyn ObjectStore>,
    provider: Arc<dyn IdentityProvider>,
    access: Arc<dyn AccessController>,
    sort_fn: SortFn,
    entries: HashMap<Cid, Entry>,
    heads: Vec<Cid>,
    clock: LamportClock,
    join_concurrency: usize,
    pointer_count: usize,
    max_length: Option<usize>,
}

impl Log {
    /// Create a log, optionally seeded with entries.
    pub fn new(
        store: Arc<dyn ObjectStore>,
        provider: Arc<dyn IdentityProvider>,
        identity: Identity,
        options: LogOptions,
    ) -> Result<Self> {
        let LogOptions {
            log_id,
            entries,
            heads,
            clock,
            sort_fn,
            access,
            join_concurrency,
            pointer_count,
            max_length,
        } = options;

        let id = match log_id {
            Some(id) if id.is_empty() => {
                return Err(LogError::InvalidArgument("log id must not be empty".into()));
            }
            Some(id) => id,
            None => timestamp_id(),
        };

        let sort_fn: SortFn = match sort_fn {
            Some(sort_fn) => sort_fn,
            None => Arc::new(sort::last_write_wins),
        };
        let sort_fn = sort::no_zeroes(sort_fn);
        let entries: HashMap<Cid, Entry> = entries.into_iter().map(|e| (e.hash, e)).collect();

        let heads = match heads {
            Some(heads) => {
                let mut unique = Vec::new();
                for hash in heads {
                    if !entries.contains_key(&hash) {
                        return Err(LogError::InvalidArgument(format!(
                            "head {hash} is not among the log entries"
                        )));
                    }
                    if !unique.contains(&hash) {
                        unique.push(hash);
                    }
                }
                unique
            }
            None => find_heads(entries.values()).iter().map(|e| e.hash).collect(),
        };
        let heads = sorted_desc(&sort_fn, &entries, heads);

        let head_time = max_time(&entries, &heads);
        let clock_time = clock.map_or(0, |c| c.time).max(head_time);
        let clock = LamportClock::with_time(identity.public_key(), clock_time);

        Ok(Self {
            id,
            identity,
            store,
            provider,
            access: access.unwrap_or_else(|| Arc::new(AllowAll)),
            sort_fn,
            entries,
            heads,
            clock,
            join_concurrency: join_concurrency.max(1),
            pointer_count: pointer_count.max(1),
            max_length,
        })
    }

    /// Load a log by walking back from `heads` in the store.
    ///
    /// The log id defaults to the id of the first loaded entry.
    pub async fn from_entry_hash(
        store: Arc<dyn ObjectStore>,
        provider: Arc<dyn IdentityProvider>,
        identity: Identity,
        heads: Vec<Cid>,
        options: LogOptions,
        traversal: &TraversalOptions,
    ) -> Result<Self> {
        let entries =
            traversal::load_from_hashes(store.clone(), provider.clone(), heads, traversal).await?;
        Self::from_loaded(store, provider, identity, entries, options)
    }

    /// Load a log by walking back from already materialized entries.
    pub async fn from_entry(
        store: Arc<dyn ObjectStore>,
        provider: Arc<dyn IdentityProvider>,
        identity: Identity,
        entries: Vec<Entry>,
        options: LogOptions,
        traversal: &TraversalOptions,
    ) -> Result<Self> {
        let entries =
            traversal::load_from_entries(store.clone(), provider.clone(), entries, traversal).await?;
        Self::from_loaded(store, provider, identity, entries, options)
    }

    /// Load a log from its manifest.
    pub async fn from_json(
        store: Arc<dyn ObjectStore>,
        provider: Arc<dyn IdentityProvider>,
        identity: Identity,
        manifest: &LogHeads,
        mut options: LogOptions,
        traversal: &TraversalOptions,
    ) -> Result<Self> {
        if options.log_id.is_none() {
            options.log_id = Some(manifest.id.clone());
        }
        Self::from_entry_hash(store, provider, identity, manifest.heads.clone(), options, traversal)
            .await
    }

    /// Load a log from a manifest written by [`Log::to_cid`].
    pub async fn from_cid(
        store: Arc<dyn ObjectStore>,
        provider: Arc<dyn IdentityProvider>,
        identity: Identity,
        manifest: Cid,
        options: LogOptions,
        traversal: &TraversalOptions,
    ) -> Result<Self> {
        let (_, record) = store.read(manifest, MANIFEST_LINKS).await?;
        let heads: LogHeads = serde_json::from_value(record).map_err(|e| {
            LogError::InvalidArgument(format!("{manifest} is not a log manifest: {e}"))
        })?;
        Self::from_json(store, provider, identity, &heads, options, traversal).await
    }

    fn from_loaded(
        store: Arc<dyn ObjectStore>,
        provider: Arc<dyn IdentityProvider>,
        identity: Identity,
        entries: Vec<Entry>,
        mut options: LogOptions,
    ) -> Result<Self> {
        if options.log_id.is_none() {
            options.log_id = entries.first().map(|e| e.id.clone());
        }
        options.entries = entries;
        options.heads = None;
        Self::new(store, provider, identity, options)
    }

    /// Log identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Identity used for appends.
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Frontier clock: the local writer's id at the latest known time.
    pub fn clock(&self) -> &LamportClock {
        &self.clock
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the log has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up an entry by address.
    pub fn get(&self, hash: &Cid) -> Option<&Entry> {
        self.entries.get(hash)
    }

    /// Whether the log holds the entry at `hash`.
    pub fn has(&self, hash: &Cid) -> bool {
        self.entries.contains_key(hash)
    }

    /// All entries, oldest first.
    pub fn values(&self) -> Vec<&Entry> {
        let mut values: Vec<&Entry> = self.entries.values().collect();
        values.sort_by(|a, b| (self.sort_fn)(*a, *b));
        values
    }

    /// Entries no other entry references, newest first.
    pub fn heads(&self) -> Vec<&Entry> {
        self.heads.iter().filter_map(|hash| self.entries.get(hash)).collect()
    }

    /// Roots and entries with predecessors missing from the log.
    pub fn tails(&self) -> Vec<&Entry> {
        find_tails(self.entries.values())
    }

    /// Predecessor addresses referenced but not held.
    pub fn tail_hashes(&self) -> Vec<Cid> {
        find_tail_hashes(self.entries.values())
    }

    /// Walk back from `roots` through locally held entries, newest first.
    ///
    /// Stops after `amount` entries, or once `end` has been emitted.
    pub fn traverse(&self, roots: &[Cid], amount: Option<usize>, end: Option<Cid>) -> Vec<&Entry> {
        let mut seen: HashSet<Cid> = HashSet::new();
        let mut pending: Vec<&Entry> = roots
            .iter()
            .filter(|hash| seen.insert(**hash))
            .filter_map(|hash| self.entries.get(hash))
            .collect();
        let mut out = Vec::new();

        while let Some(index) = pending
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| (self.sort_fn)(**a, **b))
            .map(|(index, _)| index)
        {
            let entry = pending.swap_remove(index);
            out.push(entry);

            if amount.is_some_and(|amount| out.len() >= amount) || end == Some(entry.hash) {
                break;
            }

            for hash in &entry.next {
                if seen.insert(*hash)
                    && let Some(parent) = self.entries.get(hash)
                {
                    pending.push(parent);
                }
            }
        }

        out
    }

    /// Append a payload as a new entry on top of all current heads.
    ///
    /// With `pointer_count > 1` the entry also links back to older entries
    /// at power-of-two distances. The log is only updated once the entry has
    /// been signed, allowed and written.
    pub async fn append(&mut self, payload: Value, pointer_count: usize) -> Result<Entry> {
        let (next, clock) = {
            let time = max_time(&self.entries, &self.heads).max(self.clock.time);
            let clock = LamportClock::with_time(self.identity.public_key(), time)
                .tick()
                .ok_or(LogError::ClockOverflow { time })?;

            let all = self.traverse(&self.heads, Some(pointer_count.max(self.heads.len())), None);
            let mut next = self.heads.clone();
            let max_distance = pointer_count.min(all.len());
            let mut distance = 1;
            while distance <= max_distance {
                next.push(all[distance - 1].hash);
                distance *= 2;
            }
            (next, clock)
        };

        let entry = Entry::build(
            self.provider.as_ref(),
            &self.identity,
            &self.id,
            payload,
            next,
            Some(clock),
        )
        .await?;

        if !self.access.can_append(&entry, self.provider.as_ref()).await? {
            return Err(LogError::AccessDenied {
                key: entry.key.clone().unwrap_or_default(),
            });
        }

        let hash = Entry::to_cid(self.store.as_ref(), &entry).await?;
        debug_assert_eq!(hash, entry.hash);

        debug!(
            %hash,
            id = %self.id,
            time = entry.clock.time,
            next = entry.next.len(),
            "appended entry"
        );

        self.clock = entry.clock.clone();
        self.heads = vec![hash];
        self.entries.insert(hash, entry.clone());
        Ok(entry)
    }

    /// [`Log::append`] with the pointer count the log was built with.
    pub async fn append_default(&mut self, payload: Value) -> Result<Entry> {
        self.append(payload, self.pointer_count).await
    }

    /// [`Log::join`] bounded by the max length the log was built with.
    pub async fn join_default(&mut self, other: &Log) -> Result<()> {
        self.join(other, self.max_length).await
    }

    /// Merge another log with the same id into this one.
    ///
    /// Foreign entries that fail access control or signature verification
    /// are skipped. With `max_length`, only the newest entries in log order
    /// are kept.
    pub async fn join(&mut self, other: &Log, max_length: Option<usize>) -> Result<()> {
        if other.id != self.id {
            return Err(LogError::LogIdMismatch {
                expected: self.id.clone(),
                found: other.id.clone(),
            });
        }

        let candidates: Vec<Entry> = other
            .entries
            .values()
            .filter(|e| !self.has(&e.hash))
            .cloned()
            .collect();
        let offered = candidates.len();
        let accepted = self.verify_foreign(candidates).await?;
        let merged = accepted.len();

        let mut entries = self.entries.clone();
        entries.extend(accepted.into_iter().map(|e| (e.hash, e)));

        if let Some(max_length) = max_length
            && entries.len() > max_length
        {
            let mut ordered: Vec<Entry> = entries.into_values().collect();
            ordered.sort_by(|a, b| (self.sort_fn)(b, a));
            ordered.truncate(max_length);
            entries = ordered.into_iter().map(|e| (e.hash, e)).collect();
        }

        let heads: Vec<Cid> = find_heads(entries.values()).iter().map(|e| e.hash).collect();
        let heads = sorted_desc(&self.sort_fn, &entries, heads);
        let time = max_time(&entries, &heads).max(self.clock.time);

        debug!(
            id = %self.id,
            offered,
            merged,
            len = entries.len(),
            heads = heads.len(),
            "joined log"
        );

        self.entries = entries;
        self.heads = heads;
        self.clock = LamportClock::with_time(self.identity.public_key(), time);
        Ok(())
    }

    async fn verify_foreign(&self, candidates: Vec<Entry>) -> Result<Vec<Entry>> {
        let mut accepted = Vec::with_capacity(candidates.len());
        let mut pending = candidates.into_iter().peekable();

        while pending.peek().is_some() {
            let mut tasks = JoinSet::new();
            for entry in pending.by_ref().take(self.join_concurrency) {
                let provider = self.provider.clone();
                let access = self.access.clone();
                let log_id = self.id.clone();
                tasks.spawn(async move {
                    let allowed = entry.id == log_id
                        && match access.can_append(&entry, provider.as_ref()).await {
                            Ok(allowed) => allowed,
                            Err(e) => {
                                debug!(hash = %entry.hash, error = %e, "access check failed");
                                false
                            }
                        };
                    let valid = allowed && entry::is_valid(provider.as_ref(), &entry).await;
                    (entry, allowed, valid)
                });
            }

            while let Some(joined) = tasks.join_next().await {
                let (entry, allowed, valid) = joined.map_err(error::task_failed)?;
                if valid {
                    accepted.push(entry);
                } else {
                    warn!(hash = %entry.hash, allowed, "rejecting entry from joined log");
                }
            }
        }

        Ok(accepted)
    }

    /// Id and heads of this log.
    pub fn to_json(&self) -> LogHeads {
        LogHeads {
            id: self.id.clone(),
            heads: self.heads.clone(),
        }
    }

    /// Id, heads and every entry of this log.
    pub fn to_snapshot(&self) -> LogSnapshot {
        LogSnapshot {
            id: self.id.clone(),
            heads: self.heads.clone(),
            values: self.values().into_iter().cloned().collect(),
        }
    }

    /// Write this log's manifest to the store and return its address.
    pub async fn to_cid(&self) -> Result<Cid> {
        let manifest = serde_json::to_value(self.to_json())?;
        Ok(self.store.write(Format::Canonical, &manifest, MANIFEST_LINKS).await?)
    }

    /// Entries reachable from `a`'s heads that `b` does not hold.
    ///
    /// The walk continues through entries `b` already has: a partially
    /// loaded `b` can hold a newer entry while missing its predecessors.
    pub fn difference<'a>(a: &'a Log, b: &Log) -> Vec<&'a Entry> {
        let mut stack: Vec<Cid> = a.heads.clone();
        let mut seen: HashSet<Cid> = HashSet::new();
        let mut out = Vec::new();

        while let Some(hash) = stack.pop() {
            if !seen.insert(hash) {
                continue;
            }
            let Some(entry) = a.entries.get(&hash) else {
                continue;
            };
            if !b.has(&hash) {
                out.push(entry);
            }
            stack.extend(entry.next.iter().copied());
        }

        out
    }
}

/// Entries in `entries` that no other entry in `entries` references,
/// newest first.
pub fn find_heads<'a>(entries: impl IntoIterator<Item = &'a Entry>) -> Vec<&'a Entry> {
    let entries: Vec<&Entry> = entries.into_iter().collect();
    let referenced: HashSet<Cid> = entries.iter().flat_map(|e| e.next.iter().copied()).collect();

    let mut heads: Vec<&Entry> = entries
        .into_iter()
        .filter(|e| !referenced.contains(&e.hash))
        .collect();
    heads.sort_by(|a, b| sort::last_write_wins(b, a).then_with(|| b.hash.cmp(&a.hash)));
    heads.dedup_by_key(|e| e.hash);
    heads
}

/// Roots and entries whose predecessors are missing from `entries`, ordered
/// by clock id.
pub fn find_tails<'a>(entries: impl IntoIterator<Item = &'a Entry>) -> Vec<&'a Entry> {
    let entries: Vec<&Entry> = entries.into_iter().collect();
    let held: HashSet<Cid> = entries.iter().map(|e| e.hash).collect();

    let mut tails: Vec<&Entry> = entries
        .into_iter()
        .filter(|e| e.next.is_empty() || e.next.iter().any(|hash| !held.contains(hash)))
        .collect();
    tails.sort_by(|a, b| sort::tail_order(a, b));
    tails.dedup_by_key(|e| e.hash);
    tails
}

/// Predecessor addresses referenced by `entries` but not among them.
pub fn find_tail_hashes<'a>(entries: impl IntoIterator<Item = &'a Entry>) -> Vec<Cid> {
    let entries: Vec<&Entry> = entries.into_iter().collect();
    let held: HashSet<Cid> = entries.iter().map(|e| e.hash).collect();

    let missing: BTreeSet<Cid> = entries
        .iter()
        .flat_map(|e| e.next.iter().copied())
        .filter(|hash| !held.contains(hash))
        .collect();
    missing.into_iter().collect()
}

fn sorted_desc(sort_fn: &SortFn, entries: &HashMap<Cid, Entry>, hashes: Vec<Cid>) -> Vec<Cid> {
    let mut heads: Vec<&Entry> = hashes.iter().filter_map(|hash| entries.get(hash)).collect();
    heads.sort_by(|a, b| sort_fn(*b, *a));
    heads.into_iter().map(|e| e.hash).collect()
}

fn max_time(entries: &HashMap<Cid, Entry>, hashes: &[Cid]) -> u64 {
    hashes
        .iter()
        .filter_map(|hash| entries.get(hash))
        .map(|e| e.clock.time)
        .max()
        .unwrap_or(0)
}

fn timestamp_id() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
        .to_string()
}

impl fmt::Debug for Log {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Log")
            .field("id", &self.id)
            .field("len", &self.entries.len())
            .field("heads", &self.heads)
            .field("clock", &self.clock)
            .finish()
    }
}

/// One line per entry, newest first, indented by how many children it has.
impl fmt::Display for Log {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let values: Vec<Entry> = self.values().into_iter().cloned().collect();

        for (line, entry) in values.iter().rev().enumerate() {
            if line > 0 {
                writeln!(f)?;
            }
            let children = Entry::find_children(entry, &values).len();
            if children > 1 {
                f.write_str(&"  ".repeat(children - 1))?;
            }
            if children > 0 {
                f.write_str("└─")?;
            }
            match &entry.payload {
                Value::String(text) => f.write_str(text)?,
                other => write!(f, "{other}")?,
            }
        }
        Ok(())
    }
}
