//! Log entry type: an immutable, signed, content-addressed DAG node.

use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use tidelog_identity::{Identity, IdentityDescriptor, IdentityProvider};
use tidelog_store::{Format, ObjectStore, codec};
use tidelog_types::{Cid, LamportClock, canonical};
use tracing::debug;

use crate::error::LogError;

type Result<T> = std::result::Result<T, LogError>;

/// Record fields that hold entry addresses.
pub const ENTRY_LINKS: &[&str] = &["next"];

/// Fields every stored entry record carries.
const REQUIRED_FIELDS: [&str; 6] = ["id", "next", "payload", "v", "hash", "clock"];

/// Layout version of an entry. Serialized as the integer `0` or `1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntryVersion {
    /// Legacy layout: plain JSON signing bytes, possibly unsigned.
    V0,
    /// Current layout: canonical JSON signing bytes.
    V1,
}

impl EntryVersion {
    /// Block format entries of this version are stored in.
    pub fn format(self) -> Format {
        match self {
            Self::V0 => Format::Legacy,
            Self::V1 => Format::Canonical,
        }
    }

    /// Version tag handed to the identity provider when verifying.
    pub fn tag(self) -> &'static str {
        match self {
            Self::V0 => "v0",
            Self::V1 => "v1",
        }
    }
}

impl Serialize for EntryVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_u8(match self {
            Self::V0 => 0,
            Self::V1 => 1,
        })
    }
}

impl<'de> Deserialize<'de> for EntryVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        match u64::deserialize(deserializer)? {
            0 => Ok(Self::V0),
            1 => Ok(Self::V1),
            other => Err(serde::de::Error::custom(format!(
                "unsupported entry version: {other}"
            ))),
        }
    }
}

/// A single entry in the log DAG.
///
/// Equality and hashing use `hash` only: two entries are the same entry iff
/// they have the same content address.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entry {
    /// Content address of the stored record.
    pub hash: Cid,
    /// Log identifier.
    pub id: String,
    /// Application data.
    pub payload: Value,
    /// Addresses of predecessor entries.
    pub next: Vec<Cid>,
    /// Layout version.
    pub v: EntryVersion,
    /// Lamport clock of the writer at the time of writing.
    pub clock: LamportClock,
    /// Hex public key of the signer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// Identity of the signer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<IdentityDescriptor>,
    /// Hex signature over the signable bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sig: Option<String>,
}

/// The signed part of an entry. `hash` is always `null`.
#[derive(Serialize)]
struct SignableEntry<'a> {
    hash: Option<Cid>,
    id: &'a str,
    payload: &'a Value,
    next: &'a [Cid],
    v: EntryVersion,
    clock: &'a LamportClock,
}

/// Shape of an entry record as read back from the store.
#[derive(Deserialize)]
struct StoredEntry {
    id: String,
    payload: Value,
    next: Vec<Cid>,
    v: EntryVersion,
    clock: LamportClock,
    #[serde(default)]
    key: Option<String>,
    #[serde(default)]
    identity: Option<IdentityDescriptor>,
    #[serde(default)]
    sig: Option<String>,
}

impl Entry {
    /// Build and sign a new entry without writing it.
    ///
    /// `hash` is set to the address the entry gets once written with
    /// [`Entry::to_cid`]. `next` accepts addresses or entries; duplicates are
    /// dropped, first-seen order is kept.
    pub async fn build<I>(
        provider: &dyn IdentityProvider,
        identity: &Identity,
        log_id: &str,
        payload: Value,
        next: I,
        clock: Option<LamportClock>,
    ) -> Result<Entry>
    where
        I: IntoIterator,
        I::Item: Into<Cid>,
    {
        if log_id.is_empty() {
            return Err(LogError::InvalidArgument("entry requires a log id".into()));
        }
        if payload.is_null() {
            return Err(LogError::InvalidArgument("entry requires a payload".into()));
        }

        let mut nexts: Vec<Cid> = Vec::new();
        for hash in next.into_iter().map(Into::into) {
            if !nexts.contains(&hash) {
                nexts.push(hash);
            }
        }

        let clock = clock.unwrap_or_else(|| LamportClock::new(identity.public_key()));
        let v = EntryVersion::V1;
        let bytes = signable_bytes(log_id, &payload, &nexts, v, &clock)?;
        let sig = provider.sign(identity, &bytes).await?;

        let mut entry = Entry {
            hash: Cid::from([0u8; 32]),
            id: log_id.to_string(),
            payload,
            next: nexts,
            v,
            clock,
            key: Some(identity.public_key().to_string()),
            identity: Some(identity.descriptor()),
            sig: Some(sig),
        };
        entry.hash = entry.address()?;
        Ok(entry)
    }

    /// Build, sign and write a new entry.
    pub async fn create<I>(
        store: &dyn ObjectStore,
        provider: &dyn IdentityProvider,
        identity: &Identity,
        log_id: &str,
        payload: Value,
        next: I,
        clock: Option<LamportClock>,
    ) -> Result<Entry>
    where
        I: IntoIterator,
        I::Item: Into<Cid>,
    {
        let mut entry = Self::build(provider, identity, log_id, payload, next, clock).await?;
        entry.hash = Self::to_cid(store, &entry).await?;
        debug!(hash = %entry.hash, id = %entry.id, time = entry.clock.time, "created entry");
        Ok(entry)
    }

    /// Check the entry's signature.
    ///
    /// Unsigned entries are malformed. A signature that does not match is
    /// `Ok(false)`.
    pub async fn verify(provider: &dyn IdentityProvider, entry: &Entry) -> Result<bool> {
        let (Some(key), Some(sig)) = (&entry.key, &entry.sig) else {
            return Err(LogError::MalformedEntry(format!(
                "entry {} has no key or signature",
                entry.hash
            )));
        };

        let bytes = signable_bytes(&entry.id, &entry.payload, &entry.next, entry.v, &entry.clock)?;
        Ok(provider.verify(sig, key, &bytes, entry.v.tag()).await?)
    }

    /// Write the entry's record and return its address.
    pub async fn to_cid(store: &dyn ObjectStore, entry: &Entry) -> Result<Cid> {
        Ok(store.write(entry.v.format(), &entry.to_record()?, ENTRY_LINKS).await?)
    }

    /// Read an entry back from the store.
    pub async fn from_cid(store: &dyn ObjectStore, hash: Cid) -> Result<Entry> {
        let (_, record) = store.read(hash, ENTRY_LINKS).await?;
        if !Self::is_entry(&record) {
            return Err(LogError::MalformedEntry(format!("{hash} is not an entry record")));
        }

        let stored: StoredEntry = serde_json::from_value(record)?;
        Ok(Entry {
            hash,
            id: stored.id,
            payload: stored.payload,
            next: stored.next,
            v: stored.v,
            clock: LamportClock::with_time(stored.clock.id, stored.clock.time),
            key: stored.key,
            identity: stored.identity,
            sig: stored.sig,
        })
    }

    /// Whether a raw record has every field an entry requires.
    pub fn is_entry(record: &Value) -> bool {
        match record {
            Value::Object(map) => REQUIRED_FIELDS.iter().all(|field| map.contains_key(*field)),
            _ => false,
        }
    }

    /// Address equality.
    pub fn is_equal(a: &Entry, b: &Entry) -> bool {
        a.hash == b.hash
    }

    /// Clock order, ties broken by ascending clock id.
    pub fn compare(a: &Entry, b: &Entry) -> Ordering {
        LamportClock::compare(&a.clock, &b.clock).then_with(|| a.clock.id.cmp(&b.clock.id))
    }

    /// Whether `entry1` is a direct predecessor of `entry2`.
    pub fn is_parent(entry1: &Entry, entry2: &Entry) -> bool {
        entry2.next.contains(&entry1.hash)
    }

    /// Follow the chain of one-hop children of `entry` through `candidates`.
    ///
    /// Each step picks the first candidate that lists the previous entry as
    /// a predecessor. The chain is returned sorted by ascending clock time.
    pub fn find_children<'a>(entry: &Entry, candidates: &'a [Entry]) -> Vec<&'a Entry> {
        let mut chain: Vec<&'a Entry> = Vec::new();
        let mut prev = entry.hash;

        while chain.len() < candidates.len() {
            let Some(child) = candidates.iter().find(|c| c.next.contains(&prev)) else {
                break;
            };
            chain.push(child);
            prev = child.hash;
        }

        chain.sort_by_key(|e| e.clock.time);
        chain
    }

    /// The address this entry's record hashes to, without writing it.
    pub fn address(&self) -> Result<Cid> {
        let bytes = codec::encode_record(self.v.format(), &self.to_record()?, ENTRY_LINKS)?;
        Ok(Cid::from_data(&bytes))
    }

    fn to_record(&self) -> Result<Value> {
        let mut record = serde_json::to_value(SignableEntry {
            hash: None,
            id: &self.id,
            payload: &self.payload,
            next: &self.next,
            v: self.v,
            clock: &self.clock,
        })?;

        if let Value::Object(map) = &mut record {
            insert_some(map, "key", &self.key)?;
            insert_some(map, "identity", &self.identity)?;
            insert_some(map, "sig", &self.sig)?;
        }
        Ok(record)
    }
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash
    }
}

impl Eq for Entry {}

impl Hash for Entry {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.hash.hash(state);
    }
}

impl From<&Entry> for Cid {
    fn from(entry: &Entry) -> Self {
        entry.hash
    }
}

fn insert_some<T: Serialize>(map: &mut Map<String, Value>, key: &str, value: &Option<T>) -> Result<()> {
    if let Some(value) = value {
        map.insert(key.to_string(), serde_json::to_value(value)?);
    }
    Ok(())
}

pub(crate) fn signable_bytes(
    id: &str,
    payload: &Value,
    next: &[Cid],
    v: EntryVersion,
    clock: &LamportClock,
) -> Result<Vec<u8>> {
    let signable = SignableEntry {
        hash: None,
        id,
        payload,
        next,
        v,
        clock,
    };
    match v {
        EntryVersion::V0 => Ok(serde_json::to_vec(&signable)?),
        EntryVersion::V1 => Ok(canonical::to_canonical_json(&signable)?),
    }
}

/// Verify an entry, treating any verification error as invalid.
pub(crate) async fn is_valid(provider: &dyn IdentityProvider, entry: &Entry) -> bool {
    match Entry::verify(provider, entry).await {
        Ok(valid) => valid,
        Err(e) => {
            debug!(hash = %entry.hash, error = %e, "entry failed verification");
            false
        }
    }
}
