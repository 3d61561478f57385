//! Block envelope and link-aware record encoding.
//!
//! A stored block is a postcard-encoded [`Block`]: a [`Format`] tag plus the
//! record bytes. The block's address is `blake3(block_bytes)`, so the same
//! record written under two formats gets two different addresses.
//!
//! Record fields named as links hold content addresses. Inside the block they
//! are stored as `{"/": "<hex cid>"}` objects so that the graph edges are
//! recognizable without knowing the record schema; [`decode_record`] turns
//! them back into plain hex strings.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tidelog_types::canonical;

use crate::error::StoreError;

/// Key of the single-field object that marks a link.
pub const LINK_KEY: &str = "/";

/// Record encoding of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Format {
    /// Plain `serde_json` output. Kept for reading legacy (v0) records.
    Legacy,
    /// Canonical JSON: sorted keys, no whitespace.
    Canonical,
}

/// The unit actually written to a store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// How `data` is encoded.
    pub format: Format,
    /// The encoded record.
    pub data: Vec<u8>,
}

impl Block {
    /// Serialize the block envelope.
    pub fn to_bytes(&self) -> Result<Vec<u8>, StoreError> {
        Ok(postcard::to_allocvec(self)?)
    }

    /// Parse a block envelope.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, StoreError> {
        Ok(postcard::from_bytes(bytes)?)
    }
}

/// Encode a record into block bytes, marking `links` fields as edges.
pub fn encode_record(format: Format, record: &Value, links: &[&str]) -> Result<Vec<u8>, StoreError> {
    let mut record = record.clone();
    wrap_links(&mut record, links);

    let data = match format {
        Format::Legacy => serde_json::to_vec(&record)?,
        Format::Canonical => canonical::to_canonical_json(&record)?,
    };

    Block { format, data }.to_bytes()
}

/// Decode block bytes into a record, resolving `links` fields to hex strings.
pub fn decode_record(bytes: &[u8], links: &[&str]) -> Result<(Format, Value), StoreError> {
    let block = Block::from_bytes(bytes)?;
    let mut record: Value = serde_json::from_slice(&block.data)?;
    unwrap_links(&mut record, links)?;
    Ok((block.format, record))
}

fn wrap_links(record: &mut Value, links: &[&str]) {
    let Value::Object(map) = record else {
        return;
    };

    for name in links {
        match map.get_mut(*name) {
            Some(Value::Array(items)) => {
                for item in items.iter_mut() {
                    wrap_link(item);
                }
            }
            Some(value) => wrap_link(value),
            None => {}
        }
    }
}

fn wrap_link(value: &mut Value) {
    if let Value::String(address) = value {
        let mut link = Map::new();
        link.insert(LINK_KEY.to_string(), Value::String(std::mem::take(address)));
        *value = Value::Object(link);
    }
}

fn unwrap_links(record: &mut Value, links: &[&str]) -> Result<(), StoreError> {
    let Value::Object(map) = record else {
        return Ok(());
    };

    for name in links {
        match map.get_mut(*name) {
            Some(Value::Array(items)) => {
                for item in items.iter_mut() {
                    unwrap_link(name, item)?;
                }
            }
            Some(value) => unwrap_link(name, value)?,
            None => {}
        }
    }
    Ok(())
}

fn unwrap_link(field: &str, value: &mut Value) -> Result<(), StoreError> {
    let address = match value {
        Value::Object(link) if link.len() == 1 => match link.get(LINK_KEY) {
            Some(Value::String(address)) => address.clone(),
            _ => return Err(StoreError::Codec(format!("malformed link in field `{field}`"))),
        },
        Value::Null => return Ok(()),
        _ => return Err(StoreError::Codec(format!("field `{field}` is not a link"))),
    };
    *value = Value::String(address);
    Ok(())
}
