//! Append-only, signed, causally ordered event log.
//!
//! A [`Log`] is a DAG of [`Entry`] values. Each entry is content-addressed in
//! an [`ObjectStore`](tidelog_store::ObjectStore), signed by its writer's
//! [`Identity`](tidelog_identity::Identity), and links to the entries that
//! were heads when it was written. Several writers can append to copies of
//! the same log independently; [`Log::join`] merges copies deterministically,
//! so every replica that has seen the same entries has the same heads
//! whatever order the merges happened in.
//!
//! Ordering is by Lamport clock, ties broken by writer key and finally by
//! content address (see [`sort`]). Partial logs are rebuilt from head
//! addresses with the concurrent walk in [`traversal`].

pub mod access;
pub mod config;
mod entry;
mod error;
mod log;
pub mod sort;
pub mod traversal;

#[cfg(test)]
mod tests;

pub use access::{AccessController, AllowAll, KeyListAccess};
pub use config::LogConfig;
pub use entry::{ENTRY_LINKS, Entry, EntryVersion};
pub use error::LogError;
pub use log::{
    Log, LogHeads, LogOptions, LogSnapshot, MANIFEST_LINKS, find_heads, find_tail_hashes, find_tails,
};
pub use traversal::{SignaturePolicy, TraversalOptions, load_from_entries, load_from_hashes};
