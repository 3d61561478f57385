//! Lamport clock used to order log entries causally.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// Logical clock owned by one writer.
///
/// `id` is the writer's public key, `time` its logical counter. Clocks carry
/// no wall-clock meaning: equal times from different writers are concurrent,
/// not equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LamportClock {
    /// Writer identifier (hex public key).
    pub id: String,
    /// Logical time.
    pub time: u64,
}

impl LamportClock {
    /// A fresh clock at time 0.
    pub fn new(id: impl Into<String>) -> Self {
        Self::with_time(id, 0)
    }

    /// A clock at an explicit time.
    pub fn with_time(id: impl Into<String>, time: u64) -> Self {
        Self {
            id: id.into(),
            time,
        }
    }

    /// The clock advanced by one tick, or `None` once `time` is exhausted.
    pub fn tick(&self) -> Option<Self> {
        let time = self.time.checked_add(1)?;
        Some(Self::with_time(self.id.clone(), time))
    }

    /// Witness another clock: keeps our id, takes the later of the two times.
    pub fn merge(&self, other: &LamportClock) -> Self {
        Self::with_time(self.id.clone(), self.time.max(other.time))
    }

    /// Compare by `time` only.
    ///
    /// There is deliberately no tie-break on `id` here; callers that need a
    /// total order apply one themselves.
    pub fn compare(a: &LamportClock, b: &LamportClock) -> Ordering {
        a.time.cmp(&b.time)
    }
}
