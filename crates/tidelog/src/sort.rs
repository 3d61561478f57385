//! Total-order comparators over entries.
//!
//! The comparators compose: [`sort_by_clocks`] orders by logical time and
//! delegates ties to a resolver, and [`no_zeroes`] turns any comparator into
//! a total order by falling back to the content address.

use std::cmp::Ordering;
use std::sync::Arc;

use tidelog_types::LamportClock;

use crate::entry::Entry;

/// A shareable entry comparator.
pub type SortFn = Arc<dyn Fn(&Entry, &Entry) -> Ordering + Send + Sync>;

/// Order by clock time, resolving ties with `resolve`.
pub fn sort_by_clocks<F>(a: &Entry, b: &Entry, resolve: F) -> Ordering
where
    F: Fn(&Entry, &Entry) -> Ordering,
{
    match LamportClock::compare(&a.clock, &b.clock) {
        Ordering::Equal => resolve(a, b),
        other => other,
    }
}

/// Order by ascending clock id, falling back to clock time.
pub fn sort_by_clock_id(a: &Entry, b: &Entry) -> Ordering {
    a.clock
        .id
        .cmp(&b.clock.id)
        .then_with(|| LamportClock::compare(&a.clock, &b.clock))
}

/// Clock time, then clock id. The default causal order.
pub fn last_write_wins(a: &Entry, b: &Entry) -> Ordering {
    sort_by_clocks(a, b, sort_by_clock_id)
}

/// Clock time, then content address.
pub fn sort_by_entry_hash(a: &Entry, b: &Entry) -> Ordering {
    sort_by_clocks(a, b, |a, b| a.hash.cmp(&b.hash))
}

/// Same order as [`Entry::compare`].
pub fn causal_compare(a: &Entry, b: &Entry) -> Ordering {
    Entry::compare(a, b)
}

/// Wrap `f` so that distinct entries never compare equal.
pub fn no_zeroes(f: SortFn) -> SortFn {
    Arc::new(move |a: &Entry, b: &Entry| match f(a, b) {
        Ordering::Equal if a.hash != b.hash => a.hash.cmp(&b.hash),
        other => other,
    })
}

/// `no_zeroes(last_write_wins)`.
pub fn default_sort() -> SortFn {
    no_zeroes(Arc::new(last_write_wins))
}

/// Order used for tails: owner first, then time, then address.
pub fn tail_order(a: &Entry, b: &Entry) -> Ordering {
    sort_by_clock_id(a, b).then_with(|| a.hash.cmp(&b.hash))
}
