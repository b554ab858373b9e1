//! Concurrent URL deduplication store.

use super::denylist::Denylist;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

/// Number of lines buffered before they are written into the store.
pub const BATCH_SIZE: usize = 1000;

/// Counters returned by [`UrlDedupStore::insert_many`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsertStats {
    /// New unique values.
    pub inserted: usize,
    /// Values already present.
    pub duplicates: usize,
    /// Values rejected by the denylist.
    pub filtered: usize,
}

impl InsertStats {
    fn absorb(&mut self, other: Self) {
        self.inserted += other.inserted;
        self.duplicates += other.duplicates;
        self.filtered += other.filtered;
    }
}

/// An in-memory set of URLs keyed by exact string.
///
/// The first source to insert a value owns it. The store may be shared
/// between threads; [`drain`](Self::drain) consumes it.
#[derive(Debug, Default)]
pub struct UrlDedupStore {
    entries: DashMap<String, String>,
    denylist: Denylist,
}

impl UrlDedupStore {
    /// Creates a store with the default denylist.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the denylist.
    #[must_use]
    pub fn with_denylist(mut self, denylist: Denylist) -> Self {
        self.denylist = denylist;
        self
    }

    /// Inserts lines from `source`, consuming the iterator lazily in batches
    /// of [`BATCH_SIZE`].
    pub fn insert_many<I, S>(&self, lines: I, source: &str) -> InsertStats
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut stats = InsertStats::default();
        let mut batch = Vec::with_capacity(BATCH_SIZE);

        for line in lines {
            let value = line.as_ref().trim();
            if value.is_empty() {
                continue;
            }
            if self.denylist.is_denied(value) {
                stats.filtered += 1;
                continue;
            }
            batch.push(value.to_string());
            if batch.len() == BATCH_SIZE {
                stats.absorb(self.flush(&mut batch, source));
            }
        }
        stats.absorb(self.flush(&mut batch, source));

        tracing::debug!(
            source,
            inserted = stats.inserted,
            duplicates = stats.duplicates,
            filtered = stats.filtered,
            "Fed dedup store"
        );
        stats
    }

    fn flush(&self, batch: &mut Vec<String>, source: &str) -> InsertStats {
        let mut stats = InsertStats::default();
        for value in batch.drain(..) {
            match self.entries.entry(value) {
                Entry::Occupied(_) => stats.duplicates += 1,
                Entry::Vacant(slot) => {
                    slot.insert(source.to_string());
                    stats.inserted += 1;
                }
            }
        }
        stats
    }

    /// Number of unique values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing has been inserted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the source label that first inserted `value`.
    #[must_use]
    pub fn source_of(&self, value: &str) -> Option<String> {
        self.entries.get(value).map(|entry| entry.value().clone())
    }

    /// Consumes the store and returns every unique value once, sorted.
    #[must_use]
    pub fn drain(self) -> Vec<String> {
        let mut values: Vec<String> = self.entries.into_iter().map(|(value, _)| value).collect();
        values.sort_unstable();
        values
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    #[test]
    fn test_overlapping_sources() {
        let store = UrlDedupStore::new();
        store.insert_many(["a", "b", "c"], "gau");
        store.insert_many(["b", "c", "d"], "katana");

        assert_eq!(store.source_of("b").as_deref(), Some("gau"));
        assert_eq!(store.source_of("d").as_deref(), Some("katana"));
        assert_eq!(store.drain(), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_trims_and_drops_empty_and_junk() {
        let store = UrlDedupStore::new();
        let stats = store.insert_many(
            [
                "  https://x.example.com/a  ",
                "",
                "   ",
                "https://x.example.com/a",
                "https://x.example.com/logo.png",
                "https://x.example.com/cdn-cgi/trace",
            ],
            "crawl",
        );

        assert_eq!(
            stats,
            InsertStats {
                inserted: 1,
                duplicates: 1,
                filtered: 2
            }
        );
        assert_eq!(store.drain(), vec!["https://x.example.com/a"]);
    }

    #[test]
    fn test_asset_suffix_after_query_or_fragment_is_dropped() {
        let store = UrlDedupStore::new();
        let stats = store.insert_many(
            [
                "https://a.example.com/page?img=a.png",
                "https://a.example.com/x#f.css",
                "https://a.example.com/page?id=1",
            ],
            "archive",
        );

        assert_eq!(stats.filtered, 2);
        assert_eq!(store.drain(), vec!["https://a.example.com/page?id=1"]);
    }

    #[test]
    fn test_exact_match_is_case_sensitive() {
        let store = UrlDedupStore::new().with_denylist(Denylist::empty());
        store.insert_many(["https://A.example.com", "https://a.example.com"], "s");
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_spans_many_batches() {
        let store = UrlDedupStore::new();
        let lines = (0..2500).map(|i| format!("https://h.example.com/p{}", i % 1200));

        let stats = store.insert_many(lines, "archive");

        assert_eq!(stats.inserted, 1200);
        assert_eq!(stats.duplicates, 1300);
        assert_eq!(store.len(), 1200);
    }

    #[test]
    fn test_concurrent_feeders() {
        let store = Arc::new(UrlDedupStore::new());

        std::thread::scope(|scope| {
            for worker in 0..4 {
                let store = Arc::clone(&store);
                scope.spawn(move || {
                    let lines = (0..500).map(|i| format!("https://c.example.com/p{i}"));
                    store.insert_many(lines, &format!("worker-{worker}"));
                });
            }
        });

        let store = Arc::into_inner(store).unwrap();
        let drained = store.drain();
        assert_eq!(drained.len(), 500);
        let mut sorted = drained.clone();
        sorted.sort();
        assert_eq!(drained, sorted);
    }
}
