//! Merging line-oriented artifacts through the dedup store.

use super::store::{InsertStats, UrlDedupStore};
use crate::core::Artifact;
use serde::{Deserialize, Serialize};
use std::io;

/// Result of a merge.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeStats {
    /// Sources that existed and were read.
    pub sources_read: usize,
    /// Sources that were absent.
    pub sources_missing: usize,
    /// Aggregated insert counters.
    pub insert: InsertStats,
    /// Lines written to the merged artifact.
    pub written: usize,
}

/// Streams every source through a fresh store and writes the sorted unique
/// lines to `output`. Missing sources are skipped.
pub fn merge_artifacts(sources: &[Artifact], output: &Artifact) -> io::Result<MergeStats> {
    merge_into(UrlDedupStore::new(), sources, output)
}

/// Like [`merge_artifacts`] with a caller-provided store.
pub fn merge_into(
    store: UrlDedupStore,
    sources: &[Artifact],
    output: &Artifact,
) -> io::Result<MergeStats> {
    let mut stats = MergeStats::default();

    for source in sources {
        if !source.path().exists() {
            stats.sources_missing += 1;
            continue;
        }
        let inserted = store.insert_many(source.lines()?, source.file_name());
        stats.sources_read += 1;
        stats.insert.inserted += inserted.inserted;
        stats.insert.duplicates += inserted.duplicates;
        stats.insert.filtered += inserted.filtered;
    }

    stats.written = output.write_lines(store.drain())?;
    tracing::info!(
        output = %output.path().display(),
        sources = stats.sources_read,
        written = stats.written,
        "Merged URL sources"
    );
    Ok(stats)
}
