//! URL deduplication.
//!
//! Crawler and archive outputs are streamed into a [`UrlDedupStore`], which
//! drops junk URLs, keeps the first writer of each value and drains into a
//! sorted list.

mod denylist;
mod merge;
mod store;

pub use denylist::{Denylist, DEFAULT_DENY_SUBSTRINGS, DEFAULT_DENY_SUFFIXES};
pub use merge::{merge_artifacts, merge_into, MergeStats};
pub use store::{InsertStats, UrlDedupStore, BATCH_SIZE};
