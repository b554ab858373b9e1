//! Input selection for individual stages.

use crate::core::Artifact;
use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};

/// File holding the directory brute-force target subset.
pub const PRIORITY_HOSTS: &str = "priority_hosts_ferox.txt";

/// Host lists this small are brute-forced in full.
pub const PRIORITY_FULL_SCAN_LIMIT: usize = 20;

/// Hosts taken when no keyword matches.
pub const PRIORITY_FALLBACK_COUNT: usize = 10;

/// Picks the hosts worth brute-forcing.
///
/// Returns `live_hosts` itself when it holds at most
/// [`PRIORITY_FULL_SCAN_LIMIT`] hosts. Otherwise writes [`PRIORITY_HOSTS`]
/// with every host containing a keyword (case-insensitive), or with the first
/// [`PRIORITY_FALLBACK_COUNT`] hosts when nothing matches.
pub fn select_priority_hosts(
    live_hosts: &Artifact,
    dir: &Path,
    keywords: &[String],
) -> io::Result<Artifact> {
    let hosts = live_hosts.read_lines()?;
    if hosts.len() <= PRIORITY_FULL_SCAN_LIMIT {
        return Ok(live_hosts.clone());
    }

    let keywords: Vec<String> = keywords.iter().map(|k| k.to_lowercase()).collect();
    let mut seen = HashSet::new();
    let matched: Vec<&String> = hosts
        .iter()
        .filter(|host| {
            let lower = host.to_lowercase();
            keywords.iter().any(|k| lower.contains(k.as_str()))
        })
        .filter(|host| seen.insert(host.as_str()))
        .collect();

    let priority = Artifact::in_dir(dir, PRIORITY_HOSTS);
    if matched.is_empty() {
        priority.write_lines(hosts.iter().take(PRIORITY_FALLBACK_COUNT))?;
    } else {
        tracing::info!(
            priority = matched.len(),
            total = hosts.len(),
            "Selected priority hosts for directory scan"
        );
        priority.write_lines(matched)?;
    }
    Ok(priority)
}

/// Returns the first wordlist that exists.
#[must_use]
pub fn resolve_wordlist(primary: &Path, fallback: Option<&Path>) -> Option<PathBuf> {
    std::iter::once(primary)
        .chain(fallback)
        .find(|path| path.is_file())
        .map(Path::to_path_buf)
}

/// Writes the lines of `source` accepted by `keep` into `dest`.
///
/// Returns the number of lines written.
pub fn filter_lines(
    source: &Artifact,
    dest: &Artifact,
    keep: impl Fn(&str) -> bool,
) -> io::Result<usize> {
    dest.write_lines(source.lines()?.filter(|line| keep(line)))
}

/// Lines that reference JavaScript files.
#[must_use]
pub fn is_js_url(line: &str) -> bool {
    line.contains(".js")
}

/// Lines that carry a query string.
#[must_use]
pub fn has_query(line: &str) -> bool {
    line.contains('?')
}
