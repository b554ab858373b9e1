//! Normalizing tool output into line artifacts.

use crate::core::Artifact;
use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::Path;

/// Extracts the `url` field of every JSON line in `raw` into `dest`.
///
/// Lines that are not JSON objects or lack a string `url` are ignored. The
/// output is sorted and unique. Returns the number of URLs written.
pub fn extract_json_urls(raw: &Artifact, dest: &Artifact) -> io::Result<usize> {
    let urls: BTreeSet<String> = raw
        .lines()?
        .filter_map(|line| serde_json::from_str::<serde_json::Value>(&line).ok())
        .filter_map(|value| value.get("url")?.as_str().map(ToString::to_string))
        .collect();
    dest.write_lines(urls)
}

/// Moves paramspider's output into `dest`.
///
/// Paramspider writes `results/<domain>.txt` (older versions `<domain>.txt`)
/// relative to its working directory `work_dir`. Returns true if a non-empty
/// file was moved.
pub fn relocate_paramspider_output(work_dir: &Path, domain: &str, dest: &Artifact) -> io::Result<bool> {
    let file_name = format!("{domain}.txt");
    let results_dir = work_dir.join("results");

    for candidate in [results_dir.join(&file_name), work_dir.join(&file_name)] {
        if Artifact::new(&candidate).is_usable() {
            fs::rename(&candidate, dest.path())?;
            // Only succeeds when paramspider left nothing else behind.
            let _ = fs::remove_dir(&results_dir);
            return Ok(true);
        }
    }
    Ok(false)
}
