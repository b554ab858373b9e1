//! Context-aware host grouping and tech tag detection.

use crate::core::Artifact;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::Path;

/// Grouped host list file names.
pub const TARGETS_API: &str = "targets_api.txt";
/// Grouped host list file names.
pub const TARGETS_STATIC: &str = "targets_static.txt";
/// Grouped host list file names.
pub const TARGETS_DYNAMIC: &str = "targets_dynamic.txt";

/// Coarse class of a live host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetGroup {
    /// API endpoints.
    Api,
    /// CDN and asset hosts.
    Static,
    /// Everything else.
    Dynamic,
}

impl TargetGroup {
    /// Classifies a URL by plain substring rules.
    #[must_use]
    pub fn classify(url: &str) -> Self {
        let url = url.to_lowercase();
        if ["api.", "/api", "v1", "graphql"].iter().any(|m| url.contains(m)) {
            Self::Api
        } else if ["cdn.", "static.", "assets.", "img."].iter().any(|m| url.contains(m)) {
            Self::Static
        } else {
            Self::Dynamic
        }
    }
}

/// The grouped host files of a run.
#[derive(Debug, Clone)]
pub struct TargetGroups {
    /// API hosts.
    pub api: Artifact,
    /// Static hosts.
    pub static_hosts: Artifact,
    /// Dynamic hosts.
    pub dynamic: Artifact,
}

impl TargetGroups {
    /// Handles for the group files inside `dir`.
    #[must_use]
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            api: Artifact::in_dir(dir, TARGETS_API),
            static_hosts: Artifact::in_dir(dir, TARGETS_STATIC),
            dynamic: Artifact::in_dir(dir, TARGETS_DYNAMIC),
        }
    }
}

/// Splits `live_hosts` into the three group files. Empty groups get no file.
pub fn group_targets(live_hosts: &Artifact, dir: &Path) -> io::Result<TargetGroups> {
    let groups = TargetGroups::in_dir(dir);
    let (mut api, mut static_hosts, mut dynamic) = (Vec::new(), Vec::new(), Vec::new());

    for url in live_hosts.lines()? {
        match TargetGroup::classify(&url) {
            TargetGroup::Api => api.push(url),
            TargetGroup::Static => static_hosts.push(url),
            TargetGroup::Dynamic => dynamic.push(url),
        }
    }

    for (artifact, hosts) in [
        (&groups.api, &api),
        (&groups.static_hosts, &static_hosts),
        (&groups.dynamic, &dynamic),
    ] {
        if hosts.is_empty() {
            artifact.remove()?;
        } else {
            artifact.write_lines(hosts)?;
        }
    }

    tracing::debug!(
        api = api.len(),
        static_hosts = static_hosts.len(),
        dynamic = dynamic.len(),
        "Grouped live hosts"
    );
    Ok(groups)
}

/// Collects nuclei tags for every technology keyword found in `technology`.
///
/// Matching is a case-insensitive substring search over the whole file. The
/// result is sorted and free of duplicates.
pub fn detect_tech_tags(
    technology: &Artifact,
    rules: &BTreeMap<String, String>,
) -> io::Result<Vec<String>> {
    let content = technology
        .lines()?
        .map(|line| line.to_lowercase())
        .collect::<Vec<_>>()
        .join("\n");

    let tags: BTreeSet<String> = rules
        .iter()
        .filter(|(tech, _)| content.contains(&tech.to_lowercase()))
        .flat_map(|(_, tags)| tags.split(','))
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(ToString::to_string)
        .collect();

    Ok(tags.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_classify() {
        assert_eq!(TargetGroup::classify("https://api.example.com"), TargetGroup::Api);
        assert_eq!(TargetGroup::classify("https://example.com/API/users"), TargetGroup::Api);
        assert_eq!(TargetGroup::classify("https://example.com/v1"), TargetGroup::Api);
        assert_eq!(TargetGroup::classify("https://cdn.example.com"), TargetGroup::Static);
        assert_eq!(TargetGroup::classify("https://img.example.com"), TargetGroup::Static);
        assert_eq!(TargetGroup::classify("https://shop.example.com"), TargetGroup::Dynamic);
    }

    #[test]
    fn test_classify_is_plain_substring() {
        // "rapi.example.com" contains "api." and counts as an API host.
        assert_eq!(TargetGroup::classify("https://rapi.example.com"), TargetGroup::Api);
        assert_eq!(TargetGroup::classify("https://cdn.api.example.com"), TargetGroup::Api);
    }

    #[test]
    fn test_group_targets_writes_non_empty_groups() {
        let dir = tempfile::tempdir().unwrap();
        let live = Artifact::in_dir(dir.path(), "live_hosts.txt");
        live.write_lines([
            "https://api.example.com",
            "https://www.example.com",
            "https://shop.example.com",
        ])
        .unwrap();

        let groups = group_targets(&live, dir.path()).unwrap();

        assert_eq!(groups.api.read_lines().unwrap(), vec!["https://api.example.com"]);
        assert_eq!(
            groups.dynamic.read_lines().unwrap(),
            vec!["https://www.example.com", "https://shop.example.com"]
        );
        assert!(!groups.static_hosts.path().exists());
    }

    #[test]
    fn test_detect_tech_tags() {
        let dir = tempfile::tempdir().unwrap();
        let tech = Artifact::in_dir(dir.path(), "technology.txt");
        tech.write_lines([
            "[tech-detect:nginx] [http] [info] https://www.example.com",
            "[wordpress-detect] [http] [info] https://blog.example.com",
        ])
        .unwrap();
        let rules: BTreeMap<String, String> = [
            ("WordPress", "wordpress, wp-plugin"),
            ("nginx", "nginx"),
            ("jenkins", "jenkins"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let tags = detect_tech_tags(&tech, &rules).unwrap();

        assert_eq!(tags, vec!["nginx", "wordpress", "wp-plugin"]);
    }

    #[test]
    fn test_detect_tech_tags_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let tech = Artifact::in_dir(dir.path(), "technology.txt");
        assert!(detect_tech_tags(&tech, &BTreeMap::new()).unwrap().is_empty());
    }
}
