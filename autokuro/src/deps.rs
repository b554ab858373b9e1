//! Presence checks for the external scanners.

use crate::errors::ReconError;
use std::path::PathBuf;
use tracing::{debug, error};

/// Binaries every run needs on `PATH`.
pub const REQUIRED_TOOLS: &[&str] = &[
    "subfinder",
    "naabu",
    "httpx-toolkit",
    "nuclei",
    "feroxbuster",
    "gau",
    "katana",
    "paramspider",
    "dalfox",
    "trufflehog",
];

/// Where each required tool was found.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyReport {
    /// Tools found, with their resolved paths.
    pub found: Vec<(String, PathBuf)>,
    /// Tools not found.
    pub missing: Vec<String>,
}

impl DependencyReport {
    /// Returns true if nothing is missing.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.missing.is_empty()
    }

    /// Converts a report with missing tools into [`ReconError::DependencyMissing`].
    pub fn into_result(self) -> Result<Self, ReconError> {
        if self.is_ready() {
            Ok(self)
        } else {
            Err(ReconError::DependencyMissing {
                tools: self.missing,
            })
        }
    }
}

/// Resolves `tools` with `lookup`, keeping their order.
pub fn locate_tools<F>(tools: &[&str], lookup: F) -> DependencyReport
where
    F: Fn(&str) -> Option<PathBuf>,
{
    let mut report = DependencyReport::default();
    for &tool in tools {
        match lookup(tool) {
            Some(path) => {
                debug!(tool, path = %path.display(), "Found tool");
                report.found.push((tool.to_string(), path));
            }
            None => report.missing.push(tool.to_string()),
        }
    }
    report
}

/// Looks up every [`REQUIRED_TOOLS`] entry on `PATH`.
pub fn locate_required() -> DependencyReport {
    let report = locate_tools(REQUIRED_TOOLS, |tool| which::which(tool).ok());
    if !report.is_ready() {
        error!(missing = ?report.missing, "Missing dependencies");
    }
    report
}

/// Fails with [`ReconError::DependencyMissing`] listing every absent tool.
pub fn check_dependencies() -> Result<DependencyReport, ReconError> {
    locate_required().into_result()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locate_tools_reports_every_missing_tool() {
        let report = locate_tools(REQUIRED_TOOLS, |tool| {
            tool.starts_with('n').then(|| PathBuf::from("/usr/bin").join(tool))
        });

        assert_eq!(report.found.len(), 2);
        assert_eq!(report.found[0].0, "naabu");
        assert_eq!(report.missing.len(), REQUIRED_TOOLS.len() - 2);
        assert_eq!(report.missing[0], "subfinder");

        let err = report.into_result().unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("httpx-toolkit"));
    }

    #[test]
    fn test_all_present_is_ready() {
        let report = locate_tools(&["nuclei"], |_| Some(PathBuf::from("/bin/true")));
        assert!(report.into_result().is_ok());
    }
}
