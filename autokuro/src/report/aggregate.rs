use crate::core::Artifact;
use crate::errors::ReconError;
use crate::pipeline::{StageId, MERGED_URLS};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

/// Host-level findings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconSection {
    /// Probed live hosts.
    pub live_hosts: Vec<String>,
    /// Open ports.
    pub open_ports: Vec<String>,
    /// Technology fingerprints.
    pub technologies: Vec<String>,
    /// Cloud assets.
    pub cloud_assets: Vec<String>,
    /// Subdomain takeover candidates.
    pub subdomain_takeovers: Vec<String>,
}

/// Content discovery findings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoverySection {
    /// Brute-forced paths.
    pub hidden_directories: Vec<String>,
    /// Parameterised URLs.
    pub parameters: Vec<String>,
    /// Size of the merged URL list.
    pub crawled_urls_count: usize,
}

/// Scanner findings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VulnerabilitySection {
    /// General nuclei findings.
    pub nuclei_general: Vec<String>,
    /// Nuclei findings from detected technology tags.
    pub nuclei_context: Vec<String>,
    /// Tokens found in JavaScript files.
    pub secrets_js: Vec<String>,
    /// Trufflehog findings.
    pub secrets_trufflehog: Vec<String>,
    /// Dalfox findings.
    pub xss_dalfox: Vec<String>,
}

/// Line count and content hash of one artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactSummary {
    /// Non-empty lines.
    pub lines: usize,
    /// Hex SHA-256 of the file.
    pub sha256: String,
}

/// The aggregated report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconReport {
    /// Target domain.
    pub target: String,
    /// Run date (`YYYY-MM-DD`).
    pub scan_date: String,
    /// Host-level findings.
    pub recon: ReconSection,
    /// Content discovery findings.
    pub discovery: DiscoverySection,
    /// Scanner findings.
    pub vulnerabilities: VulnerabilitySection,
    /// Every usable artifact by file name.
    pub artifacts: BTreeMap<String, ArtifactSummary>,
}

fn lines_of(dir: &Path, stage: StageId) -> io::Result<Vec<String>> {
    Artifact::in_dir(dir, stage.artifact()).read_lines()
}

/// Reads every artifact in `dir` into a report.
pub fn build_report(domain: &str, scan_date: &str, dir: &Path) -> io::Result<ReconReport> {
    let recon = ReconSection {
        live_hosts: lines_of(dir, StageId::Recon)?,
        open_ports: lines_of(dir, StageId::Ports)?,
        technologies: lines_of(dir, StageId::Tech)?,
        cloud_assets: lines_of(dir, StageId::Cloud)?,
        subdomain_takeovers: lines_of(dir, StageId::Takeover)?,
    };
    let discovery = DiscoverySection {
        hidden_directories: lines_of(dir, StageId::Dirscan)?,
        parameters: lines_of(dir, StageId::Params)?,
        crawled_urls_count: Artifact::in_dir(dir, MERGED_URLS).line_count()?,
    };
    let vulnerabilities = VulnerabilitySection {
        nuclei_general: lines_of(dir, StageId::Vulns)?,
        nuclei_context: lines_of(dir, StageId::ContextVulns)?,
        secrets_js: lines_of(dir, StageId::JsSecrets)?,
        secrets_trufflehog: lines_of(dir, StageId::Secrets)?,
        xss_dalfox: lines_of(dir, StageId::Xss)?,
    };

    let mut artifacts = BTreeMap::new();
    let names = StageId::ALL
        .iter()
        .map(|stage| stage.artifact())
        .chain(std::iter::once(MERGED_URLS));
    for name in names {
        let artifact = Artifact::in_dir(dir, name);
        if artifact.is_usable() {
            artifacts.insert(
                name.to_string(),
                ArtifactSummary {
                    lines: artifact.line_count()?,
                    sha256: artifact.fingerprint()?,
                },
            );
        }
    }

    Ok(ReconReport {
        target: domain.to_string(),
        scan_date: scan_date.to_string(),
        recon,
        discovery,
        vulnerabilities,
        artifacts,
    })
}

/// Writes `report` as pretty JSON to `path`.
pub fn write_report(report: &ReconReport, path: &Path) -> Result<(), ReconError> {
    let mut json = serde_json::to_vec_pretty(report)?;
    json.push(b'\n');
    fs::write(path, json)?;
    tracing::info!(
        path = %path.display(),
        artifacts = report.artifacts.len(),
        "Report written"
    );
    Ok(())
}
