//! The fixed stage plan.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Merged URL list produced between discovery and scanning.
pub const MERGED_URLS: &str = "all_urls_clean.txt";

/// Aggregated report written at the end of a run.
pub const REPORT_FILE: &str = "final_report.json";

/// A stage of the reconnaissance pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageId {
    /// Subdomain enumeration piped into HTTP probing.
    Recon,
    /// Technology fingerprinting.
    Tech,
    /// Port scanning.
    Ports,
    /// Subdomain takeover checks.
    Takeover,
    /// Cloud asset enumeration.
    Cloud,
    /// Directory brute-forcing.
    Dirscan,
    /// Archived URL collection.
    Archive,
    /// Active crawling.
    Crawl,
    /// Parameter mining.
    Params,
    /// Token scanning over JavaScript files.
    JsSecrets,
    /// General vulnerability scanning.
    Vulns,
    /// Vulnerability scanning with detected technology tags.
    ContextVulns,
    /// Reflected XSS scanning.
    Xss,
    /// Secret scanning over the run directory.
    Secrets,
}

impl StageId {
    /// Every stage, in plan order.
    pub const ALL: [Self; 14] = [
        Self::Recon,
        Self::Tech,
        Self::Ports,
        Self::Takeover,
        Self::Cloud,
        Self::Dirscan,
        Self::Archive,
        Self::Crawl,
        Self::Params,
        Self::JsSecrets,
        Self::Vulns,
        Self::ContextVulns,
        Self::Xss,
        Self::Secrets,
    ];

    /// Stable name used in events, logs and failure records.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Recon => "recon",
            Self::Tech => "tech",
            Self::Ports => "ports",
            Self::Takeover => "takeover",
            Self::Cloud => "cloud",
            Self::Dirscan => "dirscan",
            Self::Archive => "archive",
            Self::Crawl => "crawl",
            Self::Params => "params",
            Self::JsSecrets => "js_secrets",
            Self::Vulns => "vulns",
            Self::ContextVulns => "context_vulns",
            Self::Xss => "xss",
            Self::Secrets => "secrets",
        }
    }

    /// Human-readable title used in alerts.
    #[must_use]
    pub fn title(self) -> &'static str {
        match self {
            Self::Recon => "Streamed Recon",
            Self::Tech => "Tech Detect",
            Self::Ports => "Port Scan",
            Self::Takeover => "Subdomain Takeover",
            Self::Cloud => "Cloud Assets",
            Self::Dirscan => "Dir Busting",
            Self::Archive => "Archive URLs",
            Self::Crawl => "Active Crawl",
            Self::Params => "Parameter Mining",
            Self::JsSecrets => "JS Secrets",
            Self::Vulns => "Nuclei Vulns",
            Self::ContextVulns => "Context Vulns",
            Self::Xss => "XSS Findings",
            Self::Secrets => "Trufflehog Secrets",
        }
    }

    /// The artifact whose presence marks the stage complete.
    #[must_use]
    pub fn artifact(self) -> &'static str {
        match self {
            Self::Recon => "live_hosts.txt",
            Self::Tech => "technology.txt",
            Self::Ports => "open_ports.txt",
            Self::Takeover => "takeover_results.txt",
            Self::Cloud => "cloud_enum_results.txt",
            Self::Dirscan => "hidden_dirs.txt",
            Self::Archive => "archive_urls.txt",
            Self::Crawl => "active_crawl.txt",
            Self::Params => "parameters.txt",
            Self::JsSecrets => "nuclei_report_secrets.txt",
            Self::Vulns => "nuclei_report.txt",
            Self::ContextVulns => "nuclei_report_context.txt",
            Self::Xss => "dalfox_xss.txt",
            Self::Secrets => "secrets_leak.txt",
        }
    }

    /// Every later stage depends on this one.
    #[must_use]
    pub fn is_critical(self) -> bool {
        matches!(self, Self::Recon)
    }

    /// Failures are throttled and retried.
    #[must_use]
    pub fn is_adaptive(self) -> bool {
        !matches!(self, Self::Recon | Self::Ports | Self::Dirscan)
    }

    /// A non-empty artifact is a finding worth alerting on.
    #[must_use]
    pub fn is_alert(self) -> bool {
        matches!(
            self,
            Self::Takeover
                | Self::Cloud
                | Self::JsSecrets
                | Self::Vulns
                | Self::ContextVulns
                | Self::Xss
                | Self::Secrets
        )
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One step of the plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanStep {
    /// Stages that run concurrently and are awaited together.
    Group {
        /// Step label.
        name: &'static str,
        /// The stages of the group.
        stages: Vec<StageId>,
    },
    /// Streams the artifacts of `sources` through the dedup store into
    /// [`MERGED_URLS`].
    Merge {
        /// Stages whose artifacts are merged.
        sources: Vec<StageId>,
    },
    /// Aggregates every artifact into [`REPORT_FILE`].
    Report,
}

impl PlanStep {
    /// Step label.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Group { name, .. } => name,
            Self::Merge { .. } => "URL Merge",
            Self::Report => "Report",
        }
    }
}

/// The standard seven-step plan.
#[must_use]
pub fn standard_plan() -> Vec<PlanStep> {
    vec![
        PlanStep::Group {
            name: "Streamed Recon",
            stages: vec![StageId::Recon],
        },
        PlanStep::Group {
            name: "Surface Mapping",
            stages: vec![StageId::Tech, StageId::Ports, StageId::Takeover, StageId::Cloud],
        },
        PlanStep::Group {
            name: "Content Discovery",
            stages: vec![StageId::Dirscan, StageId::Archive, StageId::Crawl, StageId::Params],
        },
        PlanStep::Merge {
            sources: vec![StageId::Archive, StageId::Crawl, StageId::Dirscan, StageId::Params],
        },
        PlanStep::Group {
            name: "Vulnerability Scanning",
            stages: vec![
                StageId::JsSecrets,
                StageId::Vulns,
                StageId::ContextVulns,
                StageId::Xss,
            ],
        },
        PlanStep::Group {
            name: "Secrets Check",
            stages: vec![StageId::Secrets],
        },
        PlanStep::Report,
    ]
}
