//! Final JSON report.
//!
//! Every artifact of a run directory is folded into one [`ReconReport`],
//! written as `final_report.json`. The output depends only on the artifact
//! contents and the run date, so re-running over unchanged artifacts yields
//! a byte-identical file.

mod aggregate;

pub use aggregate::{
    build_report, write_report, ArtifactSummary, DiscoverySection, ReconReport, ReconSection,
    VulnerabilitySection,
};
