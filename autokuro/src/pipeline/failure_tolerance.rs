//! Partial-failure bookkeeping.
//!
//! Only host discovery can abort a run. Every other stage failure is recorded
//! here and the run continues with whatever artifacts exist.

use crate::errors::ReconError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Record of a tolerated stage failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    /// Stage name.
    pub stage: String,
    /// Error message.
    pub error: String,
    /// Error type name.
    pub error_type: String,
    /// Attempts made before giving up.
    pub attempts: u32,
    /// Whether the run carried on.
    pub recoverable: bool,
}

impl FailureRecord {
    /// Creates a new failure record.
    #[must_use]
    pub fn new(stage: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            error: error.into(),
            error_type: "Error".to_string(),
            attempts: 0,
            recoverable: true,
        }
    }

    /// Creates a record from a stage error.
    #[must_use]
    pub fn from_error(stage: impl Into<String>, error: &ReconError) -> Self {
        let record = Self::new(stage, error.to_string()).with_error_type(error.error_type());
        if error.is_fatal() {
            record.fatal()
        } else {
            record
        }
    }

    /// Sets the error type.
    #[must_use]
    pub fn with_error_type(mut self, error_type: impl Into<String>) -> Self {
        self.error_type = error_type.into();
        self
    }

    /// Sets the attempt count.
    #[must_use]
    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    /// Marks the failure as having stopped the run.
    #[must_use]
    pub fn fatal(mut self) -> Self {
        self.recoverable = false;
        self
    }
}

/// Summary of stage and step outcomes for a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureSummary {
    /// Stages and steps that reached a terminal state.
    pub total_stages: usize,
    /// Stages that ran to completion.
    pub completed_stages: usize,
    /// Stages resolved without spawning anything.
    pub skipped_stages: usize,
    /// Stages that failed.
    pub failed_stages: usize,
    /// Failure records in the order they happened.
    pub failures: Vec<FailureRecord>,
}

impl FailureSummary {
    /// Returns true if any failures occurred.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    /// Fraction of tracked stages that did not fail.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn success_rate(&self) -> f64 {
        if self.total_stages == 0 {
            return 0.0;
        }
        (self.total_stages - self.failed_stages) as f64 / self.total_stages as f64
    }
}

/// Collects stage outcomes during a run.
#[derive(Debug, Default)]
pub struct FailureCollector {
    failures: Vec<FailureRecord>,
    failed_stages: BTreeSet<String>,
    completed_stages: BTreeSet<String>,
    skipped_stages: BTreeSet<String>,
}

impl FailureCollector {
    /// Creates an empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a stage failure.
    pub fn record_failure(&mut self, record: FailureRecord) {
        self.failed_stages.insert(record.stage.clone());
        self.failures.push(record);
    }

    /// Records a stage completion.
    pub fn record_completion(&mut self, stage: &str) {
        self.completed_stages.insert(stage.to_string());
    }

    /// Records a skipped stage.
    pub fn record_skip(&mut self, stage: &str) {
        self.skipped_stages.insert(stage.to_string());
    }

    /// Consumes the collector into a summary.
    ///
    /// Every name recorded once counts towards the total.
    #[must_use]
    pub fn into_summary(self) -> FailureSummary {
        FailureSummary {
            total_stages: self.completed_stages.len()
                + self.skipped_stages.len()
                + self.failed_stages.len(),
            completed_stages: self.completed_stages.len(),
            skipped_stages: self.skipped_stages.len(),
            failed_stages: self.failed_stages.len(),
            failures: self.failures,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_record_creation() {
        let record = FailureRecord::new("vulns", "error message")
            .with_error_type("StageTimeout")
            .with_attempts(3);

        assert_eq!(record.stage, "vulns");
        assert_eq!(record.error_type, "StageTimeout");
        assert_eq!(record.attempts, 3);
        assert!(record.recoverable);
    }

    #[test]
    fn test_record_from_error() {
        let optional = ReconError::StageTimeout {
            stage: "vulns".into(),
            timeout_secs: 60,
        };
        let record = FailureRecord::from_error("vulns", &optional);
        assert_eq!(record.error_type, "StageTimeout");
        assert!(record.recoverable);

        let critical = ReconError::CriticalStageFailure {
            stage: "recon".into(),
            reason: "no live hosts".into(),
        };
        assert!(!FailureRecord::from_error("recon", &critical).recoverable);
    }

    #[test]
    fn test_collector_summary() {
        let mut collector = FailureCollector::new();

        collector.record_completion("tech");
        collector.record_completion("ports");
        collector.record_skip("takeover");
        collector.record_failure(FailureRecord::new("cloud", "error"));

        let summary = collector.into_summary();

        assert_eq!(summary.total_stages, 4);
        assert_eq!(summary.completed_stages, 2);
        assert_eq!(summary.skipped_stages, 1);
        assert_eq!(summary.failed_stages, 1);
        assert!(summary.has_failures());
        assert_eq!(summary.failures[0].stage, "cloud");
        assert!((summary.success_rate() - 0.75).abs() < 0.001);
    }

    #[test]
    fn test_empty_summary() {
        let summary = FailureCollector::new().into_summary();

        assert!(!summary.has_failures());
        assert_eq!(summary.total_stages, 0);
        assert!(summary.success_rate().abs() < f64::EPSILON);
    }
}
