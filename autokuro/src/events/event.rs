//! Pipeline events.

use crate::core::SkipReason;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// Something observable that happened during a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PipelineEvent {
    /// The run directory was prepared and sequencing begins.
    RunStarted {
        /// Run id.
        run_id: Uuid,
        /// Target domain.
        domain: String,
        /// Mode name.
        mode: String,
        /// Hardware profile name.
        hardware: String,
        /// Run directory.
        target_dir: PathBuf,
    },
    /// A stage subprocess is about to be spawned.
    StageStarted {
        /// Stage name.
        stage: String,
        /// Rendered command line.
        command: String,
    },
    /// A stage resolved without spawning anything.
    StageSkipped {
        /// Stage name.
        stage: String,
        /// Why it was skipped.
        reason: SkipReason,
    },
    /// A stage subprocess succeeded.
    StageCompleted {
        /// Stage name.
        stage: String,
        /// Attempts used.
        attempts: u32,
        /// Wall time in milliseconds.
        duration_ms: u64,
    },
    /// A stage exhausted its attempts.
    StageFailed {
        /// Stage name.
        stage: String,
        /// Attempts used.
        attempts: u32,
        /// Terminal diagnostic.
        error: String,
    },
    /// An alert stage produced a non-empty artifact.
    StageFindings {
        /// Stage name.
        stage: String,
        /// Number of lines in the artifact.
        count: usize,
        /// Artifact file name.
        artifact: String,
    },
    /// A plan step finished.
    GroupCompleted {
        /// 1-based step index.
        step: usize,
        /// Number of steps in the plan.
        total: usize,
        /// Step label.
        name: String,
        /// Time since the run started, in milliseconds.
        elapsed_ms: u64,
        /// Cumulative size of the run directory.
        output_bytes: u64,
    },
    /// Every step resolved and the report was written.
    RunCompleted {
        /// Total wall time in milliseconds.
        duration_ms: u64,
        /// Tolerated stage failures.
        failures: usize,
        /// Report path.
        report: PathBuf,
    },
    /// The run aborted.
    RunFailed {
        /// Fatal diagnostic.
        error: String,
    },
}

impl PipelineEvent {
    /// Dotted event type, e.g. `stage.completed`.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::RunStarted { .. } => "run.started",
            Self::StageStarted { .. } => "stage.started",
            Self::StageSkipped { .. } => "stage.skipped",
            Self::StageCompleted { .. } => "stage.completed",
            Self::StageFailed { .. } => "stage.failed",
            Self::StageFindings { .. } => "stage.findings",
            Self::GroupCompleted { .. } => "group.completed",
            Self::RunCompleted { .. } => "run.completed",
            Self::RunFailed { .. } => "run.failed",
        }
    }

    /// The stage this event concerns, if any.
    #[must_use]
    pub fn stage(&self) -> Option<&str> {
        match self {
            Self::StageStarted { stage, .. }
            | Self::StageSkipped { stage, .. }
            | Self::StageCompleted { stage, .. }
            | Self::StageFailed { stage, .. }
            | Self::StageFindings { stage, .. } => Some(stage),
            _ => None,
        }
    }

    /// JSON representation.
    #[must_use]
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_and_json() {
        let event = PipelineEvent::StageSkipped {
            stage: "vulns".into(),
            reason: SkipReason::Checkpoint,
        };

        assert_eq!(event.event_type(), "stage.skipped");
        assert_eq!(event.stage(), Some("vulns"));
        assert_eq!(
            event.to_value(),
            serde_json::json!({"event": "stage_skipped", "stage": "vulns", "reason": "checkpoint"})
        );
    }

    #[test]
    fn test_run_events_have_no_stage() {
        let event = PipelineEvent::RunFailed {
            error: "no live hosts".into(),
        };
        assert_eq!(event.stage(), None);
        assert_eq!(event.event_type(), "run.failed");
    }
}
