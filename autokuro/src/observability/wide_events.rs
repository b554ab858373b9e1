//! Wide events: one self-contained JSON payload per stage and per run.

use crate::context::RunContext;
use crate::pipeline::{RunSummary, StageOutcome};
use tracing::info;

/// Builds and logs wide event payloads.
#[derive(Debug, Clone)]
pub struct WideEventEmitter {
    /// Event type of stage payloads.
    pub stage_event_type: String,
    /// Event type of run payloads.
    pub run_event_type: String,
}

impl Default for WideEventEmitter {
    fn default() -> Self {
        Self {
            stage_event_type: "stage.wide".to_string(),
            run_event_type: "run.wide".to_string(),
        }
    }
}

impl WideEventEmitter {
    /// Creates an emitter with the default event types.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Payload describing one stage outcome.
    #[must_use]
    pub fn build_stage_payload(ctx: &RunContext, outcome: &StageOutcome) -> serde_json::Value {
        let mut payload = serde_json::json!({
            "run_id": ctx.run_id.to_string(),
            "domain": ctx.domain,
            "mode": ctx.mode.name,
            "hardware": ctx.hardware.name,
            "stage": outcome.stage.name(),
            "status": outcome.status.to_string(),
            "attempts": outcome.attempts,
            "duration_ms": u64::try_from(outcome.duration.as_millis()).unwrap_or(u64::MAX),
        });

        if let Some(ref artifact) = outcome.artifact {
            payload["artifact"] = serde_json::json!(artifact.display().to_string());
        }
        if outcome.findings > 0 {
            payload["findings"] = serde_json::json!(outcome.findings);
        }
        if let Some(ref err) = outcome.error {
            payload["error"] = serde_json::json!(err);
        }

        payload
    }

    /// Payload describing a finished run.
    #[must_use]
    pub fn build_run_payload(ctx: &RunContext, summary: &RunSummary) -> serde_json::Value {
        let count = |pred: fn(&StageOutcome) -> bool| summary.outcomes.iter().filter(|o| pred(o)).count();
        let failed: Vec<&str> = summary.failures().iter().map(|f| f.stage.as_str()).collect();

        let mut payload = serde_json::json!({
            "run_id": summary.run_id.to_string(),
            "domain": summary.domain,
            "mode": ctx.mode.name,
            "hardware": ctx.hardware.name,
            "target_dir": summary.target_dir.display().to_string(),
            "stages": summary.outcomes.len(),
            "executed": summary.executed().count(),
            "skipped": count(|o| matches!(o.status, crate::core::StageStatus::Skipped(_))),
            "failed": failed,
            "success_rate": summary.tolerance.success_rate(),
            "findings": summary.outcomes.iter().map(|o| o.findings).sum::<usize>(),
            "duration_ms": u64::try_from(summary.duration.as_millis()).unwrap_or(u64::MAX),
        });

        if let Some(ref merge) = summary.merge {
            payload["merged_urls"] = serde_json::json!(merge.written);
        }
        if let Some(ref report) = summary.report {
            payload["report"] = serde_json::json!(report.display().to_string());
        }

        payload
    }

    /// Logs one wide event per stage and one for the run.
    pub fn emit(&self, ctx: &RunContext, summary: &RunSummary) {
        for outcome in &summary.outcomes {
            let payload = Self::build_stage_payload(ctx, outcome);
            info!(event_type = %self.stage_event_type, payload = %payload, "Wide event");
        }
        let payload = Self::build_run_payload(ctx, summary);
        info!(event_type = %self.run_event_type, payload = %payload, "Wide event");
    }
}
