//! The stage sequencer.
//!
//! Walks the plan step by step. Each group is fanned out through the
//! [`TaskScheduler`]; every stage is checkpointed, prepared, run through the
//! [`AdaptiveRetry`] controller and finalized. Only host discovery can abort
//! the run; all other failures are recorded and tolerated.

use super::checkpoint::CheckpointManager;
use super::failure_tolerance::{FailureCollector, FailureRecord, FailureSummary};
use super::retry::AdaptiveRetry;
use super::scheduler::{BatchTask, TaskScheduler};
use super::spec::{standard_plan, PlanStep, StageId, MERGED_URLS, REPORT_FILE};
use super::stages::{finalize, prepare, Preparation};
use crate::command::{CommandInvocation, CommandRunner};
use crate::context::RunContext;
use crate::core::{dir_size, Artifact, SkipReason, StageStatus};
use crate::dedup::{merge_artifacts, MergeStats};
use crate::errors::ReconError;
use crate::events::{EventSink, NoOpEventSink, PipelineEvent};
use crate::notify::{
    alert_message, failed_message, finished_message, notify_best_effort, started_message,
    NoOpNotifier, Notifier,
};
use crate::report::{build_report, write_report};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Terminal state of one stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageOutcome {
    /// The stage.
    pub stage: StageId,
    /// Terminal status.
    pub status: StageStatus,
    /// Attempts made; zero when skipped.
    pub attempts: u32,
    /// Wall time.
    pub duration: Duration,
    /// The stage artifact, when usable.
    pub artifact: Option<PathBuf>,
    /// Lines in the artifact of an alert stage.
    pub findings: usize,
    /// Terminal diagnostic of a failed stage.
    pub error: Option<String>,
}

impl StageOutcome {
    fn skipped(stage: StageId, reason: SkipReason, artifact: Option<PathBuf>) -> Self {
        Self {
            stage,
            status: StageStatus::Skipped(reason),
            attempts: 0,
            duration: Duration::ZERO,
            artifact,
            findings: 0,
            error: None,
        }
    }
}

/// Result of a run that was not aborted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    /// Run id.
    pub run_id: Uuid,
    /// Target domain.
    pub domain: String,
    /// Run directory.
    pub target_dir: PathBuf,
    /// One outcome per stage, in plan order.
    pub outcomes: Vec<StageOutcome>,
    /// Stage and step tallies with the tolerated failures.
    pub tolerance: FailureSummary,
    /// URL merge counters, when the merge ran in this run.
    pub merge: Option<MergeStats>,
    /// Report path, when it was written.
    pub report: Option<PathBuf>,
    /// Total wall time.
    pub duration: Duration,
}

impl RunSummary {
    /// The outcome of `stage`.
    #[must_use]
    pub fn outcome(&self, stage: StageId) -> Option<&StageOutcome> {
        self.outcomes.iter().find(|o| o.stage == stage)
    }

    /// Returns true if any stage failed.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.tolerance.has_failures()
    }

    /// Tolerated failures, in the order they happened.
    #[must_use]
    pub fn failures(&self) -> &[FailureRecord] {
        &self.tolerance.failures
    }

    /// Outcomes that spawned at least one process.
    pub fn executed(&self) -> impl Iterator<Item = &StageOutcome> {
        self.outcomes.iter().filter(|o| o.attempts > 0)
    }
}

/// Runs the plan for one [`RunContext`].
pub struct Sequencer {
    ctx: Arc<RunContext>,
    retry: AdaptiveRetry,
    scheduler: TaskScheduler,
    checkpoints: CheckpointManager,
    events: Arc<dyn EventSink>,
    notifier: Arc<dyn Notifier>,
    plan: Vec<PlanStep>,
}

impl std::fmt::Debug for Sequencer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sequencer")
            .field("domain", &self.ctx.domain)
            .field("target_dir", &self.ctx.target_dir)
            .field("max_parallel", &self.scheduler.max_parallel())
            .field("steps", &self.plan.len())
            .finish_non_exhaustive()
    }
}

impl Sequencer {
    /// Creates a sequencer running the standard plan through `runner`.
    #[must_use]
    pub fn new(ctx: Arc<RunContext>, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            retry: AdaptiveRetry::new(runner, ctx.retry.clone()),
            scheduler: TaskScheduler::new(ctx.hardware.max_parallel),
            checkpoints: CheckpointManager::new(ctx.target_dir.clone()),
            events: Arc::new(NoOpEventSink),
            notifier: Arc::new(NoOpNotifier),
            plan: standard_plan(),
            ctx,
        }
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.events = sink;
        self
    }

    /// Sets the notifier. Messages are only sent when the context enables it.
    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Replaces the plan.
    #[must_use]
    pub fn with_plan(mut self, plan: Vec<PlanStep>) -> Self {
        self.plan = plan;
        self
    }

    /// The run context.
    #[must_use]
    pub fn context(&self) -> &RunContext {
        &self.ctx
    }

    async fn notify(&self, message: String) {
        if self.ctx.notify {
            notify_best_effort(self.notifier.as_ref(), &message).await;
        }
    }

    /// Runs every step of the plan.
    ///
    /// Fails with [`ReconError::CriticalStageFailure`] when host discovery
    /// leaves no usable artifact, and with I/O errors when the run directory
    /// cannot be created. Every other failure ends up in the summary.
    pub async fn run(&self) -> Result<RunSummary, ReconError> {
        let started = Instant::now();
        let ctx = &self.ctx;

        tokio::fs::create_dir_all(&ctx.target_dir).await?;
        info!(
            run_id = %ctx.run_id,
            domain = %ctx.domain,
            mode = %ctx.mode.name,
            hardware = %ctx.hardware.name,
            target_dir = %ctx.target_dir.display(),
            "Starting run"
        );
        self.events
            .emit(&PipelineEvent::RunStarted {
                run_id: ctx.run_id,
                domain: ctx.domain.clone(),
                mode: ctx.mode.name.clone(),
                hardware: ctx.hardware.name.clone(),
                target_dir: ctx.target_dir.clone(),
            })
            .await;
        self.notify(started_message(&ctx.domain, &ctx.mode.name, &ctx.hardware.name))
            .await;

        let mut collector = FailureCollector::new();
        let mut outcomes = Vec::new();
        let mut merge = None;
        let mut report = None;
        let total = self.plan.len();

        for (index, step) in self.plan.iter().enumerate() {
            match step {
                PlanStep::Group { stages, .. } => {
                    let results = self.run_group(stages).await;
                    for outcome in results {
                        self.record(&mut collector, &outcome);
                        if outcome.stage.is_critical() {
                            self.check_critical(&outcome).await?;
                        }
                        outcomes.push(outcome);
                    }
                }
                PlanStep::Merge { sources } => match self.run_merge(sources).await {
                    Ok(stats) => {
                        if stats.is_some() {
                            collector.record_completion("merge");
                        } else {
                            collector.record_skip("merge");
                        }
                        merge = stats;
                    }
                    Err(e) => {
                        warn!(error = %e, "URL merge failed");
                        collector.record_failure(FailureRecord::from_error("merge", &e));
                    }
                },
                PlanStep::Report => match self.run_report().await {
                    Ok(path) => {
                        collector.record_completion("report");
                        report = Some(path);
                    }
                    Err(e) => {
                        warn!(error = %e, "Report generation failed");
                        collector.record_failure(FailureRecord::from_error("report", &e));
                    }
                },
            }

            self.events
                .emit(&PipelineEvent::GroupCompleted {
                    step: index + 1,
                    total,
                    name: step.name().to_string(),
                    elapsed_ms: millis(started.elapsed()),
                    output_bytes: dir_size(&ctx.target_dir),
                })
                .await;
        }

        let tolerance = collector.into_summary();
        let failures = tolerance.failures.len();
        let duration = started.elapsed();
        info!(
            duration_ms = millis(duration),
            completed = tolerance.completed_stages,
            skipped = tolerance.skipped_stages,
            failures,
            "Run complete"
        );
        self.events
            .emit(&PipelineEvent::RunCompleted {
                duration_ms: millis(duration),
                failures,
                report: ctx.target_dir.join(REPORT_FILE),
            })
            .await;
        self.notify(finished_message(&ctx.domain, failures)).await;

        Ok(RunSummary {
            run_id: ctx.run_id,
            domain: ctx.domain.clone(),
            target_dir: ctx.target_dir.clone(),
            outcomes,
            tolerance,
            merge,
            report,
            duration,
        })
    }

    fn record(&self, collector: &mut FailureCollector, outcome: &StageOutcome) {
        let name = outcome.stage.name();
        match outcome.status {
            StageStatus::Done => collector.record_completion(name),
            StageStatus::Skipped(_) => collector.record_skip(name),
            StageStatus::Failed if !outcome.stage.is_critical() => {
                let error = outcome.error.clone().unwrap_or_default();
                collector.record_failure(
                    FailureRecord::new(name, error)
                        .with_error_type("OptionalStageFailure")
                        .with_attempts(outcome.attempts),
                );
            }
            _ => {}
        }
    }

    async fn check_critical(&self, outcome: &StageOutcome) -> Result<(), ReconError> {
        let stage = outcome.stage;
        if self.checkpoints.should_skip(stage) {
            return Ok(());
        }
        let reason = outcome
            .error
            .clone()
            .unwrap_or_else(|| format!("{} is missing or empty", stage.artifact()));
        let err = ReconError::CriticalStageFailure {
            stage: stage.name().to_string(),
            reason,
        };
        error!(stage = %stage, error = %err, "Aborting run");
        self.events
            .emit(&PipelineEvent::RunFailed {
                error: err.to_string(),
            })
            .await;
        self.notify(failed_message(&self.ctx.domain, &err.to_string()))
            .await;
        Err(err)
    }

    async fn run_group(&self, stages: &[StageId]) -> Vec<StageOutcome> {
        let mut tasks = Vec::with_capacity(stages.len());

        for &stage in stages {
            if self.checkpoints.should_skip(stage) {
                debug!(stage = %stage, "Checkpoint found, skipping");
                let artifact = self.checkpoints.stage_artifact(stage).path().to_path_buf();
                tasks.push(self.resolve_skip(stage, SkipReason::Checkpoint, Some(artifact)).await);
                continue;
            }

            match prepare(stage, &self.ctx) {
                Ok(Preparation::Ready(invocation)) => {
                    tasks.push(BatchTask::admitted(self.execute(stage, invocation)));
                }
                Ok(Preparation::Skip(reason)) => {
                    debug!(stage = %stage, %reason, "Skipping");
                    tasks.push(self.resolve_skip(stage, reason, None).await);
                }
                Err(e) => {
                    let outcome = self
                        .fail(stage, 0, Duration::ZERO, ReconError::Io(e))
                        .await;
                    tasks.push(BatchTask::Ready(outcome));
                }
            }
        }

        self.scheduler.run_batch(tasks).await
    }

    async fn resolve_skip<'a>(
        &self,
        stage: StageId,
        reason: SkipReason,
        artifact: Option<PathBuf>,
    ) -> BatchTask<'a, StageOutcome> {
        self.events
            .emit(&PipelineEvent::StageSkipped {
                stage: stage.name().to_string(),
                reason,
            })
            .await;
        BatchTask::Ready(StageOutcome::skipped(stage, reason, artifact))
    }

    async fn execute(&self, stage: StageId, invocation: CommandInvocation) -> StageOutcome {
        let started = Instant::now();
        let max_retries = if stage.is_adaptive() {
            self.ctx.max_retries
        } else {
            0
        };

        info!(stage = %stage, command = %invocation, "Running stage");
        self.events
            .emit(&PipelineEvent::StageStarted {
                stage: stage.name().to_string(),
                command: invocation.to_string(),
            })
            .await;

        let outcome = self
            .retry
            .run_with_retry(invocation, stage.name(), self.ctx.stage_timeout, max_retries)
            .await;
        let attempts = outcome.attempts;

        let result = outcome
            .result
            .and_then(|()| finalize(stage, &self.ctx).map_err(ReconError::from));
        if let Err(e) = result {
            return self.fail(stage, attempts, started.elapsed(), e).await;
        }

        let duration = started.elapsed();
        self.events
            .emit(&PipelineEvent::StageCompleted {
                stage: stage.name().to_string(),
                attempts,
                duration_ms: millis(duration),
            })
            .await;

        let artifact = self.checkpoints.stage_artifact(stage);
        let findings = if stage.is_alert() && artifact.is_usable() {
            self.report_findings(stage, &artifact).await
        } else {
            0
        };

        StageOutcome {
            stage,
            status: StageStatus::Done,
            attempts,
            duration,
            artifact: artifact.is_usable().then(|| artifact.path().to_path_buf()),
            findings,
            error: None,
        }
    }

    async fn report_findings(&self, stage: StageId, artifact: &Artifact) -> usize {
        let count = match artifact.line_count() {
            Ok(count) => count,
            Err(e) => {
                warn!(stage = %stage, error = %e, "Cannot count findings");
                return 0;
            }
        };
        if count == 0 {
            return 0;
        }

        warn!(stage = %stage, count, artifact = artifact.file_name(), "Findings");
        self.events
            .emit(&PipelineEvent::StageFindings {
                stage: stage.name().to_string(),
                count,
                artifact: artifact.file_name().to_string(),
            })
            .await;
        self.notify(alert_message(
            &self.ctx.domain,
            stage.title(),
            count,
            artifact.file_name(),
        ))
        .await;
        count
    }

    async fn fail(
        &self,
        stage: StageId,
        attempts: u32,
        duration: Duration,
        err: ReconError,
    ) -> StageOutcome {
        // A partial artifact would pass as a checkpoint next time.
        if let Err(e) = self.checkpoints.stage_artifact(stage).remove() {
            warn!(stage = %stage, error = %e, "Cannot remove partial artifact");
        }

        let error = err.to_string();
        warn!(stage = %stage, attempts, error = %error, "Stage failed");
        self.events
            .emit(&PipelineEvent::StageFailed {
                stage: stage.name().to_string(),
                attempts,
                error: error.clone(),
            })
            .await;

        StageOutcome {
            stage,
            status: StageStatus::Failed,
            attempts,
            duration,
            artifact: None,
            findings: 0,
            error: Some(error),
        }
    }

    async fn run_merge(&self, sources: &[StageId]) -> Result<Option<MergeStats>, ReconError> {
        let output = self.checkpoints.artifact(MERGED_URLS);
        if output.is_usable() {
            debug!("Merged URL list found, skipping merge");
            return Ok(None);
        }

        let sources: Vec<Artifact> = sources
            .iter()
            .map(|&stage| self.checkpoints.stage_artifact(stage))
            .collect();
        let stats = tokio::task::spawn_blocking(move || merge_artifacts(&sources, &output))
            .await
            .map_err(io::Error::other)??;
        Ok(Some(stats))
    }

    async fn run_report(&self) -> Result<PathBuf, ReconError> {
        let domain = self.ctx.domain.clone();
        let scan_date = self.ctx.run_date_label();
        let dir = self.ctx.target_dir.clone();

        tokio::task::spawn_blocking(move || -> Result<PathBuf, ReconError> {
            let report = build_report(&domain, &scan_date, &dir)?;
            let path = dir.join(REPORT_FILE);
            write_report(&report, &path)?;
            Ok(path)
        })
        .await
        .map_err(io::Error::other)?
    }
}
