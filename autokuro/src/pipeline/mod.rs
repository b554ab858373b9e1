//! Pipeline planning and execution.
//!
//! This module provides:
//! - The stage catalogue and the fixed execution plan
//! - Per-stage command preparation and post-processing
//! - Checkpointing against existing artifacts
//! - Adaptive throttle-and-retry
//! - Bounded-concurrency group scheduling
//! - The sequencer tying it all together

mod checkpoint;
mod failure_tolerance;
mod integration_tests;
mod retry;
mod scheduler;
mod sequencer;
mod spec;
mod stages;

pub use checkpoint::CheckpointManager;
pub use failure_tolerance::{FailureCollector, FailureRecord, FailureSummary};
pub use retry::{
    should_retry, AdaptiveRetry, BackoffStrategy, GiveUpReason, JitterStrategy, RetryConfig,
    RetryDecision, RetryOutcome, RetryState,
};
pub use scheduler::{BatchTask, TaskScheduler};
pub use sequencer::{RunSummary, Sequencer, StageOutcome};
pub use spec::{standard_plan, PlanStep, StageId, MERGED_URLS, REPORT_FILE};
pub use stages::{finalize, prepare, Preparation, DALFOX_TARGETS, FEROX_RAW, JS_FILES};
