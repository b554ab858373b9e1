//! # AutoKuro
//!
//! Orchestration engine for a fixed, multi-stage reconnaissance pipeline.
//!
//! AutoKuro runs a sequence of external scanners against one target domain
//! and provides:
//!
//! - **Checkpoint/resume**: a stage whose artifact already exists with
//!   non-zero size is never run again
//! - **Bounded fan-out**: independent stages run as a batch behind a FIFO
//!   admission gate sized by the hardware profile
//! - **Adaptive retry**: failing scanners are retried with reduced rate and
//!   concurrency flags
//! - **Streaming dedup**: crawler outputs are merged into one sorted,
//!   junk-filtered URL list
//! - **Partial-failure tolerance**: only host discovery can abort a run
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use autokuro::prelude::*;
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! let config = ReconConfig::load(Path::new("config/config.yaml"))?;
//! let ctx = RunContext::new(RunOptions::new("example.com"), &config)?;
//!
//! let summary = Sequencer::new(Arc::new(ctx), Arc::new(ProcessRunner::new()))
//!     .with_event_sink(Arc::new(LoggingEventSink::default()))
//!     .run()
//!     .await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod command;
pub mod config;
pub mod context;
pub mod core;
pub mod dedup;
pub mod deps;
pub mod errors;
pub mod events;
pub mod notify;
pub mod observability;
pub mod pipeline;
pub mod report;
pub mod targets;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::command::{
        CommandInvocation, CommandRunner, FlagSet, Modifiers, ProcessRunner, ProcessSpec,
        RunFailure,
    };
    pub use crate::config::{HardwareProfile, ModeFlags, ReconConfig};
    pub use crate::context::{RunContext, RunOptions};
    pub use crate::core::{Artifact, SkipReason, StageStatus};
    pub use crate::dedup::{merge_artifacts, MergeStats, UrlDedupStore};
    pub use crate::deps::{check_dependencies, REQUIRED_TOOLS};
    pub use crate::errors::{ConfigError, ReconError};
    pub use crate::events::{
        CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink, PipelineEvent,
    };
    pub use crate::notify::{NoOpNotifier, Notifier};
    pub use crate::pipeline::{
        AdaptiveRetry, RetryConfig, RunSummary, Sequencer, StageId, StageOutcome, TaskScheduler,
    };
    pub use crate::report::{build_report, ReconReport};
}
