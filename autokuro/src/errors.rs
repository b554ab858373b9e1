//! Error types for the autokuro engine.
//!
//! Fatal kinds (`Config`, `DependencyMissing`, `CriticalStageFailure`) end a
//! run before or during sequencing. Stage-level kinds are produced by the
//! retry controller and only ever reach the sequencer as a tolerated outcome.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// The main error type for autokuro operations.
#[derive(Debug, Error)]
pub enum ReconError {
    /// Configuration was missing or malformed.
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// One or more required external tools are not installed.
    #[error("Missing dependencies: {}", .tools.join(", "))]
    DependencyMissing {
        /// The binaries that could not be found on `PATH`.
        tools: Vec<String>,
    },

    /// A subprocess exceeded its allotted time.
    #[error("Stage '{stage}' timed out after {timeout_secs}s")]
    StageTimeout {
        /// The stage name.
        stage: String,
        /// The timeout that elapsed.
        timeout_secs: u64,
    },

    /// A subprocess reported failure through its exit status.
    #[error("Stage '{stage}' exited with {}: {stderr}", .code.map_or_else(|| "signal".to_string(), |c| format!("status {c}")))]
    StageNonZeroExit {
        /// The stage name.
        stage: String,
        /// Exit code, `None` when killed by a signal.
        code: Option<i32>,
        /// Captured (truncated) stderr.
        stderr: String,
    },

    /// A subprocess could not be started at all.
    #[error("Stage '{stage}' could not be spawned: {reason}")]
    StageSpawn {
        /// The stage name.
        stage: String,
        /// The underlying OS error.
        reason: String,
    },

    /// The host-discovery stage produced no usable artifact.
    #[error("Critical stage '{stage}' produced no usable artifact: {reason}")]
    CriticalStageFailure {
        /// The stage name.
        stage: String,
        /// Why the stage is considered failed.
        reason: String,
    },

    /// Any other stage exhausted its retries.
    #[error("Stage '{stage}' failed: {reason}")]
    OptionalStageFailure {
        /// The stage name.
        stage: String,
        /// The terminal diagnostic.
        reason: String,
    },

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ReconError {
    /// Returns true if this error must terminate the whole run.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::DependencyMissing { .. } | Self::CriticalStageFailure { .. }
        )
    }

    /// Returns true if throttling and retrying could plausibly help.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StageTimeout { .. } | Self::StageNonZeroExit { .. })
    }

    /// A stable type name used in failure records and reports.
    #[must_use]
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::Config(_) => "ConfigError",
            Self::DependencyMissing { .. } => "DependencyMissing",
            Self::StageTimeout { .. } => "StageTimeout",
            Self::StageNonZeroExit { .. } => "StageNonZeroExit",
            Self::StageSpawn { .. } => "StageSpawn",
            Self::CriticalStageFailure { .. } => "CriticalStageFailure",
            Self::OptionalStageFailure { .. } => "OptionalStageFailure",
            Self::Serialization(_) => "Serialization",
            Self::Io(_) => "Io",
        }
    }
}

impl From<serde_json::Error> for ReconError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Error raised when configuration cannot be loaded or fails validation.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[error("Configuration error: {message}{}", render_problems(.problems))]
pub struct ConfigError {
    /// The error message.
    pub message: String,
    /// The offending configuration key, when a single key is at fault.
    pub key: Option<String>,
    /// Every validation problem found.
    #[serde(default)]
    pub problems: Vec<String>,
}

fn render_problems(problems: &[String]) -> String {
    if problems.is_empty() {
        String::new()
    } else {
        format!(" ({})", problems.join("; "))
    }
}

impl ConfigError {
    /// Creates a new configuration error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            key: None,
            problems: Vec::new(),
        }
    }

    /// Sets the offending key.
    #[must_use]
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Sets the list of validation problems.
    #[must_use]
    pub fn with_problems(mut self, problems: Vec<String>) -> Self {
        self.problems = problems;
        self
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("message".to_string(), serde_json::json!(self.message));
        if let Some(ref key) = self.key {
            map.insert("key".to_string(), serde_json::json!(key));
        }
        if !self.problems.is_empty() {
            map.insert("problems".to_string(), serde_json::json!(self.problems));
        }
        map
    }
}
