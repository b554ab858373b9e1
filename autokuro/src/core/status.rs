//! Stage status and skip reasons.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a stage did not spawn a subprocess.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The stage artifact already exists with non-zero size.
    Checkpoint,
    /// The upstream artifact this stage consumes is absent or empty.
    NoInput,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Checkpoint => write!(f, "checkpoint"),
            Self::NoInput => write!(f, "no input"),
        }
    }
}

/// The execution status of a stage.
///
/// `Pending -> (Skipped | Running -> (Done | Failed))`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    /// Stage has not been considered yet.
    Pending,
    /// Stage was satisfied without spawning anything.
    Skipped(SkipReason),
    /// Stage subprocess is in flight.
    Running,
    /// Stage subprocess completed successfully.
    Done,
    /// Stage exhausted its attempts.
    Failed,
}

impl Default for StageStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Skipped(reason) => write!(f, "skipped ({reason})"),
            Self::Running => write!(f, "running"),
            Self::Done => write!(f, "done"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl StageStatus {
    /// Returns true if the status represents a terminal state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Skipped(_) | Self::Done | Self::Failed)
    }

    /// Returns true if the stage resolved without failing.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Skipped(_) | Self::Done)
    }

    /// Returns true if the stage failed.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed)
    }

    /// Returns true if a transition to `next` is allowed.
    #[must_use]
    pub fn can_transition_to(&self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Skipped(_) | Self::Running)
                | (Self::Running, Self::Done | Self::Failed)
        )
    }
}
