//! Checkpoint/resume over the run directory.

use super::spec::StageId;
use crate::core::Artifact;
use std::path::{Path, PathBuf};

/// Decides which stages can be skipped because their artifact already exists.
///
/// Artifact content is never validated: a non-empty file is trusted.
#[derive(Debug, Clone)]
pub struct CheckpointManager {
    run_dir: PathBuf,
}

impl CheckpointManager {
    /// Creates a manager for `run_dir`.
    #[must_use]
    pub fn new(run_dir: impl Into<PathBuf>) -> Self {
        Self {
            run_dir: run_dir.into(),
        }
    }

    /// The run directory.
    #[must_use]
    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    /// The artifact `name` inside the run directory.
    #[must_use]
    pub fn artifact(&self, name: &str) -> Artifact {
        Artifact::in_dir(&self.run_dir, name)
    }

    /// The artifact of `stage`.
    #[must_use]
    pub fn stage_artifact(&self, stage: StageId) -> Artifact {
        self.artifact(stage.artifact())
    }

    /// True iff the stage artifact exists with non-zero size.
    #[must_use]
    pub fn should_skip(&self, stage: StageId) -> bool {
        self.stage_artifact(stage).is_usable()
    }
}
