//! Core domain model types for autokuro.
//!
//! This module contains the fundamental types used throughout the engine:
//! - Stage status and skip reasons
//! - Line-oriented artifact files

mod artifact;
mod status;

pub use artifact::{dir_size, Artifact, ArtifactLines};
pub use status::{SkipReason, StageStatus};
