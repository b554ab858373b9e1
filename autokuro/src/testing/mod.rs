//! Testing utilities for autokuro pipelines.
//!
//! This module provides:
//! - The bundled sample configuration and a ready-made [`RunContext`](crate::context::RunContext)
//! - A scripted [`CommandRunner`](crate::command::CommandRunner) that fakes tool output
//! - A notifier that records messages

mod fixtures;
mod mocks;

pub use fixtures::{sample_config, test_context, test_options, SAMPLE_CONFIG_YAML, TEST_DOMAIN};
pub use mocks::{RecordingNotifier, Script, ScriptedRunner};
