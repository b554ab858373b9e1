//! Fixtures shared by unit and integration tests.

use crate::config::ReconConfig;
use crate::context::{RunContext, RunOptions};
use crate::pipeline::RetryConfig;
use chrono::NaiveDate;
use std::path::Path;

/// The configuration shipped in `config/config.yaml`.
pub const SAMPLE_CONFIG_YAML: &str = include_str!("../../../config/config.yaml");

/// Domain used by [`test_context`].
pub const TEST_DOMAIN: &str = "example.com";

/// Parses [`SAMPLE_CONFIG_YAML`].
///
/// # Panics
///
/// Panics if the bundled configuration is invalid.
#[must_use]
#[allow(clippy::expect_used)]
pub fn sample_config() -> ReconConfig {
    ReconConfig::from_yaml_str(SAMPLE_CONFIG_YAML).expect("bundled config is valid")
}

/// Options for [`TEST_DOMAIN`] rooted at `output_root` with a fixed date.
///
/// # Panics
///
/// Never in practice; the date is a constant.
#[must_use]
#[allow(clippy::expect_used)]
pub fn test_options(output_root: &Path) -> RunOptions {
    RunOptions::new(TEST_DOMAIN)
        .with_output_root(output_root)
        .with_run_date(NaiveDate::from_ymd_opt(2024, 5, 17).expect("valid date"))
}

/// A `ranger`/`desktop` context under `output_root` with zero retry delay.
///
/// # Panics
///
/// Panics if the bundled configuration is invalid.
#[must_use]
#[allow(clippy::expect_used)]
pub fn test_context(output_root: &Path) -> RunContext {
    RunContext::new(test_options(output_root), &sample_config())
        .expect("sample options resolve")
        .with_retry_config(RetryConfig::immediate())
}
