//! The immutable run context.

use super::options::{validate_domain, RunOptions};
use crate::command::Modifiers;
use crate::config::{HardwareProfile, ModeFlags, ReconConfig};
use crate::core::Artifact;
use crate::errors::ConfigError;
use crate::pipeline::RetryConfig;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use uuid::Uuid;

/// Everything a run needs, resolved once before the first stage.
///
/// Mode flags are already scaled by the hardware multiplier. The context is
/// shared through `Arc` and never mutated.
#[derive(Debug, Clone)]
pub struct RunContext {
    /// Unique id of this run.
    pub run_id: Uuid,
    /// Normalized target domain.
    pub domain: String,
    /// Root of the results tree.
    pub output_root: PathBuf,
    /// `<output_root>/<domain>/<run_date>`.
    pub target_dir: PathBuf,
    /// Date component of the run directory.
    pub run_date: NaiveDate,
    /// Scaled tool flags.
    pub mode: ModeFlags,
    /// Hardware profile.
    pub hardware: HardwareProfile,
    /// Timeout applied to every stage.
    pub stage_timeout: Duration,
    /// Retry budget for adaptive stages.
    pub max_retries: u32,
    /// Backoff between attempts.
    pub retry: RetryConfig,
    /// Proxy and cookie injection.
    pub modifiers: Modifiers,
    /// Preferred directory wordlist.
    pub wordlist_path: PathBuf,
    /// Wordlist used when the preferred one is missing.
    pub wordlist_fallback: Option<PathBuf>,
    /// Keywords that mark hosts worth brute-forcing.
    pub priority_keywords: Vec<String>,
    /// Technology keyword to nuclei tags.
    pub tech_tags: BTreeMap<String, String>,
    /// Send notifications.
    pub notify: bool,
}

impl RunContext {
    /// Resolves `options` against `config`.
    pub fn new(options: RunOptions, config: &ReconConfig) -> Result<Self, ConfigError> {
        let domain = validate_domain(&options.domain)?;
        let hardware = config.hardware_profile(&options.hardware)?;
        let mode = config.mode(&options.mode)?.scaled(hardware.multiplier);

        let run_date = options
            .run_date
            .unwrap_or_else(|| chrono::Local::now().date_naive());
        let target_dir = options
            .output_root
            .join(&domain)
            .join(run_date.format("%Y-%m-%d").to_string());

        let mut modifiers = Modifiers::none();
        if let Some(proxy) = options.proxy.filter(|p| !p.trim().is_empty()) {
            modifiers = modifiers.with_proxy(proxy);
        }
        if let Some(cookie) = options.cookie.filter(|c| !c.trim().is_empty()) {
            modifiers = modifiers.with_cookie(cookie);
        }

        Ok(Self {
            run_id: Uuid::new_v4(),
            domain,
            output_root: options.output_root,
            target_dir,
            run_date,
            mode,
            hardware,
            stage_timeout: config.stage_timeout(),
            max_retries: config.max_retries,
            retry: config.retry_config(),
            modifiers,
            wordlist_path: config.wordlist_path.clone(),
            wordlist_fallback: config.wordlist_fallback.clone(),
            priority_keywords: config.priority_keywords(),
            tech_tags: config.tech_tags.clone(),
            notify: options.notify,
        })
    }

    /// Replaces the backoff settings.
    #[must_use]
    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.max_retries = retry.max_retries;
        self.retry = retry;
        self
    }

    /// Replaces the per-stage timeout.
    #[must_use]
    pub fn with_stage_timeout(mut self, timeout: Duration) -> Self {
        self.stage_timeout = timeout;
        self
    }

    /// The run directory.
    #[must_use]
    pub fn target_dir(&self) -> &Path {
        &self.target_dir
    }

    /// The artifact `name` inside the run directory.
    #[must_use]
    pub fn artifact(&self, name: &str) -> Artifact {
        Artifact::in_dir(&self.target_dir, name)
    }

    /// The run date as used in directory names and the report.
    #[must_use]
    pub fn run_date_label(&self) -> String {
        self.run_date.format("%Y-%m-%d").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::ToolFamily;
    use crate::testing::SAMPLE_CONFIG_YAML;
    use pretty_assertions::assert_eq;

    fn config() -> ReconConfig {
        ReconConfig::from_yaml_str(SAMPLE_CONFIG_YAML).unwrap()
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 17).unwrap()
    }

    #[test]
    fn test_target_dir_layout() {
        let ctx = RunContext::new(
            RunOptions::new("Example.com")
                .with_output_root("/tmp/results")
                .with_run_date(date()),
            &config(),
        )
        .unwrap();

        assert_eq!(ctx.domain, "example.com");
        assert_eq!(ctx.target_dir, PathBuf::from("/tmp/results/example.com/2024-05-17"));
        assert_eq!(ctx.run_date_label(), "2024-05-17");
        assert_eq!(
            ctx.artifact("live_hosts.txt").path(),
            Path::new("/tmp/results/example.com/2024-05-17/live_hosts.txt")
        );
    }

    #[test]
    fn test_hardware_scaling_applied() {
        let ctx = RunContext::new(
            RunOptions::new("example.com")
                .with_hardware("mobile")
                .with_run_date(date()),
            &config(),
        )
        .unwrap();

        assert_eq!(ctx.hardware.max_parallel, 2);
        assert_eq!(ctx.mode.nuclei.tunable_value("-rl"), Some(75));
        assert_eq!(ctx.stage_timeout, Duration::from_secs(3600));
        assert_eq!(ctx.max_retries, 2);
    }

    #[test]
    fn test_modifiers_from_options() {
        let ctx = RunContext::new(
            RunOptions::new("example.com")
                .with_proxy("http://127.0.0.1:8080")
                .with_cookie("  ")
                .with_run_date(date()),
            &config(),
        )
        .unwrap();

        assert_eq!(ctx.modifiers.proxy.as_deref(), Some("http://127.0.0.1:8080"));
        assert!(ctx.modifiers.cookie.is_none());
        assert_eq!(
            ctx.modifiers.args_for(ToolFamily::Nuclei),
            vec!["-proxy", "http://127.0.0.1:8080"]
        );
    }

    #[test]
    fn test_unknown_mode_fails() {
        let err = RunContext::new(RunOptions::new("example.com").with_mode("turbo"), &config())
            .unwrap_err();
        assert_eq!(err.key.as_deref(), Some("modes.turbo"));
    }

    #[test]
    fn test_invalid_domain_fails() {
        let err = RunContext::new(RunOptions::new("not a domain"), &config()).unwrap_err();
        assert_eq!(err.key.as_deref(), Some("domain"));
    }
}
