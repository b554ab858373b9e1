//! The YAML configuration document.

use super::mode::{check_table, ModeFlags};
use crate::errors::ConfigError;
use crate::pipeline::{BackoffStrategy, JitterStrategy, RetryConfig};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default location of the configuration file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "config/config.yaml";

/// Default keywords used to pick directory brute-force targets.
pub const DEFAULT_PRIORITY_KEYWORDS: &[&str] = &["admin", "login", "api", "dev"];

fn default_global_timeout() -> u64 {
    3600
}

fn default_max_retries() -> u32 {
    2
}

fn default_max_parallel() -> usize {
    4
}

/// One hardware profile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HardwareProfileConfig {
    /// Multiplier applied to every tunable flag.
    pub multiplier: f64,
    /// Size of the admission gate.
    #[serde(default = "default_max_parallel")]
    pub max_parallel: usize,
}

/// Telegram delivery settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Bot API token.
    pub bot_token: String,
    /// Destination chat id.
    pub chat_id: String,
}

impl TelegramConfig {
    /// Returns true when both token and chat id are set.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        !self.bot_token.trim().is_empty() && !self.chat_id.trim().is_empty()
    }
}

/// Delay policy between retry attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    /// How the delay grows with each retry.
    pub strategy: BackoffStrategy,
    /// Randomisation applied to the delay.
    pub jitter: JitterStrategy,
    /// Delay before the first retry, in milliseconds.
    pub base_delay_ms: u64,
    /// Upper bound on any delay, in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        let retry = RetryConfig::default();
        Self {
            strategy: retry.backoff_strategy,
            jitter: retry.jitter_strategy,
            base_delay_ms: retry.base_delay_ms,
            max_delay_ms: retry.max_delay_ms,
        }
    }
}

/// The full configuration document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconConfig {
    /// Flag presets keyed by mode name, then stage key.
    pub modes: BTreeMap<String, BTreeMap<String, String>>,
    /// Hardware profiles keyed by name.
    pub hardware: BTreeMap<String, HardwareProfileConfig>,
    /// Primary directory wordlist.
    pub wordlist_path: PathBuf,
    /// Wordlist used when the primary is absent.
    #[serde(default)]
    pub wordlist_fallback: Option<PathBuf>,
    /// Keywords marking high-value hosts for directory brute forcing.
    #[serde(default)]
    pub priority_keywords: Vec<String>,
    /// Per-stage timeout in seconds.
    #[serde(default = "default_global_timeout")]
    pub global_timeout: u64,
    /// Extra attempts for adaptive stages.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Delay between attempts.
    #[serde(default)]
    pub backoff: BackoffConfig,
    /// Technology keyword to comma-separated nuclei tags.
    #[serde(default)]
    pub tech_tags: BTreeMap<String, String>,
    /// Notification settings.
    #[serde(default)]
    pub telegram: TelegramConfig,
}

impl ReconConfig {
    /// Reads, parses and validates the file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ConfigError::new(format!("cannot read {}: {e}", path.display()))
                .with_key(path.display().to_string())
        })?;
        let config = Self::from_yaml_str(&content)?;
        tracing::debug!(
            path = %path.display(),
            modes = config.modes.len(),
            profiles = config.hardware.len(),
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Parses and validates a YAML document.
    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(content)
            .map_err(|e| ConfigError::new(format!("malformed YAML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks every mode and profile, reporting all problems at once.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut problems = Vec::new();

        if self.modes.is_empty() {
            problems.push("at least one mode must be defined under 'modes'".to_string());
        }
        for (name, table) in &self.modes {
            problems.extend(check_table(name, table));
        }

        if self.hardware.is_empty() {
            problems.push("at least one profile must be defined under 'hardware'".to_string());
        }
        for (name, profile) in &self.hardware {
            if !profile.multiplier.is_finite() || profile.multiplier <= 0.0 {
                problems.push(format!("hardware.{name}.multiplier must be a positive number"));
            }
            if profile.max_parallel == 0 {
                problems.push(format!("hardware.{name}.max_parallel must be greater than 0"));
            }
        }

        if self.global_timeout == 0 {
            problems.push("global_timeout must be greater than 0".to_string());
        }
        if self.backoff.base_delay_ms > self.backoff.max_delay_ms {
            problems.push("backoff.base_delay_ms must not exceed backoff.max_delay_ms".to_string());
        }
        if self.wordlist_path.as_os_str().is_empty() {
            problems.push("wordlist_path must not be empty".to_string());
        }
        for (tech, tags) in &self.tech_tags {
            if tags.split(',').all(|t| t.trim().is_empty()) {
                problems.push(format!("tech_tags.{tech} must list at least one tag"));
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::new("invalid configuration").with_problems(problems))
        }
    }

    /// Returns the typed flags of mode `name`.
    pub fn mode(&self, name: &str) -> Result<ModeFlags, ConfigError> {
        let table = self.modes.get(name).ok_or_else(|| {
            ConfigError::new(format!(
                "unknown mode '{name}' (available: {})",
                join_keys(self.modes.keys())
            ))
            .with_key(format!("modes.{name}"))
        })?;
        ModeFlags::from_table(name, table)
    }

    /// Returns hardware profile `name`.
    pub fn hardware_profile(&self, name: &str) -> Result<HardwareProfile, ConfigError> {
        let profile = self.hardware.get(name).ok_or_else(|| {
            ConfigError::new(format!(
                "unknown hardware profile '{name}' (available: {})",
                join_keys(self.hardware.keys())
            ))
            .with_key(format!("hardware.{name}"))
        })?;
        Ok(HardwareProfile {
            name: name.to_string(),
            multiplier: profile.multiplier,
            max_parallel: profile.max_parallel,
        })
    }

    /// Priority keywords, falling back to the defaults when none are set.
    #[must_use]
    pub fn priority_keywords(&self) -> Vec<String> {
        if self.priority_keywords.is_empty() {
            DEFAULT_PRIORITY_KEYWORDS.iter().map(ToString::to_string).collect()
        } else {
            self.priority_keywords.iter().map(|k| k.to_lowercase()).collect()
        }
    }

    /// The per-stage timeout.
    #[must_use]
    pub fn stage_timeout(&self) -> Duration {
        Duration::from_secs(self.global_timeout)
    }

    /// Retry budget and backoff for adaptive stages.
    #[must_use]
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::new()
            .with_max_retries(self.max_retries)
            .with_backoff(self.backoff.strategy)
            .with_jitter(self.backoff.jitter)
            .with_base_delay_ms(self.backoff.base_delay_ms)
            .with_max_delay_ms(self.backoff.max_delay_ms)
    }
}

fn join_keys<'a>(keys: impl Iterator<Item = &'a String>) -> String {
    keys.map(String::as_str).collect::<Vec<_>>().join(", ")
}

/// A resolved hardware profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HardwareProfile {
    /// Profile name.
    pub name: String,
    /// Tunable multiplier.
    pub multiplier: f64,
    /// Admission gate size.
    pub max_parallel: usize,
}

impl Default for HardwareProfile {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            multiplier: 1.0,
            max_parallel: default_max_parallel(),
        }
    }
}
