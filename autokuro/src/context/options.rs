//! Operator-supplied run options.

use crate::errors::ConfigError;
use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::OnceLock;

static DOMAIN_PATTERN: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();

fn domain_pattern() -> &'static Result<Regex, regex::Error> {
    DOMAIN_PATTERN.get_or_init(|| {
        Regex::new(r"^([a-z0-9]([a-z0-9-]{0,61}[a-z0-9])?\.)+[a-z0-9][a-z0-9-]{0,61}[a-z0-9]$")
    })
}

/// Normalizes and validates a target domain.
///
/// The domain is trimmed and lowercased. It must be a bare hostname: no
/// scheme, path, port or whitespace, since it ends up in file paths and
/// tool arguments.
pub fn validate_domain(domain: &str) -> Result<String, ConfigError> {
    let domain = domain.trim().trim_end_matches('.').to_lowercase();
    let pattern = domain_pattern()
        .as_ref()
        .map_err(|e| ConfigError::new(format!("domain pattern: {e}")))?;

    if domain.len() <= 253 && pattern.is_match(&domain) {
        Ok(domain)
    } else {
        Err(ConfigError::new(format!("'{domain}' is not a valid domain name")).with_key("domain"))
    }
}

/// What the operator asked for on the command line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOptions {
    /// Target domain.
    pub domain: String,
    /// Root of the results tree.
    pub output_root: PathBuf,
    /// Mode name in the configuration.
    pub mode: String,
    /// Hardware profile name in the configuration.
    pub hardware: String,
    /// Cookie injected into tools that accept one.
    pub cookie: Option<String>,
    /// Proxy injected into tools that accept one.
    pub proxy: Option<String>,
    /// Send Telegram notifications.
    pub notify: bool,
    /// Date used for the run directory; today when unset.
    pub run_date: Option<NaiveDate>,
}

impl RunOptions {
    /// Options with the usual defaults for `domain`.
    #[must_use]
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            output_root: PathBuf::from("results"),
            mode: "ranger".to_string(),
            hardware: "desktop".to_string(),
            cookie: None,
            proxy: None,
            notify: false,
            run_date: None,
        }
    }

    /// Sets the results root.
    #[must_use]
    pub fn with_output_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.output_root = root.into();
        self
    }

    /// Sets the mode.
    #[must_use]
    pub fn with_mode(mut self, mode: impl Into<String>) -> Self {
        self.mode = mode.into();
        self
    }

    /// Sets the hardware profile.
    #[must_use]
    pub fn with_hardware(mut self, hardware: impl Into<String>) -> Self {
        self.hardware = hardware.into();
        self
    }

    /// Sets the cookie.
    #[must_use]
    pub fn with_cookie(mut self, cookie: impl Into<String>) -> Self {
        self.cookie = Some(cookie.into());
        self
    }

    /// Sets the proxy.
    #[must_use]
    pub fn with_proxy(mut self, proxy: impl Into<String>) -> Self {
        self.proxy = Some(proxy.into());
        self
    }

    /// Enables notifications.
    #[must_use]
    pub fn with_notify(mut self, notify: bool) -> Self {
        self.notify = notify;
        self
    }

    /// Pins the run date.
    #[must_use]
    pub fn with_run_date(mut self, date: NaiveDate) -> Self {
        self.run_date = Some(date);
        self
    }
}
