//! Proxy and cookie injection.
//!
//! Each tool spells these options differently. Modifiers are applied per
//! invocation as extra arguments; configured base flags are never edited.

use super::invocation::ProcessSpec;
use serde::{Deserialize, Serialize};

/// The class of external tool, deciding how modifiers are spelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolFamily {
    /// `httpx` / `httpx-toolkit`.
    Httpx,
    /// `nuclei`.
    Nuclei,
    /// `katana`.
    Katana,
    /// `feroxbuster`.
    Feroxbuster,
    /// `gau`.
    Gau,
    /// `dalfox`.
    Dalfox,
    /// Any tool that takes no modifiers.
    Other,
}

impl ToolFamily {
    /// Classifies a program name.
    #[must_use]
    pub fn from_program(program: &str) -> Self {
        let name = program.rsplit('/').next().unwrap_or(program);
        match name {
            "httpx" | "httpx-toolkit" => Self::Httpx,
            "nuclei" => Self::Nuclei,
            "katana" => Self::Katana,
            "feroxbuster" => Self::Feroxbuster,
            "gau" => Self::Gau,
            "dalfox" => Self::Dalfox,
            _ => Self::Other,
        }
    }
}

/// Session-wide proxy and cookie settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modifiers {
    /// Upstream HTTP proxy URL.
    pub proxy: Option<String>,
    /// Raw cookie header value.
    pub cookie: Option<String>,
}

impl Modifiers {
    /// Creates modifiers that inject nothing.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Sets the proxy.
    #[must_use]
    pub fn with_proxy(mut self, proxy: impl Into<String>) -> Self {
        self.proxy = Some(proxy.into());
        self
    }

    /// Sets the cookie.
    #[must_use]
    pub fn with_cookie(mut self, cookie: impl Into<String>) -> Self {
        self.cookie = Some(cookie.into());
        self
    }

    /// Returns true if no modifier is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.proxy.is_none() && self.cookie.is_none()
    }

    /// Extra arguments for `family`.
    #[must_use]
    pub fn args_for(&self, family: ToolFamily) -> Vec<String> {
        let mut args = Vec::new();

        if let Some(ref proxy) = self.proxy {
            let flag = match family {
                ToolFamily::Httpx => Some("-http-proxy"),
                ToolFamily::Nuclei | ToolFamily::Katana => Some("-proxy"),
                ToolFamily::Feroxbuster | ToolFamily::Dalfox => Some("--proxy"),
                ToolFamily::Gau | ToolFamily::Other => None,
            };
            if let Some(flag) = flag {
                args.push(flag.to_string());
                args.push(proxy.clone());
            }
        }

        if let Some(ref cookie) = self.cookie {
            match family {
                ToolFamily::Nuclei | ToolFamily::Katana | ToolFamily::Feroxbuster => {
                    args.push("-H".to_string());
                    args.push(format!("Cookie: {cookie}"));
                }
                ToolFamily::Gau => {
                    args.push("--cookie".to_string());
                    args.push(cookie.clone());
                }
                ToolFamily::Httpx | ToolFamily::Dalfox | ToolFamily::Other => {}
            }
        }

        args
    }

    /// Returns `spec` with the modifiers for its program appended.
    #[must_use]
    pub fn apply(&self, spec: ProcessSpec) -> ProcessSpec {
        let family = ToolFamily::from_program(&spec.program);
        let extra = self.args_for(family);
        spec.args(extra)
    }
}
