//! Typed per-mode tool flags.

use crate::command::{parse_pipeline, FlagSet, ProcessSpec};
use crate::errors::ConfigError;
use std::collections::BTreeMap;

/// Stage keys every mode must define.
pub const REQUIRED_MODE_KEYS: &[&str] = &[
    "recon_stream",
    "nuclei_tech",
    "naabu",
    "nuclei_takeover",
    "nuclei_cloud",
    "feroxbuster",
    "gau",
    "katana",
    "paramspider",
    "nuclei_tokens",
    "nuclei",
    "dalfox",
    "trufflehog",
];

/// Stage keys a mode may define.
pub const OPTIONAL_MODE_KEYS: &[&str] = &["nuclei_context"];

/// Parsed flags for every stage of one mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeFlags {
    /// Mode name.
    pub name: String,
    /// Host enumeration process (left side of the recon pipe).
    pub recon_head: ProcessSpec,
    /// HTTP probing process (right side of the recon pipe).
    pub recon_tail: ProcessSpec,
    /// Technology detection (`nuclei`).
    pub nuclei_tech: FlagSet,
    /// Port scan (`naabu`).
    pub naabu: FlagSet,
    /// Subdomain takeover checks (`nuclei`).
    pub nuclei_takeover: FlagSet,
    /// Cloud asset enumeration (`nuclei`).
    pub nuclei_cloud: FlagSet,
    /// Directory brute forcing (`feroxbuster`).
    pub feroxbuster: FlagSet,
    /// Archive URLs (`gau`).
    pub gau: FlagSet,
    /// Active crawl (`katana`).
    pub katana: FlagSet,
    /// Parameter mining (`paramspider`).
    pub paramspider: FlagSet,
    /// Token templates over JS files (`nuclei`).
    pub nuclei_tokens: FlagSet,
    /// General vulnerability scan (`nuclei`).
    pub nuclei: FlagSet,
    /// Tech-tagged scan on dynamic hosts (`nuclei`). Defaults to `nuclei`.
    pub nuclei_context: FlagSet,
    /// XSS scan (`dalfox`).
    pub dalfox: FlagSet,
    /// Secret scan (`trufflehog`).
    pub trufflehog: FlagSet,
}

impl ModeFlags {
    /// Builds typed flags from a raw `modes.<name>` table.
    ///
    /// Every missing key and unparsable value is reported at once.
    pub fn from_table(name: &str, table: &BTreeMap<String, String>) -> Result<Self, ConfigError> {
        let problems = check_table(name, table);
        if !problems.is_empty() {
            return Err(ConfigError::new(format!("mode '{name}' is invalid"))
                .with_key(format!("modes.{name}"))
                .with_problems(problems));
        }

        let flags = |key: &str| -> Result<FlagSet, ConfigError> {
            let raw = table.get(key).map_or("", String::as_str);
            FlagSet::parse(raw).map_err(|e| {
                ConfigError::new(e.to_string()).with_key(format!("modes.{name}.{key}"))
            })
        };

        let (recon_head, recon_tail) = split_recon_stream(name, table)?;
        let nuclei = flags("nuclei")?;
        let nuclei_context = if table.contains_key("nuclei_context") {
            flags("nuclei_context")?
        } else {
            nuclei.clone()
        };

        Ok(Self {
            name: name.to_string(),
            recon_head,
            recon_tail,
            nuclei_tech: flags("nuclei_tech")?,
            naabu: flags("naabu")?,
            nuclei_takeover: flags("nuclei_takeover")?,
            nuclei_cloud: flags("nuclei_cloud")?,
            feroxbuster: flags("feroxbuster")?,
            gau: flags("gau")?,
            katana: flags("katana")?,
            paramspider: flags("paramspider")?,
            nuclei_tokens: flags("nuclei_tokens")?,
            nuclei,
            nuclei_context,
            dalfox: flags("dalfox")?,
            trufflehog: flags("trufflehog")?,
        })
    }

    /// Returns a copy with every tunable scaled by `multiplier` (floor 1).
    #[must_use]
    pub fn scaled(&self, multiplier: f64) -> Self {
        let scale = |f: &FlagSet| f.scaled(multiplier);
        Self {
            name: self.name.clone(),
            recon_head: ProcessSpec {
                program: self.recon_head.program.clone(),
                args: scale(&self.recon_head.args),
            },
            recon_tail: ProcessSpec {
                program: self.recon_tail.program.clone(),
                args: scale(&self.recon_tail.args),
            },
            nuclei_tech: scale(&self.nuclei_tech),
            naabu: scale(&self.naabu),
            nuclei_takeover: scale(&self.nuclei_takeover),
            nuclei_cloud: scale(&self.nuclei_cloud),
            feroxbuster: scale(&self.feroxbuster),
            gau: scale(&self.gau),
            katana: scale(&self.katana),
            paramspider: scale(&self.paramspider),
            nuclei_tokens: scale(&self.nuclei_tokens),
            nuclei: scale(&self.nuclei),
            nuclei_context: scale(&self.nuclei_context),
            dalfox: scale(&self.dalfox),
            trufflehog: scale(&self.trufflehog),
        }
    }
}

/// Lists every problem in a raw mode table without building it.
pub(crate) fn check_table(name: &str, table: &BTreeMap<String, String>) -> Vec<String> {
    let mut problems = Vec::new();

    for key in REQUIRED_MODE_KEYS {
        if !table.contains_key(*key) {
            problems.push(format!("modes.{name}.{key} is missing"));
        }
    }

    for (key, value) in table {
        if key == "recon_stream" {
            if let Err(e) = split_recon_stream(name, table) {
                problems.push(e.message);
            }
            continue;
        }
        if !REQUIRED_MODE_KEYS.contains(&key.as_str())
            && !OPTIONAL_MODE_KEYS.contains(&key.as_str())
        {
            tracing::warn!(mode = name, key = %key, "Ignoring unknown stage key");
            continue;
        }
        if let Err(e) = FlagSet::parse(value) {
            problems.push(format!("modes.{name}.{key}: {e}"));
        }
    }

    problems
}

fn split_recon_stream(
    name: &str,
    table: &BTreeMap<String, String>,
) -> Result<(ProcessSpec, ProcessSpec), ConfigError> {
    let key = format!("modes.{name}.recon_stream");
    let raw = table
        .get("recon_stream")
        .ok_or_else(|| ConfigError::new(format!("{key} is missing")).with_key(key.clone()))?;

    match parse_pipeline(raw) {
        Ok((head, Some(tail))) => Ok((head, tail)),
        Ok((_, None)) => Err(ConfigError::new(format!(
            "{key} must pipe two programs ('enumerator ... | prober ...')"
        ))
        .with_key(key)),
        Err(e) => Err(ConfigError::new(format!("{key}: {e}")).with_key(key)),
    }
}
