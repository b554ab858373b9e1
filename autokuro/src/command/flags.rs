//! Structured flag sets.
//!
//! Configured flag strings are parsed once into a list of [`Arg`]s. Flags that
//! control rate or concurrency become typed [`Tunable`]s so that scaling and
//! throttling never re-parse strings; argument vectors are only rendered when
//! a process is spawned.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Lower bound for tunables reduced by the retry controller.
pub const THROTTLE_FLOOR: u32 = 2;

/// Lower bound for tunables scaled by a hardware profile.
pub const SCALE_FLOOR: u32 = 1;

/// Error raised when a flag string cannot be tokenized.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FlagParseError {
    /// A quote was opened but never closed.
    #[error("unterminated {quote} quote in '{input}'")]
    UnterminatedQuote {
        /// The quote character.
        quote: char,
        /// The offending input.
        input: String,
    },

    /// An unquoted `|` appeared where a single command was expected.
    #[error("unexpected pipe in '{0}'")]
    UnexpectedPipe(String),

    /// A command line had no program name.
    #[error("missing program name in '{0}'")]
    MissingProgram(String),
}

/// The class of a rate or concurrency flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TunableKind {
    /// Requests per second (`-rl`, `--rate-limit`, `-rate`).
    RateLimit,
    /// Worker count (`--worker`).
    Worker,
    /// Thread count (`-t`, `--threads`, `-threads`).
    Threads,
    /// Concurrency (`-c`, `--concurrency`).
    Concurrency,
}

impl TunableKind {
    /// Classifies a flag token.
    #[must_use]
    pub fn from_flag(flag: &str) -> Option<Self> {
        match flag {
            "-rl" | "--rate-limit" | "-rate-limit" | "-rate" | "--rate" => Some(Self::RateLimit),
            "--worker" | "-worker" | "--workers" => Some(Self::Worker),
            "-t" | "--threads" | "-threads" => Some(Self::Threads),
            "-c" | "--concurrency" | "-concurrency" => Some(Self::Concurrency),
            _ => None,
        }
    }

    /// The multiplicative reduction applied between retry attempts.
    #[must_use]
    pub fn throttle_factor(self) -> f64 {
        match self {
            Self::RateLimit | Self::Worker => 0.5,
            Self::Threads | Self::Concurrency => 0.7,
        }
    }
}

/// A numeric rate or concurrency flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tunable {
    /// The flag exactly as configured (e.g. `-rl`).
    pub flag: String,
    /// The flag class.
    pub kind: TunableKind,
    /// The current value.
    pub value: u32,
}

impl Tunable {
    /// Returns the value reduced by the kind's factor, floored at
    /// [`THROTTLE_FLOOR`] and never above the current value.
    #[must_use]
    pub fn throttled_value(&self) -> u32 {
        let reduced = truncate(f64::from(self.value) * self.kind.throttle_factor());
        reduced.max(THROTTLE_FLOOR).min(self.value)
    }

    /// Returns the value multiplied by `multiplier`, floored at [`SCALE_FLOOR`].
    #[must_use]
    pub fn scaled_value(&self, multiplier: f64) -> u32 {
        truncate(f64::from(self.value) * multiplier).max(SCALE_FLOOR)
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn truncate(value: f64) -> u32 {
    if value.is_nan() || value <= 0.0 {
        0
    } else if value >= f64::from(u32::MAX) {
        u32::MAX
    } else {
        value as u32
    }
}

/// One argument in a flag set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Arg {
    /// An opaque token passed through verbatim.
    Literal(String),
    /// A rate/concurrency flag with its numeric value.
    Tunable(Tunable),
}

/// An ordered list of arguments for one external program.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagSet {
    args: Vec<Arg>,
}

impl FlagSet {
    /// Creates an empty flag set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a configured flag string.
    pub fn parse(input: &str) -> Result<Self, FlagParseError> {
        let mut segments = tokenize_pipeline(input)?;
        if segments.len() > 1 {
            return Err(FlagParseError::UnexpectedPipe(input.to_string()));
        }
        Ok(Self::from_tokens(segments.pop().unwrap_or_default()))
    }

    /// Builds a flag set from already-split tokens.
    #[must_use]
    pub fn from_tokens(tokens: Vec<String>) -> Self {
        let mut args = Vec::with_capacity(tokens.len());
        let mut iter = tokens.into_iter().peekable();

        while let Some(token) = iter.next() {
            let tunable = TunableKind::from_flag(&token).and_then(|kind| {
                let value = iter.peek()?.parse::<u32>().ok()?;
                Some((kind, value))
            });
            match tunable {
                Some((kind, value)) => {
                    iter.next();
                    args.push(Arg::Tunable(Tunable {
                        flag: token,
                        kind,
                        value,
                    }));
                }
                None => args.push(Arg::Literal(token)),
            }
        }

        Self { args }
    }

    /// Returns the arguments.
    #[must_use]
    pub fn args(&self) -> &[Arg] {
        &self.args
    }

    /// Returns true if there are no arguments.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    /// Appends a literal token.
    pub fn push(&mut self, token: impl Into<String>) {
        self.args.push(Arg::Literal(token.into()));
    }

    /// Appends literal tokens.
    pub fn extend<I, S>(&mut self, tokens: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args
            .extend(tokens.into_iter().map(|t| Arg::Literal(t.into())));
    }

    /// Appends every argument of `other`, tunables included.
    pub fn append(&mut self, other: &FlagSet) {
        self.args.extend(other.args.iter().cloned());
    }

    /// Returns the tunables in order.
    pub fn tunables(&self) -> impl Iterator<Item = &Tunable> {
        self.args.iter().filter_map(|arg| match arg {
            Arg::Tunable(t) => Some(t),
            Arg::Literal(_) => None,
        })
    }

    /// Returns the value of the first tunable spelled exactly `flag`.
    #[must_use]
    pub fn tunable_value(&self, flag: &str) -> Option<u32> {
        self.tunables().find(|t| t.flag == flag).map(|t| t.value)
    }

    /// Returns a copy with every tunable scaled by `multiplier`.
    ///
    /// A multiplier of exactly 1.0 is the identity.
    #[must_use]
    #[allow(clippy::float_cmp)]
    pub fn scaled(&self, multiplier: f64) -> Self {
        if multiplier == 1.0 {
            return self.clone();
        }
        let args = self
            .args
            .iter()
            .map(|arg| match arg {
                Arg::Tunable(t) => Arg::Tunable(Tunable {
                    value: t.scaled_value(multiplier),
                    ..t.clone()
                }),
                Arg::Literal(_) => arg.clone(),
            })
            .collect();
        Self { args }
    }

    /// Reduces every tunable in place.
    ///
    /// Returns true if at least one value changed.
    pub fn throttle(&mut self) -> bool {
        let mut changed = false;
        for arg in &mut self.args {
            if let Arg::Tunable(t) = arg {
                let next = t.throttled_value();
                if next != t.value {
                    t.value = next;
                    changed = true;
                }
            }
        }
        changed
    }

    /// Renders the argument vector.
    #[must_use]
    pub fn to_argv(&self) -> Vec<String> {
        let mut argv = Vec::with_capacity(self.args.len() + self.tunables().count());
        for arg in &self.args {
            match arg {
                Arg::Literal(token) => argv.push(token.clone()),
                Arg::Tunable(t) => {
                    argv.push(t.flag.clone());
                    argv.push(t.value.to_string());
                }
            }
        }
        argv
    }
}

impl fmt::Display for FlagSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self.to_argv().iter().map(|t| quote_token(t)).collect();
        write!(f, "{}", rendered.join(" "))
    }
}

/// Quotes a token for display when it contains whitespace or quotes.
#[must_use]
pub fn quote_token(token: &str) -> String {
    if token.is_empty() {
        return "''".to_string();
    }
    if token.chars().any(|c| c.is_whitespace() || c == '\'' || c == '"' || c == '|') {
        format!("'{}'", token.replace('\'', r"'\''"))
    } else {
        token.to_string()
    }
}

/// Splits a command line into pipeline segments of tokens.
///
/// Supports single quotes (literal), double quotes (with `\"` and `\\`
/// escapes) and backslash escapes outside quotes. An unquoted `|` starts a new
/// segment.
pub fn tokenize_pipeline(input: &str) -> Result<Vec<Vec<String>>, FlagParseError> {
    let mut segments = vec![Vec::new()];
    let mut current = String::new();
    let mut in_token = false;
    let mut chars = input.chars();

    while let Some(c) = chars.next() {
        match c {
            '\'' => {
                in_token = true;
                loop {
                    match chars.next() {
                        Some('\'') => break,
                        Some(ch) => current.push(ch),
                        None => {
                            return Err(FlagParseError::UnterminatedQuote {
                                quote: '\'',
                                input: input.to_string(),
                            })
                        }
                    }
                }
            }
            '"' => {
                in_token = true;
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some(ch @ ('"' | '\\')) => current.push(ch),
                            Some(ch) => {
                                current.push('\\');
                                current.push(ch);
                            }
                            None => current.push('\\'),
                        },
                        Some(ch) => current.push(ch),
                        None => {
                            return Err(FlagParseError::UnterminatedQuote {
                                quote: '"',
                                input: input.to_string(),
                            })
                        }
                    }
                }
            }
            '\\' => {
                in_token = true;
                if let Some(ch) = chars.next() {
                    current.push(ch);
                }
            }
            '|' => {
                if in_token {
                    if let Some(segment) = segments.last_mut() {
                        segment.push(std::mem::take(&mut current));
                    }
                    in_token = false;
                }
                segments.push(Vec::new());
            }
            ch if ch.is_whitespace() => {
                if in_token {
                    if let Some(segment) = segments.last_mut() {
                        segment.push(std::mem::take(&mut current));
                    }
                    in_token = false;
                }
            }
            ch => {
                in_token = true;
                current.push(ch);
            }
        }
    }

    if in_token {
        if let Some(segment) = segments.last_mut() {
            segment.push(current);
        }
    }

    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_tokenize_quotes() {
        let segments = tokenize_pipeline(r#"-H 'Cookie: a=b' -x "say \"hi\"" plain\ space"#).unwrap();
        assert_eq!(
            segments,
            vec![vec![
                "-H".to_string(),
                "Cookie: a=b".to_string(),
                "-x".to_string(),
                r#"say "hi""#.to_string(),
                "plain space".to_string(),
            ]]
        );
    }

    #[test]
    fn test_tokenize_pipeline_segments() {
        let segments = tokenize_pipeline("subfinder -silent | httpx-toolkit -silent -threads 50").unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0], vec!["subfinder", "-silent"]);
        assert_eq!(segments[1], vec!["httpx-toolkit", "-silent", "-threads", "50"]);
    }

    #[test]
    fn test_quoted_pipe_is_not_a_separator() {
        let segments = tokenize_pipeline("-match-regex 'a|b'").unwrap();
        assert_eq!(segments, vec![vec!["-match-regex".to_string(), "a|b".to_string()]]);
    }

    #[test]
    fn test_unterminated_quote() {
        let err = tokenize_pipeline("-H 'Cookie: x").unwrap_err();
        assert!(matches!(err, FlagParseError::UnterminatedQuote { quote: '\'', .. }));
    }

    #[test]
    fn test_parse_rejects_pipe() {
        assert!(matches!(
            FlagSet::parse("-silent | tee"),
            Err(FlagParseError::UnexpectedPipe(_))
        ));
    }

    #[test]
    fn test_parse_recognizes_tunables() {
        let flags = FlagSet::parse("-severity high -rl 150 -c 25 -t notanumber").unwrap();

        let tunables: Vec<_> = flags.tunables().collect();
        assert_eq!(tunables.len(), 2);
        assert_eq!(tunables[0].kind, TunableKind::RateLimit);
        assert_eq!(tunables[1].kind, TunableKind::Concurrency);
        assert_eq!(flags.tunable_value("-rl"), Some(150));
        assert_eq!(
            flags.to_argv(),
            vec!["-severity", "high", "-rl", "150", "-c", "25", "-t", "notanumber"]
        );
    }

    #[test]
    fn test_hardware_scaling_scenario() {
        let flags = FlagSet::parse("-severity high -rl 150").unwrap();
        assert_eq!(flags.scaled(2.0).to_string(), "-severity high -rl 300");
    }

    #[test]
    fn test_scaling_floor_and_identity() {
        let flags = FlagSet::parse("-c 3 -rate 100").unwrap();

        assert_eq!(flags.scaled(1.0), flags);
        assert_eq!(flags.scaled(0.1).to_string(), "-c 1 -rate 10");
        assert_eq!(flags.scaled(0.5).to_string(), "-c 1 -rate 50");
    }

    #[test]
    fn test_throttle_factors() {
        let mut flags = FlagSet::parse("-rate 100 --worker 10 -t 50 --concurrency 10").unwrap();

        assert!(flags.throttle());
        assert_eq!(flags.to_string(), "-rate 50 --worker 5 -t 35 --concurrency 7");
    }

    #[test]
    fn test_throttle_floor_stops_changes() {
        let mut flags = FlagSet::parse("-rl 3 -t 2").unwrap();

        assert!(flags.throttle());
        assert_eq!(flags.to_string(), "-rl 2 -t 2");
        assert!(!flags.throttle());
    }

    #[test]
    fn test_throttle_never_raises_small_values() {
        let mut flags = FlagSet::parse("-c 1").unwrap();
        assert!(!flags.throttle());
        assert_eq!(flags.tunable_value("-c"), Some(1));
    }

    #[test]
    fn test_throttle_without_tunables() {
        let mut flags = FlagSet::parse("-silent -severity critical").unwrap();
        assert!(!flags.throttle());
    }

    #[test]
    fn test_display_quotes_tokens() {
        let mut flags = FlagSet::new();
        flags.extend(["-H", "Cookie: a=b"]);
        assert_eq!(flags.to_string(), "-H 'Cookie: a=b'");
    }
}
