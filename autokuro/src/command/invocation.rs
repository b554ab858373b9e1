//! Fully resolved command invocations.

use super::flags::{quote_token, tokenize_pipeline, FlagParseError, FlagSet};
use std::fmt;
use std::path::{Path, PathBuf};

/// One external program with its typed arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSpec {
    /// Program name, resolved through `PATH` at spawn time.
    pub program: String,
    /// Arguments.
    pub args: FlagSet,
}

impl ProcessSpec {
    /// Creates a process with no arguments.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: FlagSet::new(),
        }
    }

    /// Parses a full command line (`program arg arg ...`).
    pub fn parse(command_line: &str) -> Result<Self, FlagParseError> {
        let mut segments = tokenize_pipeline(command_line)?;
        if segments.len() > 1 {
            return Err(FlagParseError::UnexpectedPipe(command_line.to_string()));
        }
        Self::from_tokens(segments.pop().unwrap_or_default(), command_line)
    }

    fn from_tokens(tokens: Vec<String>, source: &str) -> Result<Self, FlagParseError> {
        let mut tokens = tokens.into_iter();
        let program = tokens
            .next()
            .ok_or_else(|| FlagParseError::MissingProgram(source.to_string()))?;
        Ok(Self {
            program,
            args: FlagSet::from_tokens(tokens.collect()),
        })
    }

    /// Appends literal arguments.
    #[must_use]
    pub fn arg(mut self, token: impl Into<String>) -> Self {
        self.args.push(token);
        self
    }

    /// Appends several literal arguments.
    #[must_use]
    pub fn args<I, S>(mut self, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(tokens);
        self
    }

    /// Appends a path argument.
    #[must_use]
    pub fn path_arg(self, path: &Path) -> Self {
        self.arg(path.to_string_lossy().into_owned())
    }

    /// Appends configured flags, keeping their tunables typed.
    #[must_use]
    pub fn flags(mut self, flags: &FlagSet) -> Self {
        self.args.append(flags);
        self
    }

    /// Renders the argument vector (without the program).
    #[must_use]
    pub fn argv(&self) -> Vec<String> {
        self.args.to_argv()
    }
}

impl fmt::Display for ProcessSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.args.is_empty() {
            write!(f, "{}", quote_token(&self.program))
        } else {
            write!(f, "{} {}", quote_token(&self.program), self.args)
        }
    }
}

/// Parses a two-stage command line of the form `head ... | tail ...`.
///
/// A line without a pipe yields a single process and `None`.
pub fn parse_pipeline(
    command_line: &str,
) -> Result<(ProcessSpec, Option<ProcessSpec>), FlagParseError> {
    let segments = tokenize_pipeline(command_line)?;
    let mut segments = segments.into_iter();
    let head = ProcessSpec::from_tokens(segments.next().unwrap_or_default(), command_line)?;
    let tail = match segments.next() {
        Some(tokens) => Some(ProcessSpec::from_tokens(tokens, command_line)?),
        None => None,
    };
    if segments.next().is_some() {
        return Err(FlagParseError::UnexpectedPipe(command_line.to_string()));
    }
    Ok((head, tail))
}

/// A command ready to be handed to a runner.
///
/// Owned by the retry controller for one stage execution; tunables are
/// reduced in place between attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandInvocation {
    /// The step name used in logs and diagnostics.
    pub step: String,
    /// The first (or only) process.
    pub head: ProcessSpec,
    /// Process receiving the head's stdout, if piped.
    pub pipe_to: Option<ProcessSpec>,
    /// File connected to the head's stdin.
    pub stdin_from: Option<PathBuf>,
    /// File receiving the final stdout. Discarded when unset.
    pub stdout_to: Option<PathBuf>,
    /// Working directory for every process.
    pub current_dir: Option<PathBuf>,
}

impl CommandInvocation {
    /// Creates a single-process invocation.
    #[must_use]
    pub fn new(step: impl Into<String>, head: ProcessSpec) -> Self {
        Self {
            step: step.into(),
            head,
            pipe_to: None,
            stdin_from: None,
            stdout_to: None,
            current_dir: None,
        }
    }

    /// Pipes the head's stdout into `tail`.
    #[must_use]
    pub fn piped(mut self, tail: ProcessSpec) -> Self {
        self.pipe_to = Some(tail);
        self
    }

    /// Feeds `path` to the head's stdin.
    #[must_use]
    pub fn with_stdin_from(mut self, path: impl Into<PathBuf>) -> Self {
        self.stdin_from = Some(path.into());
        self
    }

    /// Writes the final stdout to `path`.
    #[must_use]
    pub fn with_stdout_to(mut self, path: impl Into<PathBuf>) -> Self {
        self.stdout_to = Some(path.into());
        self
    }

    /// Runs every process in `dir`.
    #[must_use]
    pub fn with_current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Returns true if this is a two-stage pipe.
    #[must_use]
    pub fn is_piped(&self) -> bool {
        self.pipe_to.is_some()
    }

    /// Reduces tunables on every process. Returns true if anything changed.
    pub fn throttle(&mut self) -> bool {
        let head = self.head.args.throttle();
        let tail = self
            .pipe_to
            .as_mut()
            .is_some_and(|tail| tail.args.throttle());
        head || tail
    }

    /// Programs that must be installed for this invocation.
    pub fn programs(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.head.program.as_str())
            .chain(self.pipe_to.iter().map(|p| p.program.as_str()))
    }
}

impl fmt::Display for CommandInvocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.head)?;
        if let Some(ref tail) = self.pipe_to {
            write!(f, " | {tail}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_pipeline() {
        let (head, tail) =
            parse_pipeline("subfinder -all -silent | httpx-toolkit -silent -threads 100").unwrap();

        assert_eq!(head.program, "subfinder");
        assert_eq!(head.argv(), vec!["-all", "-silent"]);
        let tail = tail.unwrap();
        assert_eq!(tail.program, "httpx-toolkit");
        assert_eq!(tail.args.tunable_value("-threads"), Some(100));
    }

    #[test]
    fn test_parse_pipeline_without_pipe() {
        let (head, tail) = parse_pipeline("subfinder -silent").unwrap();
        assert_eq!(head.program, "subfinder");
        assert!(tail.is_none());
    }

    #[test]
    fn test_parse_pipeline_rejects_three_stages() {
        assert!(parse_pipeline("a | b | c").is_err());
        assert!(matches!(
            parse_pipeline("| httpx"),
            Err(FlagParseError::MissingProgram(_))
        ));
    }

    #[test]
    fn test_builder_keeps_tunables_typed() {
        let flags = FlagSet::parse("-rl 100 -silent").unwrap();
        let spec = ProcessSpec::new("nuclei")
            .args(["-l", "live_hosts.txt"])
            .flags(&flags)
            .args(["-o", "out.txt"]);

        assert_eq!(spec.args.tunable_value("-rl"), Some(100));
        assert_eq!(
            spec.argv(),
            vec!["-l", "live_hosts.txt", "-rl", "100", "-silent", "-o", "out.txt"]
        );
    }

    #[test]
    fn test_throttle_touches_both_processes() {
        let (head, tail) = parse_pipeline("subfinder -t 10 | httpx-toolkit -threads 50").unwrap();
        let mut invocation = CommandInvocation::new("recon", head).piped(tail.unwrap());

        assert!(invocation.throttle());
        assert_eq!(invocation.head.args.tunable_value("-t"), Some(7));
        assert_eq!(
            invocation.pipe_to.as_ref().unwrap().args.tunable_value("-threads"),
            Some(35)
        );
    }

    #[test]
    fn test_display() {
        let (head, tail) = parse_pipeline("subfinder -d example.com | httpx-toolkit -silent").unwrap();
        let invocation = CommandInvocation::new("recon", head).piped(tail.unwrap());

        assert_eq!(
            invocation.to_string(),
            "subfinder -d example.com | httpx-toolkit -silent"
        );
        assert_eq!(
            invocation.programs().collect::<Vec<_>>(),
            vec!["subfinder", "httpx-toolkit"]
        );
    }
}
