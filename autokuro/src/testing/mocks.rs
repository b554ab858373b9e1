//! Fake collaborators.

use crate::command::{CommandInvocation, CommandRunner, ProcessSpec, RunFailure};
use crate::notify::{Notifier, NotifyError};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// What the [`ScriptedRunner`] does for one attempt of a step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Script {
    /// Succeed and write these lines to the step's output.
    Write(Vec<String>),
    /// Succeed and leave a zero-byte output.
    Empty,
    /// Fail with this failure, writing a partial output first.
    Fail(RunFailure),
}

/// A [`CommandRunner`] that fakes tool output instead of spawning processes.
///
/// Every call is recorded. Steps without a script succeed and write a small
/// canned output to wherever the real tool would have written it.
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    scripts: Mutex<HashMap<String, VecDeque<Script>>>,
    calls: Mutex<Vec<CommandInvocation>>,
    delay: Option<Duration>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl ScriptedRunner {
    /// Creates a runner with no scripts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every call take `delay`.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Queues `script` for the next unscripted attempt of `step`.
    #[must_use]
    pub fn with_script(self, step: &str, script: Script) -> Self {
        self.push(step, script);
        self
    }

    /// Queues `times` failures for `step`.
    #[must_use]
    pub fn failing(self, step: &str, failure: &RunFailure, times: usize) -> Self {
        for _ in 0..times {
            self.push(step, Script::Fail(failure.clone()));
        }
        self
    }

    /// Queues `script` for `step`.
    pub fn push(&self, step: &str, script: Script) {
        self.scripts
            .lock()
            .entry(step.to_string())
            .or_default()
            .push_back(script);
    }

    /// Every invocation received, in call order.
    #[must_use]
    pub fn calls(&self) -> Vec<CommandInvocation> {
        self.calls.lock().clone()
    }

    /// Step names of every call, in call order.
    #[must_use]
    pub fn steps(&self) -> Vec<String> {
        self.calls.lock().iter().map(|c| c.step.clone()).collect()
    }

    /// Number of calls for `step`.
    #[must_use]
    pub fn call_count(&self, step: &str) -> usize {
        self.calls.lock().iter().filter(|c| c.step == step).count()
    }

    /// Highest number of concurrent calls observed.
    #[must_use]
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Forgets recorded calls.
    pub fn reset(&self) {
        self.calls.lock().clear();
        self.peak.store(0, Ordering::SeqCst);
    }

    fn next_script(&self, invocation: &CommandInvocation) -> Script {
        self.scripts
            .lock()
            .get_mut(&invocation.step)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Script::Write(canned_output(&invocation.step)))
    }
}

fn canned_output(step: &str) -> Vec<String> {
    let lines: &[&str] = match step {
        "recon" => &[
            "https://www.example.com",
            "https://api.example.com",
            "https://cdn.example.com",
        ],
        "tech" => &["[tech-detect:nginx] [http] [info] https://www.example.com"],
        "archive" => &[
            "https://www.example.com/static/app.js",
            "https://www.example.com/search?q=test",
            "https://www.example.com/logo.png",
        ],
        "crawl" => &[
            "https://www.example.com/login",
            "https://api.example.com/v1/users?id=1",
        ],
        "dirscan" => &[r#"{"type":"response","url":"https://www.example.com/admin","status":200}"#],
        "params" => &["https://www.example.com/item?id=FUZZ"],
        _ => &[],
    };
    if lines.is_empty() {
        vec![format!("[{step}] [info] https://www.example.com")]
    } else {
        lines.iter().map(ToString::to_string).collect()
    }
}

fn flag_value(spec: &ProcessSpec, flag: &str) -> Option<String> {
    let argv = spec.argv();
    argv.iter()
        .rposition(|a| a == flag)
        .and_then(|i| argv.get(i + 1).cloned())
}

/// Where the real tool would have written its output.
fn output_path(invocation: &CommandInvocation) -> Option<PathBuf> {
    if let Some(ref path) = invocation.stdout_to {
        return Some(path.clone());
    }
    let last = invocation.pipe_to.as_ref().unwrap_or(&invocation.head);
    if let Some(out) = flag_value(last, "-o") {
        return Some(PathBuf::from(out));
    }
    // paramspider writes results/<domain>.txt under its working directory.
    let dir = invocation.current_dir.as_ref()?;
    let domain = flag_value(&invocation.head, "-d")?;
    Some(dir.join("results").join(format!("{domain}.txt")))
}

fn write_lines(path: &Path, lines: &[String]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut content = lines.join("\n");
    if !content.is_empty() {
        content.push('\n');
    }
    fs::write(path, content)
}

/// Writes the scripted output, reporting an unwritable path as a spawn failure.
fn write_output(
    invocation: &CommandInvocation,
    output: Option<&Path>,
    lines: &[String],
) -> Result<(), RunFailure> {
    let Some(path) = output else {
        return Ok(());
    };
    write_lines(path, lines).map_err(|e| RunFailure::Spawn {
        program: invocation.head.program.clone(),
        reason: format!("cannot write {}: {e}", path.display()),
    })
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, invocation: &CommandInvocation, _timeout: Duration) -> Result<(), RunFailure> {
        self.calls.lock().push(invocation.clone());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let script = self.next_script(invocation);
        let output = output_path(invocation);
        let result = match script {
            Script::Write(lines) => write_output(invocation, output.as_deref(), &lines),
            Script::Empty => write_output(invocation, output.as_deref(), &[]),
            Script::Fail(failure) => {
                write_output(invocation, output.as_deref(), &["partial".to_string()])
                    .and(Err(failure))
            }
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

/// A notifier that keeps every message.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages sent so far.
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, message: &str) -> Result<(), NotifyError> {
        self.messages.lock().push(message.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::ProcessSpec;

    #[tokio::test]
    async fn test_scripted_runner_writes_to_o_flag() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("nuclei_report.txt");
        let invocation = CommandInvocation::new(
            "vulns",
            ProcessSpec::new("nuclei").arg("-o").path_arg(&out),
        );
        let runner = ScriptedRunner::new();

        runner.run(&invocation, Duration::from_secs(1)).await.unwrap();

        assert!(fs::read_to_string(&out).unwrap().contains("[vulns]"));
        assert_eq!(runner.call_count("vulns"), 1);
    }

    #[tokio::test]
    async fn test_unwritable_output_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "file, not a directory").unwrap();
        let invocation = CommandInvocation::new(
            "vulns",
            ProcessSpec::new("nuclei").arg("-o").path_arg(&blocker.join("out.txt")),
        );

        let err = ScriptedRunner::new()
            .run(&invocation, Duration::from_secs(1))
            .await
            .unwrap_err();

        assert!(matches!(err, RunFailure::Spawn { ref program, .. } if program == "nuclei"));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_scripted_failures_are_consumed_in_order() {
        let runner = ScriptedRunner::new().failing("ports", &RunFailure::Timeout(Duration::from_secs(5)), 1);
        let invocation = CommandInvocation::new("ports", ProcessSpec::new("naabu"));

        assert!(runner.run(&invocation, Duration::from_secs(1)).await.is_err());
        assert!(runner.run(&invocation, Duration::from_secs(1)).await.is_ok());
        assert_eq!(runner.steps(), vec!["ports", "ports"]);
    }

    #[tokio::test]
    async fn test_paramspider_output_location() {
        let dir = tempfile::tempdir().unwrap();
        let invocation = CommandInvocation::new(
            "params",
            ProcessSpec::new("paramspider").args(["-d", "example.com"]),
        )
        .with_current_dir(dir.path());

        ScriptedRunner::new()
            .run(&invocation, Duration::from_secs(1))
            .await
            .unwrap();

        assert!(dir.path().join("results/example.com.txt").exists());
    }
}
