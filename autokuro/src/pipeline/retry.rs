//! Adaptive retry with throttling and backoff.
//!
//! Network-heavy tools fail mostly because of upstream rate limiting or local
//! resource exhaustion. Between attempts the controller therefore reduces the
//! invocation's rate and concurrency flags, then waits a jittered backoff
//! delay. An invocation with nothing left to throttle is not retried.

use crate::command::{CommandInvocation, CommandRunner, RunFailure};
use crate::errors::ReconError;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Backoff strategy for retry delays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// delay = base * 2^retry
    #[default]
    Exponential,
    /// delay = base * (retry + 1)
    Linear,
    /// delay = base (constant)
    Constant,
}

/// Jitter strategy to prevent synchronized retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JitterStrategy {
    /// No jitter
    None,
    /// Random from 0 to delay
    #[default]
    Full,
    /// Half fixed, half random
    Equal,
}

/// Configuration for retry behavior.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Extra attempts after the first one for adaptive stages.
    pub max_retries: u32,
    /// Base delay between attempts in milliseconds.
    pub base_delay_ms: u64,
    /// Maximum delay cap in milliseconds.
    pub max_delay_ms: u64,
    /// Backoff strategy.
    pub backoff_strategy: BackoffStrategy,
    /// Jitter strategy.
    pub jitter_strategy: JitterStrategy,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay_ms: 2000,
            max_delay_ms: 30000,
            backoff_strategy: BackoffStrategy::Exponential,
            jitter_strategy: JitterStrategy::Full,
        }
    }
}

impl RetryConfig {
    /// Creates a new retry config.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A config with no delay between attempts.
    #[must_use]
    pub fn immediate() -> Self {
        Self::default()
            .with_base_delay_ms(0)
            .with_max_delay_ms(0)
            .with_jitter(JitterStrategy::None)
    }

    /// Sets the retry budget.
    #[must_use]
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Sets the base delay.
    #[must_use]
    pub fn with_base_delay_ms(mut self, delay: u64) -> Self {
        self.base_delay_ms = delay;
        self
    }

    /// Sets the maximum delay.
    #[must_use]
    pub fn with_max_delay_ms(mut self, delay: u64) -> Self {
        self.max_delay_ms = delay;
        self
    }

    /// Sets the backoff strategy.
    #[must_use]
    pub fn with_backoff(mut self, strategy: BackoffStrategy) -> Self {
        self.backoff_strategy = strategy;
        self
    }

    /// Sets the jitter strategy.
    #[must_use]
    pub fn with_jitter(mut self, strategy: JitterStrategy) -> Self {
        self.jitter_strategy = strategy;
        self
    }
}

/// Attempt bookkeeping for one stage execution.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RetryState {
    /// Attempts made so far.
    pub attempts: u32,
}

impl RetryState {
    /// Creates a fresh state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true once `max_retries` retries have been spent.
    #[must_use]
    pub fn is_exhausted(&self, max_retries: u32) -> bool {
        self.attempts > max_retries
    }

    /// Delay to wait before the next attempt.
    #[must_use]
    pub fn calculate_delay(&self, config: &RetryConfig) -> Duration {
        let base = config.base_delay_ms;
        let max = config.max_delay_ms;
        let retry = self.attempts.saturating_sub(1);

        let delay = match config.backoff_strategy {
            BackoffStrategy::Exponential => base.saturating_mul(2u64.saturating_pow(retry)).min(max),
            BackoffStrategy::Linear => base.saturating_mul(u64::from(retry) + 1).min(max),
            BackoffStrategy::Constant => base.min(max),
        };

        let jittered = match config.jitter_strategy {
            JitterStrategy::None => delay,
            JitterStrategy::Full => {
                if delay == 0 {
                    0
                } else {
                    rand::thread_rng().gen_range(0..=delay)
                }
            }
            JitterStrategy::Equal => {
                let half = delay / 2;
                if half == 0 {
                    delay
                } else {
                    half + rand::thread_rng().gen_range(0..=half)
                }
            }
        };

        Duration::from_millis(jittered)
    }
}

/// Why the controller stopped retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GiveUpReason {
    /// The retry budget was spent.
    Exhausted,
    /// The failure cannot be helped by retrying (e.g. spawn failure).
    NotRetryable,
    /// No tunable flag could be reduced further.
    NothingToThrottle,
}

/// Outcome of a retry decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry the throttled invocation after the delay.
    Retry(Duration),
    /// Stop and surface the failure.
    GiveUp(GiveUpReason),
}

/// Decides whether to retry after `failure`, throttling `invocation` in place
/// when a retry is chosen.
pub fn should_retry(
    state: &RetryState,
    config: &RetryConfig,
    max_retries: u32,
    failure: &RunFailure,
    invocation: &mut CommandInvocation,
) -> RetryDecision {
    if !failure.is_retryable() {
        return RetryDecision::GiveUp(GiveUpReason::NotRetryable);
    }
    if state.is_exhausted(max_retries) {
        return RetryDecision::GiveUp(GiveUpReason::Exhausted);
    }
    if !invocation.throttle() {
        return RetryDecision::GiveUp(GiveUpReason::NothingToThrottle);
    }
    RetryDecision::Retry(state.calculate_delay(config))
}

/// Result of running one stage invocation through the controller.
#[derive(Debug)]
pub struct RetryOutcome {
    /// Attempts made.
    pub attempts: u32,
    /// The invocation as last executed.
    pub invocation: CommandInvocation,
    /// Success, or the terminal failure for the stage.
    pub result: Result<(), ReconError>,
    /// Set when the controller stopped on a failure.
    pub gave_up: Option<GiveUpReason>,
}

impl RetryOutcome {
    /// Returns true if the last attempt succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Wraps a [`CommandRunner`] with throttle-and-retry.
#[derive(Clone)]
pub struct AdaptiveRetry {
    runner: Arc<dyn CommandRunner>,
    config: RetryConfig,
}

impl std::fmt::Debug for AdaptiveRetry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdaptiveRetry")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl AdaptiveRetry {
    /// Creates a controller around `runner`.
    #[must_use]
    pub fn new(runner: Arc<dyn CommandRunner>, config: RetryConfig) -> Self {
        Self { runner, config }
    }

    /// Returns the retry configuration.
    #[must_use]
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Runs `invocation`, throttling and retrying up to `max_retries` times.
    ///
    /// A `max_retries` of zero makes exactly one attempt.
    pub async fn run_with_retry(
        &self,
        mut invocation: CommandInvocation,
        step: &str,
        timeout: Duration,
        max_retries: u32,
    ) -> RetryOutcome {
        let mut state = RetryState::new();

        loop {
            state.attempts += 1;
            debug!(step, attempt = state.attempts, command = %invocation, "Running attempt");

            let failure = match self.runner.run(&invocation, timeout).await {
                Ok(()) => {
                    return RetryOutcome {
                        attempts: state.attempts,
                        invocation,
                        result: Ok(()),
                        gave_up: None,
                    }
                }
                Err(failure) => failure,
            };

            match should_retry(&state, &self.config, max_retries, &failure, &mut invocation) {
                RetryDecision::Retry(delay) => {
                    warn!(
                        step,
                        attempt = state.attempts,
                        error = %failure,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        next = %invocation,
                        "Throttling and retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                RetryDecision::GiveUp(reason) => {
                    warn!(step, attempts = state.attempts, ?reason, error = %failure, "Giving up");
                    return RetryOutcome {
                        attempts: state.attempts,
                        invocation,
                        result: Err(failure.into_error(step)),
                        gave_up: Some(reason),
                    };
                }
            }
        }
    }
}
