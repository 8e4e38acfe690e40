//! Retry / challenge controller.
//!
//! Wraps a single fetch or store operation with resilience policy so the
//! orchestrator never special-cases transient failure. Transient errors are
//! retried with linear backoff plus random jitter; challenge pages are
//! either skipped (reported as a sentinel, not an error) or waited out by
//! polling the operation until the signature clears or a wall-clock budget
//! elapses. Fatal errors propagate immediately.
//!
//! The controller holds no shared mutable state; concurrent invocations
//! are independent.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::error::{IngestError, Result};
use crate::types::config::env_parse;

/// What to do when a fetch hits a challenge page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeMode {
    /// Abandon the unit of work and report it as challenge-skipped.
    Skip,
    /// Block and poll until the challenge is resolved out-of-band (e.g. an
    /// operator solving it in an attached browser) or the wait budget
    /// elapses.
    WaitInteractive,
}

/// Resilience policy for one wrapped operation.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts including the first (so 4 = up to 3 retries).
    pub max_attempts: u32,

    /// Backoff base; attempt `n` waits `base * n` plus jitter.
    pub backoff_base: Duration,

    /// Upper bound for the random jitter added to every backoff.
    pub max_jitter: Duration,

    /// Challenge handling mode.
    pub challenge: ChallengeMode,

    /// Maximum wall-clock wait in `WaitInteractive` mode.
    pub challenge_wait_budget: Duration,

    /// Poll interval while waiting for a challenge to clear.
    pub challenge_poll_interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            backoff_base: Duration::from_millis(500),
            max_jitter: Duration::from_millis(1000),
            challenge: ChallengeMode::Skip,
            challenge_wait_budget: Duration::from_secs(90),
            challenge_poll_interval: Duration::from_secs(3),
        }
    }
}

impl RetryPolicy {
    /// Create a policy with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load overrides from `CURATION_RETRY_MAX_ATTEMPTS`,
    /// `CURATION_RETRY_BACKOFF_MS`, `CURATION_CHALLENGE_WAIT_SECS`, and
    /// `CURATION_CHALLENGE_INTERACTIVE` (bool).
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let interactive = env_parse("CURATION_CHALLENGE_INTERACTIVE", false);
        Self {
            max_attempts: env_parse("CURATION_RETRY_MAX_ATTEMPTS", defaults.max_attempts),
            backoff_base: Duration::from_millis(env_parse(
                "CURATION_RETRY_BACKOFF_MS",
                defaults.backoff_base.as_millis() as u64,
            )),
            challenge: if interactive {
                ChallengeMode::WaitInteractive
            } else {
                ChallengeMode::Skip
            },
            challenge_wait_budget: Duration::from_secs(env_parse(
                "CURATION_CHALLENGE_WAIT_SECS",
                defaults.challenge_wait_budget.as_secs(),
            )),
            ..defaults
        }
    }

    /// Set the attempt budget.
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Set the backoff base.
    pub fn with_backoff_base(mut self, base: Duration) -> Self {
        self.backoff_base = base;
        self
    }

    /// Set the jitter upper bound.
    pub fn with_max_jitter(mut self, jitter: Duration) -> Self {
        self.max_jitter = jitter;
        self
    }

    /// Set the challenge mode.
    pub fn with_challenge_mode(mut self, mode: ChallengeMode) -> Self {
        self.challenge = mode;
        self
    }

    /// Set the interactive wait budget.
    pub fn with_challenge_wait(mut self, budget: Duration, poll: Duration) -> Self {
        self.challenge_wait_budget = budget;
        self.challenge_poll_interval = poll;
        self
    }

    fn backoff_for(&self, attempt: u32) -> Duration {
        let jitter_ms = if self.max_jitter.is_zero() {
            0
        } else {
            rand::rng().random_range(0..self.max_jitter.as_millis() as u64)
        };
        self.backoff_base * attempt + Duration::from_millis(jitter_ms)
    }
}

/// Outcome of a retried operation.
#[derive(Debug)]
pub enum Attempted<T> {
    /// The operation eventually succeeded.
    Completed {
        value: T,
        /// Retries performed before success (0 = first try).
        retries: u32,
    },
    /// A challenge page was hit under `ChallengeMode::Skip`; the unit of
    /// work should be reported as skipped, not failed.
    ChallengeSkipped,
}

impl<T> Attempted<T> {
    /// The value, if the operation completed.
    pub fn into_value(self) -> Option<T> {
        match self {
            Self::Completed { value, .. } => Some(value),
            Self::ChallengeSkipped => None,
        }
    }

    /// Retries performed, if the operation completed.
    pub fn retries(&self) -> Option<u32> {
        match self {
            Self::Completed { retries, .. } => Some(*retries),
            Self::ChallengeSkipped => None,
        }
    }

    /// True if the operation was abandoned on a challenge page.
    pub fn is_challenge_skipped(&self) -> bool {
        matches!(self, Self::ChallengeSkipped)
    }
}

/// Run an operation under a retry policy.
///
/// `context_label` identifies the operation in diagnostics (typically the
/// URL or a `source/category/city` string). The thunk is re-invoked for
/// every attempt and for every challenge poll, so it must be cheap to
/// rebuild.
pub async fn run_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    context_label: &str,
    mut op: F,
) -> Result<Attempted<T>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = policy.max_attempts.max(1);

    for attempt in 1..=max_attempts {
        match op().await {
            Ok(value) => {
                return Ok(Attempted::Completed {
                    value,
                    retries: attempt - 1,
                });
            }
            Err(e) if e.is_transient() => {
                if attempt == max_attempts {
                    warn!(
                        context = context_label,
                        attempt, "transient failure, attempt budget exhausted"
                    );
                    return Err(e);
                }
                let backoff = policy.backoff_for(attempt);
                warn!(
                    context = context_label,
                    attempt,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %e,
                    "transient failure, retrying after backoff"
                );
                sleep(backoff).await;
            }
            Err(e) if e.is_challenge() => match policy.challenge {
                ChallengeMode::Skip => {
                    warn!(context = context_label, "challenge page, skipping unit of work");
                    return Ok(Attempted::ChallengeSkipped);
                }
                ChallengeMode::WaitInteractive => {
                    let value = wait_out_challenge(policy, context_label, &mut op).await?;
                    return Ok(Attempted::Completed {
                        value,
                        retries: attempt,
                    });
                }
            },
            Err(e) => return Err(e),
        }
    }

    unreachable!("retry loop returns on final attempt")
}

/// Poll the operation until the challenge clears or the budget elapses.
async fn wait_out_challenge<T, F, Fut>(
    policy: &RetryPolicy,
    context_label: &str,
    op: &mut F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut waited = Duration::ZERO;

    while waited < policy.challenge_wait_budget {
        sleep(policy.challenge_poll_interval).await;
        waited += policy.challenge_poll_interval;

        match op().await {
            Ok(value) => {
                debug!(
                    context = context_label,
                    waited_secs = waited.as_secs(),
                    "challenge resolved"
                );
                return Ok(value);
            }
            // Still blocked, or flaky while blocked; keep polling within
            // the same budget.
            Err(e) if e.is_challenge() || e.is_transient() => {
                debug!(
                    context = context_label,
                    waited_secs = waited.as_secs(),
                    "challenge still present, polling"
                );
            }
            Err(e) => return Err(e),
        }
    }

    Err(IngestError::ChallengeTimeout {
        context: context_label.to_string(),
        waited_secs: waited.as_secs(),
    })
}
