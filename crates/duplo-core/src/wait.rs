//! Wait/poll engine.
//!
//! Cloud changes are eventually consistent. A command that needs to block
//! until a change lands hands a predicate to [`WaitPolicy::wait`], which
//! calls it until it reports [`Poll::Ready`], reports [`Poll::Failed`], or
//! the attempt budget runs out.
//!
//! ```text
//!            Waiting / retryable error
//!              ┌──────────┐
//!              ▼          │
//!         ┌─────────┐─────┘      Ready     ┌───────────┐
//!  ──────►│ POLLING │───────────────────►  │ SUCCEEDED │
//!         └─────────┘                      └───────────┘
//!           │     │      Failed            ┌───────────┐
//!           │     └──────────────────────► │  FAILED   │
//!           │  budget exhausted            └───────────┘
//!           │                              ┌───────────┐
//!           └────────────────────────────► │ TIMED_OUT │
//!                                          └───────────┘
//! ```
//!
//! The budget is `ceil(timeout / poll_interval)` attempts. The engine
//! sleeps between attempts, never after the last one, and caches nothing:
//! every call of the predicate reads fresh state.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::{DuploError, Result};

/// Outcome of one predicate call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Poll<T> {
    /// Done; the wait returns this value.
    Ready(T),
    /// Not done yet; the message is logged.
    Waiting(String),
    /// Will never converge; the wait stops immediately.
    Failed(String),
}

impl<T> Poll<T> {
    /// Shorthand for [`Poll::Waiting`].
    pub fn waiting(message: impl Into<String>) -> Self {
        Self::Waiting(message.into())
    }

    /// Shorthand for [`Poll::Failed`].
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed(reason.into())
    }
}

/// Timeout and interval of a wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    timeout: Duration,
    poll_interval: Duration,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_TIMEOUT)
    }
}

impl WaitPolicy {
    /// Default total timeout.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3600);

    /// Default interval between attempts.
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

    /// Creates a policy with the default poll interval.
    #[must_use]
    pub const fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            poll_interval: Self::DEFAULT_POLL_INTERVAL,
        }
    }

    /// Sets the interval between attempts.
    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Sets the total timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Total timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Interval between attempts.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Number of predicate calls before giving up.
    ///
    /// A zero interval spends one attempt per started second of timeout.
    /// Never less than one.
    #[must_use]
    pub fn attempts(&self) -> u64 {
        let timeout = self.timeout.as_nanos();
        let step = if self.poll_interval.is_zero() {
            Duration::from_secs(1).as_nanos()
        } else {
            self.poll_interval.as_nanos()
        };
        u64::try_from(timeout.div_ceil(step)).unwrap_or(u64::MAX).max(1)
    }

    /// Polls `predicate`, sleeping the calling thread between attempts.
    ///
    /// # Errors
    ///
    /// - [`DuploError::FailedResource`] as soon as the predicate fails.
    /// - Any non-retryable error the predicate returns, unchanged.
    /// - [`DuploError::Timeout`] once the budget is spent.
    pub fn wait<T, F>(&self, predicate: F) -> Result<T>
    where
        F: FnMut() -> Result<Poll<T>>,
    {
        self.wait_with(predicate, std::thread::sleep)
    }

    /// Same as [`WaitPolicy::wait`] with a custom sleep function.
    pub fn wait_with<T, F, S>(&self, mut predicate: F, mut sleep: S) -> Result<T>
    where
        F: FnMut() -> Result<Poll<T>>,
        S: FnMut(Duration),
    {
        let attempts = self.attempts();
        let mut last_reason = String::new();

        for attempt in 1..=attempts {
            match predicate() {
                Ok(Poll::Ready(value)) => {
                    debug!(attempt, "Wait finished");
                    return Ok(value);
                }
                Ok(Poll::Failed(reason)) => {
                    debug!(attempt, reason = %reason, "Wait failed");
                    return Err(DuploError::FailedResource(reason));
                }
                Ok(Poll::Waiting(message)) => {
                    if !message.is_empty() {
                        info!(attempt, attempts, "{message}");
                    }
                    last_reason = message;
                }
                Err(err) if err.is_retryable() => {
                    debug!(attempt, error = %err, "Retrying after error");
                    last_reason = err.to_string();
                }
                Err(err) => return Err(err),
            }

            if attempt < attempts && !self.poll_interval.is_zero() {
                sleep(self.poll_interval);
            }
        }

        warn!(
            attempts,
            timeout_secs = self.timeout.as_secs(),
            "Gave up waiting"
        );
        let mut message = format!(
            "no result after {attempts} attempts over {}s",
            self.timeout.as_secs()
        );
        if !last_reason.is_empty() {
            message.push_str(": ");
            message.push_str(&last_reason);
        }
        Err(DuploError::Timeout(message))
    }
}
