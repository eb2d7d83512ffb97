//! Retry policy with exponential backoff and jitter.
//!
//! One [`RetryPolicy`] value describes how a stage retries a failed call;
//! [`retry_with_policy`] runs the loop. Search, fetch and summarize all go
//! through the same loop so backoff and cancellation behave identically
//! everywhere.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

/// Default number of retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// Default base delay for exponential backoff in milliseconds.
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 1000;

/// Default maximum delay for exponential backoff in milliseconds.
pub const DEFAULT_RETRY_MAX_DELAY_MS: u64 = 8000;

/// Default backoff multiplier (2.0 for exponential backoff).
pub const DEFAULT_RETRY_BACKOFF_MULTIPLIER: f64 = 2.0;

/// Default jitter as a fraction of the computed delay.
pub const DEFAULT_RETRY_JITTER: f64 = 0.1;

/// Retry policy for handling transient failures.
///
/// # Examples
///
/// ```
/// use sage_search::retry::RetryPolicy;
///
/// let policy = RetryPolicy::default();
/// assert_eq!(policy.max_retries, 2);
/// assert_eq!(policy.max_calls(), 3);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Maximum number of retries after the first attempt (0 = no retries).
    pub max_retries: u32,
    /// Base delay in milliseconds for exponential backoff.
    pub base_delay_ms: u64,
    /// Maximum delay in milliseconds (caps exponential growth).
    pub max_delay_ms: u64,
    /// Backoff multiplier (2.0 for exponential backoff).
    pub backoff_multiplier: f64,
    /// Random extra delay as a fraction of the computed delay (0.0..=1.0).
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay_ms: DEFAULT_RETRY_BASE_DELAY_MS,
            max_delay_ms: DEFAULT_RETRY_MAX_DELAY_MS,
            backoff_multiplier: DEFAULT_RETRY_BACKOFF_MULTIPLIER,
            jitter: DEFAULT_RETRY_JITTER,
        }
    }
}

impl RetryPolicy {
    /// Create a new retry policy with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// A policy that makes exactly one call.
    pub fn no_retry() -> Self {
        Self::default().with_max_retries(0)
    }

    /// Set the maximum number of retries.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the base delay in milliseconds.
    pub fn with_base_delay_ms(mut self, base_delay_ms: u64) -> Self {
        self.base_delay_ms = base_delay_ms;
        self
    }

    /// Set the maximum delay in milliseconds.
    pub fn with_max_delay_ms(mut self, max_delay_ms: u64) -> Self {
        self.max_delay_ms = max_delay_ms;
        self
    }

    /// Set the jitter fraction.
    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter;
        self
    }

    /// Total number of calls this policy allows, including the first.
    pub fn max_calls(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Calculate the delay before retry number `attempt` (1-based).
    ///
    /// Formula: min(base * multiplier^(attempt-1), max_delay) + jitter
    /// where jitter is a random value between 0 and `jitter` of the delay.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::from_millis(0);
        }

        let base = self.base_delay_ms as f64;
        let max = self.max_delay_ms as f64;
        let exp = self.backoff_multiplier.powi(attempt as i32 - 1);
        let delay = (base * exp).min(max);

        let jitter = delay * (rand::random::<f64>() * self.jitter.clamp(0.0, 1.0));
        Duration::from_millis((delay + jitter) as u64)
    }
}

/// Why [`retry_with_policy`] gave up.
#[derive(Debug, Clone, PartialEq)]
pub enum RetryError<E> {
    /// The cancellation token fired before or during an attempt.
    Cancelled,
    /// The last attempt failed, either with a non-retryable error or after
    /// the policy's retries were used up.
    Failed {
        /// Error returned by the last attempt.
        error: E,
        /// Number of calls made, including the first.
        attempts: u32,
    },
}

/// Run `operation` until it succeeds, fails with a non-retryable error, or
/// the policy is exhausted.
///
/// `is_retryable` decides whether an error is worth another attempt. The
/// cancellation token is checked before every attempt and raced against the
/// in-flight attempt and the backoff sleep, so a cancelled run abandons the
/// call immediately.
pub async fn retry_with_policy<T, E, F, Fut, P>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    is_retryable: P,
    mut operation: F,
) -> std::result::Result<T, RetryError<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
    P: Fn(&E) -> bool,
{
    let mut attempt = 0u32;

    loop {
        if cancel.is_cancelled() {
            return Err(RetryError::Cancelled);
        }

        let outcome = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(RetryError::Cancelled),
            outcome = operation(attempt) => outcome,
        };

        let error = match outcome {
            Ok(value) => return Ok(value),
            Err(error) => error,
        };

        let calls = attempt.saturating_add(1);
        if !is_retryable(&error) || attempt >= policy.max_retries {
            return Err(RetryError::Failed {
                error,
                attempts: calls,
            });
        }

        attempt = calls;
        let delay = policy.delay_for_attempt(attempt);
        tracing::debug!(attempt, delay_ms = delay.as_millis() as u64, "retrying after backoff");
        tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(RetryError::Cancelled),
            () = tokio::time::sleep(delay) => {}
        }
    }
}
