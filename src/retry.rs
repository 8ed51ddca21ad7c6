//! Exponential-backoff retry executor.
//!
//! [`with_retry`] wraps any fallible async operation. The delay before retry
//! attempt k (1-indexed) is `initial_delay * 2^(k-1)` unless a fixed delay
//! overrides it (used for server-specified rate-limit waits). Delays go
//! through `tokio::time::sleep`, so tests drive them deterministically with
//! a paused clock instead of sleeping in real time.

use std::future::Future;
use std::time::Duration;

use crate::error::{classify, ExperimentError};

/// Options controlling retry behavior.
#[derive(Debug, Clone)]
pub struct RetryOptions {
    /// Maximum number of retries after the initial attempt.
    /// Zero means exactly one attempt.
    pub max_retries: u32,
    /// Base delay for exponential backoff
    pub initial_delay: Duration,
    /// Fixed delay overriding the exponential schedule when set
    pub fixed_delay: Option<Duration>,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(1000),
            fixed_delay: None,
        }
    }
}

impl RetryOptions {
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_initial_delay(mut self, initial_delay: Duration) -> Self {
        self.initial_delay = initial_delay;
        self
    }

    pub fn with_fixed_delay(mut self, fixed_delay: Duration) -> Self {
        self.fixed_delay = Some(fixed_delay);
        self
    }
}

/// Delay before retry attempt `attempt` (1-indexed).
fn backoff_delay(initial: Duration, attempt: u32) -> Duration {
    initial.saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
}

/// Run `operation`, retrying on failure up to `options.max_retries` times.
///
/// On exhaustion the most recent error is returned verbatim.
pub async fn with_retry<T, E, F, Fut>(options: &RetryOptions, operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    with_retry_observed(options, operation, |_, _| {}).await
}

/// Like [`with_retry`], invoking `on_retry(attempt, delay)` once per retry.
/// The observer never fires for the final failed attempt.
pub async fn with_retry_observed<T, E, F, Fut>(
    options: &RetryOptions,
    mut operation: F,
    mut on_retry: impl FnMut(u32, Duration),
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 0u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if attempt >= options.max_retries {
                    return Err(err);
                }
                attempt += 1;
                let delay = options
                    .fixed_delay
                    .unwrap_or_else(|| backoff_delay(options.initial_delay, attempt));
                tracing::warn!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Operation failed, retrying: {err}"
                );
                on_retry(attempt, delay);
                tokio::time::sleep(delay).await;
            }
        }
    }
}

/// Retry an operation using the error-classification policy: permanent
/// kinds fail immediately, rate limits wait the server-specified delay,
/// and other transient kinds back off exponentially.
pub async fn with_retry_classified<T, F, Fut>(
    options: &RetryOptions,
    mut operation: F,
) -> Result<T, ExperimentError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ExperimentError>>,
{
    let mut attempt = 0u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                let advice = classify(&err);
                if !advice.can_retry || attempt >= options.max_retries {
                    return Err(err);
                }
                attempt += 1;
                let delay = advice
                    .retry_after
                    .or(options.fixed_delay)
                    .unwrap_or_else(|| backoff_delay(options.initial_delay, attempt));
                tracing::warn!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    kind = advice.kind.as_str(),
                    "Operation failed, retrying: {err}"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
