//! Shared request pacing for the HTTP collaborators: a governor rate limiter
//! and an exponential backoff retry loop.

use std::future::Future;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use backoff::ExponentialBackoffBuilder;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use tracing::{debug, warn};

/// Errors that know whether a retry could help.
pub trait Retryable: std::fmt::Display {
    /// Whether the same request may succeed later.
    fn is_transient(&self) -> bool;

    /// Server-requested delay before the next attempt, if any.
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

/// Direct (unkeyed) limiter allowing `requests_per_second` with no burst.
pub fn rate_limiter(requests_per_second: u32) -> DefaultDirectRateLimiter {
    let rps = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);
    RateLimiter::direct(Quota::per_second(rps))
}

/// Retry policy with exponential backoff for transient errors
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry.
    pub initial_backoff: Duration,
    /// Upper bound for any delay.
    pub max_backoff: Duration,
}

impl RetryPolicy {
    /// Policy from raw config values.
    pub fn new(max_retries: u32, initial_backoff_ms: u64, max_backoff_ms: u64) -> Self {
        Self {
            max_retries,
            initial_backoff: Duration::from_millis(initial_backoff_ms),
            max_backoff: Duration::from_millis(max_backoff_ms.max(initial_backoff_ms)),
        }
    }

    /// Run `operation` until it succeeds, fails permanently, or the retry
    /// budget is spent. `what` names the call in logs.
    pub async fn execute<T, E, F, Fut>(&self, what: &str, mut operation: F) -> Result<T, E>
    where
        E: Retryable,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let schedule = ExponentialBackoffBuilder::new()
            .with_initial_interval(self.initial_backoff)
            .with_max_interval(self.max_backoff)
            .with_randomization_factor(0.1)
            .with_max_elapsed_time(None)
            .build();
        let attempts = AtomicU32::new(0);
        let max_retries = self.max_retries;

        backoff::future::retry(schedule, || {
            let attempt = attempts.fetch_add(1, Ordering::SeqCst);
            let call = operation();
            async move {
                match call.await {
                    Ok(value) => Ok(value),
                    Err(err) if !err.is_transient() => {
                        debug!(call = what, error = %err, "permanent error, not retrying");
                        Err(backoff::Error::permanent(err))
                    }
                    Err(err) if attempt >= max_retries => {
                        warn!(call = what, attempts = attempt + 1, error = %err, "retries exhausted");
                        Err(backoff::Error::permanent(err))
                    }
                    Err(err) => {
                        warn!(call = what, attempt = attempt + 1, error = %err, "transient error, retrying");
                        match err.retry_after() {
                            Some(delay) => Err(backoff::Error::retry_after(err, delay)),
                            None => Err(backoff::Error::transient(err)),
                        }
                    }
                }
            }
        })
        .await
    }
}
