//! Retry policy with bounded exponential backoff
//!
//! Wraps a single logical geocoding operation. Every failure is retried
//! until the budget is spent; the error type is never inspected. The delay
//! before retry `k` (1-based) is `min(min_delay * factor^(k-1), max_delay)`.
//!
//! # Example
//!
//! ```rust,ignore
//! let policy = RetryPolicy::with_max_retries(3);
//! let place = policy
//!     .run(|| transport.get_json(url.clone(), timeout, agent), |err, left| {
//!         tracing::warn!(%err, left, "attempt failed");
//!     })
//!     .await?;
//! ```

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

/// Backoff factor between consecutive retries
pub const DEFAULT_FACTOR: u32 = 2;
/// Delay before the first retry
pub const DEFAULT_MIN_DELAY: Duration = Duration::from_millis(1000);
/// Upper bound for any single delay
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_millis(10_000);

/// Bounded exponential-backoff retry policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    factor: u32,
    min_delay: Duration,
    max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::with_max_retries(3)
    }
}

impl RetryPolicy {
    /// Create a policy with custom backoff parameters
    #[must_use]
    pub const fn new(max_retries: u32, factor: u32, min_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retries,
            factor,
            min_delay,
            max_delay,
        }
    }

    /// Standard geocoding backoff (factor 2, 1s to 10s) with `max_retries`
    #[must_use]
    pub const fn with_max_retries(max_retries: u32) -> Self {
        Self::new(max_retries, DEFAULT_FACTOR, DEFAULT_MIN_DELAY, DEFAULT_MAX_DELAY)
    }

    #[must_use]
    pub const fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Delay inserted before retry number `retry` (1-based)
    #[must_use]
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1);
        let multiplier = self.factor.checked_pow(exponent).unwrap_or(u32::MAX);
        self.min_delay
            .checked_mul(multiplier)
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }

    /// Run `operation` until it succeeds or the retry budget is spent
    ///
    /// `on_failed_attempt` is called with the error and the number of
    /// retries left before each backoff sleep. It is not called for the
    /// final failure, which is returned instead.
    pub async fn run<F, Fut, T, E, H>(&self, operation: F, on_failed_attempt: H) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        H: FnMut(&E, u32),
    {
        self.run_with_outcome(operation, on_failed_attempt)
            .await
            .into_result()
    }

    /// Like [`run`](Self::run) but also reports attempts and elapsed time
    #[allow(clippy::cast_possible_truncation)]
    pub async fn run_with_outcome<F, Fut, T, E, H>(
        &self,
        mut operation: F,
        mut on_failed_attempt: H,
    ) -> RetryOutcome<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        H: FnMut(&E, u32),
    {
        let start = Instant::now();
        let mut attempts = 0u32;

        loop {
            attempts += 1;

            match operation().await {
                Ok(value) => {
                    if attempts > 1 {
                        debug!(
                            attempts,
                            duration_ms = start.elapsed().as_millis() as u64,
                            "Operation succeeded after retries"
                        );
                    }
                    return RetryOutcome {
                        result: Ok(value),
                        attempts,
                        total_duration: start.elapsed(),
                    };
                },
                Err(err) => {
                    let retries_used = attempts - 1;
                    if retries_used >= self.max_retries {
                        return RetryOutcome {
                            result: Err(err),
                            attempts,
                            total_duration: start.elapsed(),
                        };
                    }

                    on_failed_attempt(&err, self.max_retries - retries_used);
                    tokio::time::sleep(self.delay_for_retry(attempts)).await;
                },
            }
        }
    }
}

/// Final result of a retried operation with attempt metadata
#[derive(Debug)]
pub struct RetryOutcome<T, E> {
    /// The result of the last attempt
    pub result: Result<T, E>,
    /// Attempts made (1 = no retries)
    pub attempts: u32,
    /// Time spent including backoff sleeps
    pub total_duration: Duration,
}

impl<T, E> RetryOutcome<T, E> {
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        self.result.is_ok()
    }

    #[must_use]
    pub const fn is_err(&self) -> bool {
        self.result.is_err()
    }

    /// Convert to standard Result, discarding metadata
    pub fn into_result(self) -> Result<T, E> {
        self.result
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use parking_lot::Mutex;

    use super::*;

    #[test]
    fn default_policy_values() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries(), 3);
        assert_eq!(policy.delay_for_retry(1), Duration::from_millis(1000));
    }

    #[test]
    fn delays_double_until_capped() {
        let policy = RetryPolicy::with_max_retries(6);

        assert_eq!(policy.delay_for_retry(1).as_millis(), 1000);
        assert_eq!(policy.delay_for_retry(2).as_millis(), 2000);
        assert_eq!(policy.delay_for_retry(3).as_millis(), 4000);
        assert_eq!(policy.delay_for_retry(4).as_millis(), 8000);
        assert_eq!(policy.delay_for_retry(5).as_millis(), 10_000);
        assert_eq!(policy.delay_for_retry(6).as_millis(), 10_000);
    }

    #[test]
    fn delay_with_huge_retry_number_is_capped() {
        let policy = RetryPolicy::with_max_retries(u32::MAX);
        assert_eq!(policy.delay_for_retry(200), DEFAULT_MAX_DELAY);
        assert_eq!(policy.delay_for_retry(u32::MAX), DEFAULT_MAX_DELAY);
    }

    #[test]
    fn custom_parameters() {
        let policy = RetryPolicy::new(2, 3, Duration::from_millis(10), Duration::from_millis(50));
        assert_eq!(policy.delay_for_retry(1).as_millis(), 10);
        assert_eq!(policy.delay_for_retry(2).as_millis(), 30);
        assert_eq!(policy.delay_for_retry(3).as_millis(), 50);
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_first_try_without_hook() {
        let policy = RetryPolicy::default();
        let hook_calls = AtomicU32::new(0);

        let outcome = policy
            .run_with_outcome(
                || async { Ok::<_, String>(42) },
                |_, _| {
                    hook_calls.fetch_add(1, Ordering::SeqCst);
                },
            )
            .await;

        assert!(outcome.is_ok());
        assert_eq!(outcome.attempts, 1);
        assert_eq!(outcome.total_duration, Duration::ZERO);
        assert_eq!(hook_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_transient_failures() {
        let policy = RetryPolicy::default();
        let calls = Arc::new(AtomicU32::new(0));

        let outcome = policy
            .run_with_outcome(
                || {
                    let calls = Arc::clone(&calls);
                    async move {
                        let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                        if n < 3 { Err("temporary".to_string()) } else { Ok(n) }
                    }
                },
                |_, _| {},
            )
            .await;

        assert_eq!(outcome.attempts, 3);
        assert_eq!(outcome.total_duration, Duration::from_millis(3000));
        assert_eq!(outcome.into_result(), Ok(3));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausts_budget_with_exact_delays() {
        let policy = RetryPolicy::with_max_retries(4);
        let origin = Instant::now();
        let attempt_times = Arc::new(Mutex::new(Vec::new()));
        let hook_log = Mutex::new(Vec::new());

        let outcome = policy
            .run_with_outcome(
                || {
                    let times = Arc::clone(&attempt_times);
                    async move {
                        let mut times = times.lock();
                        times.push(origin.elapsed().as_millis());
                        Err::<(), _>(format!("failure {}", times.len()))
                    }
                },
                |err: &String, remaining| hook_log.lock().push((err.clone(), remaining)),
            )
            .await;

        assert_eq!(outcome.attempts, 5);
        assert_eq!(outcome.result, Err("failure 5".to_string()));
        // Gaps of 1s, 2s, 4s, 8s.
        assert_eq!(*attempt_times.lock(), vec![0, 1000, 3000, 7000, 15_000]);
        assert_eq!(
            *hook_log.lock(),
            vec![
                ("failure 1".to_string(), 4),
                ("failure 2".to_string(), 3),
                ("failure 3".to_string(), 2),
                ("failure 4".to_string(), 1),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn zero_retries_means_single_attempt() {
        let policy = RetryPolicy::with_max_retries(0);
        let calls = AtomicU32::new(0);

        let result = policy
            .run(
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err::<(), _>("always fails") }
                },
                |_, _| unreachable!("no retries configured"),
            )
            .await;

        assert_eq!(result, Err("always fails"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn never_inspects_error_type() {
        // Even an error a caller would treat as permanent is retried.
        let policy = RetryPolicy::with_max_retries(2);
        let calls = AtomicU32::new(0);

        let outcome = policy
            .run_with_outcome(
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err::<(), _>(crate::GeocodingError::validation("bad input")) }
                },
                |_, _| {},
            )
            .await;

        assert!(outcome.is_err());
        assert_eq!(outcome.attempts, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
