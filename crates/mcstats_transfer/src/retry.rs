//! Generic retry with exponential backoff and cancellable waits.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Classifies errors into those worth retrying and those that are not.
pub trait Retryable {
    /// Returns true if a retry of the failed operation could succeed.
    fn is_retryable(&self) -> bool;
}

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Multiplier applied to the delay for each further retry.
    pub backoff_multiplier: f64,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Creates a policy with the given attempt budget and default backoff
    /// (1 s initial delay, doubled per retry, capped at 30 s).
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay: Duration::from_secs(1),
            backoff_multiplier: 2.0,
            max_delay: Duration::from_secs(30),
        }
    }

    /// Sets the initial delay.
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the backoff multiplier.
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Sets the maximum delay.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Calculates the delay before the given attempt (0-indexed; attempt 0
    /// never waits). The delay grows as `initial * multiplier^(attempt-1)`,
    /// clamped to `max_delay`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let delay = self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        Duration::from_secs_f64(delay.min(self.max_delay.as_secs_f64()))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3)
    }
}

/// Error returned by [`with_retries`].
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// The operation failed with a non-retryable error, or all attempts
    /// were exhausted; holds the last failure.
    #[error("{0}")]
    Operation(E),

    /// The shutdown token fired during a backoff wait.
    #[error("cancelled during retry backoff")]
    Cancelled,
}

/// Invokes `op` up to `policy.max_attempts` times.
///
/// Only errors whose [`Retryable::is_retryable`] returns true are retried;
/// anything else propagates on first occurrence. Backoff waits between
/// attempts are raced against `shutdown`, so a cancellation during a wait
/// returns promptly instead of sleeping out the full delay.
pub async fn with_retries<T, E, F, Fut>(
    policy: &RetryPolicy,
    shutdown: &CancellationToken,
    mut op: F,
) -> Result<T, RetryError<E>>
where
    E: Retryable + Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut failures = 0u32;

    loop {
        if failures > 0 {
            let delay = policy.delay_for_attempt(failures);
            debug!(
                attempt = failures + 1,
                delay_secs = delay.as_secs_f64(),
                "waiting before retry"
            );
            tokio::select! {
                _ = shutdown.cancelled() => return Err(RetryError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
        if shutdown.is_cancelled() {
            return Err(RetryError::Cancelled);
        }

        match op().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                failures += 1;
                if !e.is_retryable() || failures >= max_attempts {
                    return Err(RetryError::Operation(e));
                }
                warn!(
                    attempt = failures,
                    max_attempts,
                    error = %e,
                    "attempt failed, will retry"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransferError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::Instant;

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts)
            .with_initial_delay(Duration::from_secs(5))
            .with_backoff_multiplier(2.0)
            .with_max_delay(Duration::from_secs(30))
    }

    #[test]
    fn delay_growth_and_cap() {
        let policy = policy(5);
        assert_eq!(policy.delay_for_attempt(0), Duration::ZERO);
        assert_eq!(policy.delay_for_attempt(1), Duration::from_secs(5));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_secs(10));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_secs(20));
        // 40 s would exceed the cap.
        assert_eq!(policy.delay_for_attempt(4), Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn two_failures_then_success() {
        let calls = AtomicUsize::new(0);
        let calls_ref = &calls;
        let token = CancellationToken::new();
        let start = Instant::now();

        let result = with_retries(&policy(3), &token, move || async move {
            let n = calls_ref.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                Err(TransferError::Transfer("flaky".into()))
            } else {
                Ok(n)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 5 s before the second attempt, 10 s before the third.
        assert_eq!(start.elapsed(), Duration::from_secs(15));
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_surfaces_last_error() {
        let calls = AtomicUsize::new(0);
        let calls_ref = &calls;
        let token = CancellationToken::new();

        let result: Result<(), _> = with_retries(&policy(3), &token, move || async move {
            calls_ref.fetch_add(1, Ordering::SeqCst);
            Err(TransferError::Connection("refused".into()))
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        match result {
            Err(RetryError::Operation(TransferError::Connection(_))) => {}
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn non_retryable_propagates_immediately() {
        let calls = AtomicUsize::new(0);
        let calls_ref = &calls;
        let token = CancellationToken::new();

        let result: Result<(), _> = with_retries(&policy(5), &token, move || async move {
            calls_ref.fetch_add(1, Ordering::SeqCst);
            Err(TransferError::Authentication("bad password".into()))
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(
            result,
            Err(RetryError::Operation(TransferError::Authentication(_)))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_aborts_backoff_promptly() {
        let token = CancellationToken::new();
        let task_token = token.clone();
        let start = Instant::now();

        // Backoff of an hour; the task must return long before that once
        // the token fires.
        let long_policy = RetryPolicy::new(3)
            .with_initial_delay(Duration::from_secs(3600))
            .with_max_delay(Duration::from_secs(3600));
        let handle = tokio::spawn(async move {
            with_retries::<(), _, _, _>(&long_policy, &task_token, || async {
                Err(TransferError::Transfer("down".into()))
            })
            .await
        });

        // Let the first attempt fail and the backoff wait begin.
        tokio::task::yield_now().await;
        token.cancel();

        let result = handle.await.unwrap();
        assert!(matches!(result, Err(RetryError::Cancelled)));
        assert!(start.elapsed() < Duration::from_secs(3600));
    }

    #[tokio::test]
    async fn cancelled_before_first_attempt() {
        let calls = AtomicUsize::new(0);
        let calls_ref = &calls;
        let token = CancellationToken::new();
        token.cancel();

        let result = with_retries(&policy(3), &token, move || async move {
            calls_ref.fetch_add(1, Ordering::SeqCst);
            Ok::<_, TransferError>(())
        })
        .await;

        assert!(matches!(result, Err(RetryError::Cancelled)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
