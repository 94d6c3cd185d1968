use std::time::Duration;
use tokio::sync::watch;
use tokio::time::sleep;

// ============================================================================
// Exponential Backoff Retry Policy
// ============================================================================
//
// Pure decision logic for the per-message retry loop:
// - should_retry: may another attempt follow `n` failures?
// - backoff_delay: how long to wait before the n-th retry (base * 2^(n-1))
//
// retry_on_transient drives an async operation with this policy and stops
// early when the shutdown flag flips while it is waiting out a backoff.
//
// ============================================================================

#[derive(Clone, Debug, PartialEq)]
pub struct RetryPolicy {
    /// Retries allowed after the initial attempt
    pub max_retries: u32,
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Upper bound on any single delay
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay,
        }
    }

    /// Total attempts a message may receive (initial attempt plus retries)
    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// True while `attempt_count` failures still leave room for another try.
    pub fn should_retry(&self, attempt_count: u32) -> bool {
        attempt_count <= self.max_retries
    }

    /// Delay before the `attempt_count`-th retry. Zero before any failure.
    pub fn backoff_delay(&self, attempt_count: u32) -> Duration {
        if attempt_count == 0 {
            return Duration::ZERO;
        }

        let factor = 1u32.checked_shl(attempt_count - 1).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

/// Result of a retried operation
#[derive(Debug)]
pub enum RetryResult<T, E> {
    /// Operation succeeded on attempt `attempts`
    Success { value: T, attempts: u32 },
    /// Every allowed attempt failed with a transient error
    Exhausted { error: E, attempts: u32 },
    /// Operation failed with an error that must not be retried
    PermanentFailure { error: E, attempts: u32 },
    /// Shutdown arrived while waiting out a backoff
    Interrupted { error: E, attempts: u32 },
}

impl<T, E> RetryResult<T, E> {
    pub fn attempts(&self) -> u32 {
        match self {
            RetryResult::Success { attempts, .. }
            | RetryResult::Exhausted { attempts, .. }
            | RetryResult::PermanentFailure { attempts, .. }
            | RetryResult::Interrupted { attempts, .. } => *attempts,
        }
    }
}

/// Check if an error is transient (should retry) or permanent (should not retry)
pub trait IsTransient {
    fn is_transient(&self) -> bool;
}

/// Run `operation` until it succeeds, fails permanently, runs out of
/// attempts, or is interrupted by shutdown during a backoff.
///
/// The closure receives the 1-based attempt number.
pub async fn retry_on_transient<F, Fut, T, E>(
    policy: &RetryPolicy,
    shutdown: &mut watch::Receiver<bool>,
    mut operation: F,
) -> RetryResult<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display + IsTransient,
{
    let mut failures = 0;

    loop {
        let attempt = failures + 1;

        match operation(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!(attempt = attempt, "Operation succeeded after retry");
                }
                return RetryResult::Success { value, attempts: attempt };
            }
            Err(error) => {
                failures += 1;

                if !error.is_transient() {
                    tracing::error!(
                        error = %error,
                        attempt = attempt,
                        "Permanent failure detected, not retrying"
                    );
                    return RetryResult::PermanentFailure { error, attempts: attempt };
                }

                if !policy.should_retry(failures) {
                    tracing::error!(
                        attempt = attempt,
                        error = %error,
                        "Operation failed after all retries"
                    );
                    return RetryResult::Exhausted { error, attempts: attempt };
                }

                let delay = policy.backoff_delay(failures);
                tracing::warn!(
                    retry = failures,
                    max_retries = policy.max_retries,
                    error = %error,
                    delay_ms = delay.as_millis() as u64,
                    "Transient failure, retrying after delay"
                );

                tokio::select! {
                    _ = sleep(delay) => {}
                    _ = wait_for_shutdown(shutdown) => {
                        tracing::error!(
                            attempt = attempt,
                            error = %error,
                            "Retry interrupted by shutdown"
                        );
                        return RetryResult::Interrupted { error, attempts: attempt };
                    }
                }
            }
        }
    }
}

/// Resolves once the shutdown flag is set. A dropped sender never resolves.
pub async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    let sender_dropped = shutdown.wait_for(|stop| *stop).await.is_err();
    if sender_dropped {
        std::future::pending::<()>().await;
    }
}
