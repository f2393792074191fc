//! Activity retry policy: exponential backoff with a per-attempt timeout.

use crate::services::StoreError;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

/// Retry behavior applied to every activity invocation.
#[derive(Clone, Debug)]
pub struct ActivityRetryPolicy {
    /// Per-attempt timeout; an attempt exceeding it counts as a retryable
    /// failure.
    pub start_to_close: Duration,
    /// Backoff before the first retry.
    pub initial_interval: Duration,
    /// Backoff multiplier between attempts.
    pub backoff_coefficient: f64,
    /// Backoff ceiling.
    pub maximum_interval: Duration,
    /// Total attempts, including the initial one.
    pub maximum_attempts: u32,
}

impl Default for ActivityRetryPolicy {
    fn default() -> Self {
        Self {
            start_to_close: Duration::from_secs(30),
            initial_interval: Duration::from_secs(1),
            backoff_coefficient: 2.0,
            maximum_interval: Duration::from_secs(60),
            maximum_attempts: 10,
        }
    }
}

impl ActivityRetryPolicy {
    fn backoff_duration(&self, attempt: u32) -> Duration {
        let backoff = self.initial_interval.as_millis() as f64
            * self.backoff_coefficient.powi(attempt as i32);
        Duration::from_millis(backoff.min(self.maximum_interval.as_millis() as f64) as u64)
    }
}

/// Run an activity under the retry policy.
///
/// `NotFound` and `AlreadyExists` are permanent and short-circuit;
/// `Unavailable` (including start-to-close timeouts) is retried until
/// `maximum_attempts` is reached, after which the last error is returned.
pub(crate) async fn execute_activity<F, Fut, T>(
    policy: &ActivityRetryPolicy,
    operation: &'static str,
    f: F,
) -> Result<T, StoreError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
{
    let mut attempt: u32 = 0;

    loop {
        let result = match tokio::time::timeout(policy.start_to_close, f()).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Unavailable(anyhow::anyhow!(
                "activity {} exceeded start-to-close timeout",
                operation
            ))),
        };

        match result {
            Ok(value) => {
                if attempt > 0 {
                    info!(
                        operation = operation,
                        attempt = attempt + 1,
                        "Activity succeeded after retry"
                    );
                }
                return Ok(value);
            }
            Err(err) => {
                if !err.is_retryable() {
                    warn!(
                        operation = operation,
                        error = %err,
                        "Activity failed with permanent error, not retrying"
                    );
                    return Err(err);
                }

                if attempt + 1 >= policy.maximum_attempts {
                    warn!(
                        operation = operation,
                        attempt = attempt + 1,
                        error = %err,
                        "Activity failed after max attempts"
                    );
                    return Err(err);
                }

                let backoff = policy.backoff_duration(attempt);
                warn!(
                    operation = operation,
                    attempt = attempt + 1,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %err,
                    "Activity failed, retrying after backoff"
                );

                sleep(backoff).await;
                attempt += 1;
            }
        }
    }
}
