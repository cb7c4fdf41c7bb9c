//! Linear-backoff retry
//!
//! Every remote call goes through [`retry_linear`]. Attempt `n` (1-based) that
//! fails with a retriable error waits `base_delay * n` before attempt `n + 1`;
//! after `max_retries` additional attempts the last error is returned.

use std::future::Future;
use std::time::Duration;

/// Retry ceiling and delay unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Additional attempts after the first
    pub max_retries: u32,
    /// Delay unit
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// Single attempt, no waiting
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// Wait after failed attempt `attempt` (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(2, Duration::from_millis(1000))
    }
}

/// Run `operation` until it succeeds, fails non-retriably, or runs out of attempts
///
/// # Arguments
/// * `operation_name` - Name for logging (e.g., "sales order fetch", "row submission")
/// * `policy` - Retry ceiling and delay unit
/// * `is_retriable` - Classifies an error as worth another attempt
/// * `operation` - Async closure performing one attempt
pub async fn retry_linear<F, Fut, T, E, R>(
    operation_name: &str,
    policy: &RetryPolicy,
    is_retriable: R,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    R: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let mut attempt = 0u32;

    loop {
        attempt += 1;

        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::debug!(
                        operation = operation_name,
                        attempt,
                        "Operation succeeded after retry"
                    );
                }
                return Ok(result);
            }
            Err(err) => {
                if !is_retriable(&err) {
                    return Err(err);
                }

                if attempt > policy.max_retries {
                    tracing::warn!(
                        operation = operation_name,
                        attempt,
                        error = %err,
                        "Retries exhausted"
                    );
                    return Err(err);
                }

                let delay = policy.delay_for(attempt);
                tracing::warn!(
                    operation = operation_name,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Attempt failed, will retry after delay"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
