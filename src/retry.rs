//! Retry with exponential backoff.
//!
//! Connectivity failures on the token and import calls are retried with a
//! delay of `base_delay * multiplier^attempt`, capped at `max_delay`.
//! Anything the classifier does not consider retryable is returned at once.

use std::future::Future;
use std::time::Duration;

use crate::error::TargetError;

/// Configuration for retry behavior.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
    /// Growth factor between consecutive delays.
    pub multiplier: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 8,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(60),
            multiplier: 3,
        }
    }
}

impl RetryPolicy {
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Delay to wait after the given failed attempt (0-indexed).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.saturating_pow(attempt);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Run `operation` until it succeeds, fails with a non-retryable error, or
/// the policy runs out of attempts.
///
/// The operation receives the 0-indexed attempt number. Exhausting the policy
/// yields [`TargetError::RetriesExhausted`] wrapping the last error.
pub async fn retry<T, F, Fut, C>(policy: &RetryPolicy, is_retryable: C, mut operation: F) -> Result<T, TargetError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, TargetError>>,
    C: Fn(&TargetError) -> bool,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) if !is_retryable(&err) => return Err(err),
            Err(err) => {
                if attempt + 1 >= max_attempts {
                    tracing::error!(attempts = max_attempts, error = %err, "giving up");
                    return Err(TargetError::RetriesExhausted {
                        attempts: max_attempts,
                        source: Box::new(err),
                    });
                }

                let delay = policy.delay_for(attempt);
                tracing::warn!(
                    attempt = attempt + 1,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "transient failure, backing off"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn network_error() -> TargetError {
        TargetError::Network {
            url: "https://mock.com/token".into(),
            message: "connection refused".into(),
        }
    }

    fn fast_policy(attempts: u32) -> RetryPolicy {
        RetryPolicy::default()
            .with_max_attempts(attempts)
            .with_base_delay(Duration::from_millis(1))
    }

    #[test]
    fn test_delay_grows_by_three() {
        let policy = RetryPolicy::default()
            .with_base_delay(Duration::from_millis(100))
            .with_max_delay(Duration::from_secs(5));

        assert_eq!(policy.delay_for(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for(1), Duration::from_millis(300));
        assert_eq!(policy.delay_for(2), Duration::from_millis(900));
        assert_eq!(policy.delay_for(3), Duration::from_millis(2700));
        assert_eq!(policy.delay_for(4), Duration::from_secs(5));
        assert_eq!(policy.delay_for(40), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let calls = Cell::new(0);
        let result = retry(&fast_policy(8), TargetError::is_transient, |attempt| {
            calls.set(calls.get() + 1);
            async move {
                if attempt < 2 {
                    Err(network_error())
                } else {
                    Ok("token")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "token");
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test]
    async fn test_stops_after_max_attempts() {
        let calls = Cell::new(0);
        let result: Result<(), _> = retry(&fast_policy(4), TargetError::is_transient, |_| {
            calls.set(calls.get() + 1);
            async { Err(network_error()) }
        })
        .await;

        assert_eq!(calls.get(), 4);
        match result {
            Err(TargetError::RetriesExhausted { attempts, source }) => {
                assert_eq!(attempts, 4);
                assert!(source.is_transient());
            }
            other => panic!("Expected RetriesExhausted, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_non_retryable_error_is_returned_immediately() {
        let calls = Cell::new(0);
        let result: Result<(), _> = retry(&fast_policy(8), TargetError::is_transient, |_| {
            calls.set(calls.get() + 1);
            async {
                Err(TargetError::RemoteRejection {
                    url: "https://mock.com/import".into(),
                    status: 400,
                    body: "bad".into(),
                })
            }
        })
        .await;

        assert_eq!(calls.get(), 1);
        assert!(matches!(result, Err(TargetError::RemoteRejection { status: 400, .. })));
    }
}
