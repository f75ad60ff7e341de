//! Retry with exponential backoff and jitter.

use std::future::Future;
use std::time::Duration;

use crate::error::{Result, ToolweaveError};

/// Retry policy for opening a model stream.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first).
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// A policy that makes exactly one attempt.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Run `operation`, retrying only errors that report
    /// [`ToolweaveError::is_retryable`].
    pub async fn execute<F, Fut, T>(&self, what: &str, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut backoff = self.initial_backoff;

        for attempt in 1..=attempts {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if !e.is_retryable() || attempt == attempts => return Err(e),
                Err(e) => {
                    let delay = match &e {
                        ToolweaveError::RateLimited {
                            retry_after_ms: Some(ms),
                        } => Duration::from_millis(*ms),
                        _ => backoff.mul_f64(0.75 + jitter() * 0.5),
                    };
                    tracing::warn!(
                        operation = what,
                        attempt,
                        max_attempts = attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "retrying after error"
                    );
                    tokio::time::sleep(delay).await;
                    backoff = backoff.mul_f64(self.multiplier).min(self.max_backoff);
                }
            }
        }

        Err(ToolweaveError::InvalidState(format!(
            "{what}: retry loop finished without a result"
        )))
    }
}

/// Pseudo-random factor in [0, 1) without pulling in a rand crate.
fn jitter() -> f64 {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut hasher = DefaultHasher::new();
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos()
        .hash(&mut hasher);
    std::thread::current().id().hash(&mut hasher);
    (hasher.finish() % 10_000) as f64 / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn retries_transient_errors_until_success() {
        let calls = AtomicU32::new(0);
        let value = RetryPolicy::default()
            .execute("open stream", || async {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(ToolweaveError::api(503, "overloaded"))
                } else {
                    Ok(7)
                }
            })
            .await
            .unwrap();
        assert_eq!(value, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn does_not_retry_permanent_errors() {
        let calls = AtomicU32::new(0);
        let err = RetryPolicy::default()
            .execute("open stream", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(ToolweaveError::api(400, "bad request"))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ToolweaveError::Api { status: 400, .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn none_makes_a_single_attempt() {
        let calls = AtomicU32::new(0);
        let _ = RetryPolicy::none()
            .execute("open stream", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(ToolweaveError::Timeout(5))
            })
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
