//! Tests for utility modules (retry, timeout).

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use toolweave::error::ToolweaveError;
use toolweave::util::retry::RetryPolicy;
use toolweave::util::timeout::with_timeout;

#[tokio::test(start_paused = true)]
async fn retry_policy_retries_retryable_errors_until_success() {
    let policy = RetryPolicy {
        max_attempts: 4,
        initial_backoff: Duration::from_millis(100),
        max_backoff: Duration::from_millis(100),
        multiplier: 2.0,
    };
    let attempts = Arc::new(AtomicUsize::new(0));

    let result = policy
        .execute("flaky", || {
            let attempts = attempts.clone();
            async move {
                let attempt = attempts.fetch_add(1, Ordering::SeqCst);
                if attempt < 2 {
                    Err(ToolweaveError::Timeout(100))
                } else {
                    Ok::<_, ToolweaveError>("ok")
                }
            }
        })
        .await;

    assert_eq!(result.unwrap(), "ok");
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn retry_policy_stops_immediately_for_non_retryable_errors() {
    let policy = RetryPolicy {
        max_attempts: 5,
        initial_backoff: Duration::from_millis(1),
        max_backoff: Duration::from_millis(2),
        multiplier: 2.0,
    };
    let attempts = Arc::new(AtomicUsize::new(0));

    let result: Result<(), _> = policy
        .execute("auth", || {
            let attempts = attempts.clone();
            async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(ToolweaveError::Authentication("bad key".into()))
            }
        })
        .await;

    assert!(matches!(result, Err(ToolweaveError::Authentication(_))));
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn retry_policy_returns_last_error_when_attempts_run_out() {
    let policy = RetryPolicy::default();
    let attempts = Arc::new(AtomicUsize::new(0));

    let result: Result<(), _> = policy
        .execute("overloaded", || {
            let attempts = attempts.clone();
            async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(ToolweaveError::api(503, "unavailable"))
            }
        })
        .await;

    assert!(matches!(result, Err(ToolweaveError::Api { status: 503, .. })));
    assert_eq!(attempts.load(Ordering::SeqCst), policy.max_attempts as usize);
}

#[tokio::test(start_paused = true)]
async fn with_timeout_maps_expiry_to_timeout_error() {
    let result = with_timeout(Duration::from_millis(40), async {
        tokio::time::sleep(Duration::from_secs(10)).await;
        Ok(())
    })
    .await;
    assert!(matches!(result, Err(ToolweaveError::Timeout(40))));

    let fast = with_timeout(Duration::from_secs(1), async { Ok(5) }).await;
    assert_eq!(fast.unwrap(), 5);
}
