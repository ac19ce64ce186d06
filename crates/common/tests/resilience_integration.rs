//! Integration tests for the resilience module
//!
//! Exercises the retry executor against classified errors the way the
//! queue bridge uses it.

#![cfg(feature = "runtime")]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use spillway_common::error::CommonError;
use spillway_common::resilience::{policies, RetryConfig, RetryError, RetryExecutor};

fn quick_config(attempts: u32) -> RetryConfig {
    RetryConfig::builder()
        .max_attempts(attempts)
        .exponential_backoff(Duration::from_millis(1), 2.0, Duration::from_millis(5))
        .no_jitter()
        .build()
        .expect("valid retry config")
}

/// Validates recovery from transient backend failures.
///
/// Assertions:
/// - The operation succeeds on the third attempt.
/// - The outcome reports three attempts and a non-zero delay.
#[tokio::test]
async fn classified_retry_recovers_from_transient_failures() {
    let calls = Arc::new(AtomicU32::new(0));
    let executor = RetryExecutor::new(quick_config(5), policies::ClassifiedRetry);

    let counter = calls.clone();
    let outcome = executor
        .execute_with_outcome(|| {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(CommonError::backend("queue", "throttled", true))
                } else {
                    Ok("sent")
                }
            }
        })
        .await;

    assert_eq!(outcome.attempts, 3);
    assert!(outcome.total_delay > Duration::ZERO);
    assert_eq!(outcome.result.expect("should recover"), "sent");
}

/// Validates that the attempt budget bounds persistent transient failures
/// and the final error is kept.
#[tokio::test]
async fn classified_retry_gives_up_after_budget() {
    let calls = Arc::new(AtomicU32::new(0));
    let executor = RetryExecutor::new(quick_config(5), policies::ClassifiedRetry);

    let counter = calls.clone();
    let result: Result<(), _> = executor
        .execute(|| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(CommonError::timeout("receive", Duration::from_millis(10)))
            }
        })
        .await;

    assert_eq!(calls.load(Ordering::SeqCst), 5);
    match result {
        Err(err @ RetryError::AttemptsExhausted { .. }) => {
            assert!(matches!(err.into_last_error(), Some(CommonError::Timeout { .. })));
        }
        other => panic!("expected exhaustion, got {other:?}"),
    }
}

#[tokio::test]
async fn predicate_retry_respects_attempt_index() {
    let calls = Arc::new(AtomicU32::new(0));
    let policy = policies::PredicateRetry::new(|_: &String, attempt: u32| attempt < 1);
    let executor = RetryExecutor::new(quick_config(10), policy);

    let counter = calls.clone();
    let result: Result<(), _> = executor
        .execute(|| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err("nope".to_string())
            }
        })
        .await;

    assert!(matches!(result, Err(RetryError::NonRetryable { .. })));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn total_time_budget_stops_retrying() {
    let config = RetryConfig::builder()
        .max_attempts(100)
        .fixed_backoff(Duration::from_millis(20))
        .no_jitter()
        .max_total_time(Duration::from_millis(50))
        .build()
        .expect("valid retry config");
    let executor = RetryExecutor::new(config, policies::AlwaysRetry);

    let result: Result<(), _> =
        executor.execute(|| async { Err::<(), _>("down".to_string()) }).await;

    assert!(matches!(result, Err(RetryError::TimeoutExceeded { last_error: Some(_), .. })));
}
