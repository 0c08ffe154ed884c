// crates/flowcore/tests/retry_test.rs

use flowcore::{run_with_retry, NodeError, RetryPolicy};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use tokio::time::{Duration, Instant};

/// Initialize tracing for tests
fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};
    let _ = fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("debug"))
        )
        .with_test_writer()
        .try_init();
}

#[tokio::test(start_paused = true)]
async fn test_permanent_failure_follows_doubling_law() {
    init_tracing();

    let attempts = Arc::new(Mutex::new(Vec::new()));
    let recorder = attempts.clone();

    let result: Result<(), String> = run_with_retry(
        move || {
            let recorder = recorder.clone();
            async move {
                let mut seen = recorder.lock().unwrap();
                seen.push(Instant::now());
                Err(format!("failure #{}", seen.len()))
            }
        },
        3,
        1000,
    )
    .await;

    // The last failure is the one reported
    assert_eq!(result.unwrap_err(), "failure #3");

    let seen = attempts.lock().unwrap();
    assert_eq!(seen.len(), 3, "operation should be attempted exactly 3 times");

    let first_gap = seen[1] - seen[0];
    let second_gap = seen[2] - seen[1];
    assert!(first_gap >= Duration::from_millis(1000) && first_gap < Duration::from_millis(1100));
    assert!(second_gap >= Duration::from_millis(2000) && second_gap < Duration::from_millis(2100));
}

#[tokio::test(start_paused = true)]
async fn test_success_after_transient_failures() {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();

    let result = RetryPolicy::new(3, 10)
        .run(move || {
            let counter = counter.clone();
            async move {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(NodeError::Transport("connection reset".to_string()))
                } else {
                    Ok("delivered")
                }
            }
        })
        .await;

    assert_eq!(result.unwrap(), "delivered");
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn test_validation_errors_are_not_retried() {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();

    let result: Result<(), NodeError> = RetryPolicy::default()
        .run(move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(NodeError::InvalidAddress("not-an-email".to_string()))
            }
        })
        .await;

    assert!(matches!(result, Err(NodeError::InvalidAddress(_))));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_zero_attempts_runs_once() {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();

    let result: Result<(), String> = run_with_retry(
        move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err("boom".to_string())
            }
        },
        0,
        1000,
    )
    .await;

    assert!(result.is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}
