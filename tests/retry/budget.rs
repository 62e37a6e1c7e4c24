use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use gateway_circuitbreaker::{BreakerSettings, CircuitBreakerLayer};
use gateway_retry::RetryLayer;
use tower::{service_fn, Layer, Service};

#[derive(Debug, Clone)]
struct TransportError {
    retryable: bool,
}

/// `max_retries = R` means exactly `R + 1` attempts against a persistently
/// failing downstream.
#[tokio::test]
async fn budget_is_retries_plus_one() {
    let calls = Arc::new(AtomicUsize::new(0));
    let c = Arc::clone(&calls);
    let service = service_fn(move |_req: ()| {
        let c = Arc::clone(&c);
        async move {
            c.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(TransportError { retryable: true })
        }
    });

    let layer = RetryLayer::<(), TransportError>::builder()
        .max_attempts(3 + 1)
        .fixed_backoff(Duration::from_millis(1))
        .retry_on(|e: &TransportError| e.retryable)
        .build();
    let mut svc = layer.layer(service);

    assert!(svc.call(()).await.is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 4);
}

/// A terminal (non-retryable) failure spends exactly one attempt.
#[tokio::test]
async fn terminal_failure_spends_one_attempt() {
    let calls = Arc::new(AtomicUsize::new(0));
    let c = Arc::clone(&calls);
    let service = service_fn(move |_req: ()| {
        let c = Arc::clone(&c);
        async move {
            c.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(TransportError { retryable: false })
        }
    });

    let layer = RetryLayer::<(), TransportError>::builder()
        .max_attempts(6)
        .fixed_backoff(Duration::from_millis(1))
        .retry_on(|e: &TransportError| e.retryable)
        .build();
    let mut svc = layer.layer(service);

    assert!(svc.call(()).await.is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

/// With the breaker wrapping the retry, an exhausted call lands exactly one
/// failure sample on the breaker; attempts are not failures.
#[tokio::test]
async fn exhausted_retries_count_once_against_breaker() {
    let calls = Arc::new(AtomicUsize::new(0));
    let c = Arc::clone(&calls);
    let service = service_fn(move |_req: ()| {
        let c = Arc::clone(&c);
        async move {
            c.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(TransportError { retryable: true })
        }
    });

    let retry_layer = RetryLayer::<(), TransportError>::builder()
        .max_attempts(4)
        .fixed_backoff(Duration::from_millis(1))
        .build();
    let breaker_layer = CircuitBreakerLayer::from_core(
        BreakerSettings::builder()
            .name("fraud")
            .failure_threshold(10)
            .window_size(10)
            .build_core(),
    );
    let mut svc = breaker_layer.layer_service(retry_layer.layer(service));

    assert!(svc.call(()).await.is_err());

    // Four HTTP attempts, one breaker failure sample.
    assert_eq!(calls.load(Ordering::SeqCst), 4);
    let snapshot = svc.core().snapshot().await;
    assert_eq!(snapshot.recent_failures, 1);
    assert_eq!(snapshot.total_calls, 1);
}
