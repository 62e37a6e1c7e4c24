use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use gateway_circuitbreaker::{BreakerSettings, CircuitBreakerLayer, CircuitState};
use tokio::time::sleep;
use tower::{service_fn, Service};

fn switchable_service(
    fail: Arc<AtomicBool>,
) -> impl Service<
    (),
    Response = (),
    Error = &'static str,
    Future = impl std::future::Future<Output = Result<(), &'static str>> + Send,
> + Clone {
    service_fn(move |_req: ()| {
        let fail = Arc::clone(&fail);
        async move {
            if fail.load(Ordering::SeqCst) {
                Err::<(), _>("error")
            } else {
                Ok(())
            }
        }
    })
}

/// After the open timeout, the next call probes in half-open; enough
/// consecutive successes close the circuit.
#[tokio::test]
async fn recovers_through_half_open() {
    let fail = Arc::new(AtomicBool::new(true));
    let layer = CircuitBreakerLayer::from_core(
        BreakerSettings::builder()
            .name("search")
            .failure_threshold(1)
            .success_threshold(2)
            .open_timeout(Duration::from_millis(50))
            .build_core(),
    );
    let mut cb = layer.layer_service(switchable_service(Arc::clone(&fail)));

    let _ = cb.call(()).await;
    assert_eq!(cb.core().state().await, CircuitState::Open);

    fail.store(false, Ordering::SeqCst);
    sleep(Duration::from_millis(60)).await;

    // First probe lands in half-open.
    cb.call(()).await.unwrap();
    assert_eq!(cb.core().state().await, CircuitState::HalfOpen);

    // Second success closes.
    cb.call(()).await.unwrap();
    assert_eq!(cb.core().state().await, CircuitState::Closed);
}

/// A failed probe sends the circuit straight back to open.
#[tokio::test]
async fn half_open_failure_reopens() {
    let fail = Arc::new(AtomicBool::new(true));
    let layer = CircuitBreakerLayer::from_core(
        BreakerSettings::builder()
            .name("search")
            .failure_threshold(1)
            .success_threshold(2)
            .open_timeout(Duration::from_millis(50))
            .build_core(),
    );
    let mut cb = layer.layer_service(switchable_service(Arc::clone(&fail)));

    let _ = cb.call(()).await;
    sleep(Duration::from_millis(60)).await;

    // Probe fails; back to open and rejecting.
    let err = cb.call(()).await.unwrap_err();
    assert!(!err.is_circuit_open());
    assert_eq!(cb.core().state().await, CircuitState::Open);

    let err = cb.call(()).await.unwrap_err();
    assert!(err.is_circuit_open());
}

/// Before the open timeout elapses no probe is allowed.
#[tokio::test]
async fn open_rejects_until_timeout_elapses() {
    let fail = Arc::new(AtomicBool::new(true));
    let layer = CircuitBreakerLayer::from_core(
        BreakerSettings::builder()
            .name("search")
            .failure_threshold(1)
            .open_timeout(Duration::from_secs(60))
            .build_core(),
    );
    let mut cb = layer.layer_service(switchable_service(fail));

    let _ = cb.call(()).await;
    for _ in 0..5 {
        let err = cb.call(()).await.unwrap_err();
        assert!(err.is_circuit_open());
    }
}
