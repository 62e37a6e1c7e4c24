use std::time::Duration;

use gateway_circuitbreaker::{BreakerRegistry, BreakerSettings, CircuitState};

fn settings(name: &str) -> BreakerSettings {
    BreakerSettings::builder()
        .name(name)
        .failure_threshold(2)
        .window_size(10)
        .open_timeout(Duration::from_secs(60))
        .build()
}

/// Failures on one downstream never move another downstream's breaker.
#[tokio::test]
async fn breakers_are_independent_per_service() {
    let registry = BreakerRegistry::new();
    let fraud = registry.core("fraud", || settings("fraud"));
    let search = registry.core("search", || settings("search"));

    fraud.record(true).await;
    fraud.record(true).await;

    assert_eq!(fraud.state().await, CircuitState::Open);
    assert_eq!(search.state().await, CircuitState::Closed);

    // And the other direction: search successes don't close fraud.
    for _ in 0..10 {
        search.record(false).await;
    }
    assert_eq!(fraud.state().await, CircuitState::Open);
}

/// Concurrent callers hammering one breaker serialize their recordings
/// without losing any.
#[tokio::test]
async fn concurrent_recordings_are_all_counted() {
    let registry = BreakerRegistry::new();
    let core = registry.core("vision", || {
        BreakerSettings::builder()
            .name("vision")
            .failure_threshold(1000)
            .window_size(1000)
            .build()
    });

    let mut handles = Vec::new();
    for _ in 0..8 {
        let core = std::sync::Arc::clone(&core);
        handles.push(tokio::spawn(async move {
            for _ in 0..50 {
                core.record(true).await;
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let snapshot = core.snapshot().await;
    assert_eq!(snapshot.recent_failures, 400);
}
