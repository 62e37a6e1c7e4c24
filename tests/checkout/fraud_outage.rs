use std::sync::Arc;
use std::time::Duration;

use gateway_checkout::fraud::ProxyFraudScorer;
use gateway_checkout::payment::MockPaymentGateway;
use gateway_checkout::store::MemoryStore;
use gateway_checkout::{checkout_saga, outcome_from_report, CheckoutEnv};
use gateway_circuitbreaker::{BreakerRegistry, BreakerSettings, CircuitState};
use gateway_proxy::{ProxyTarget, ResilienceConfig, ResilientProxy};
use http::StatusCode;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::{cart_with, checkout_input, request_context, seed_catalog};

fn outage_config() -> ResilienceConfig {
    ResilienceConfig {
        failure_threshold: 6,
        max_retries: 1,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
        // Longer than the saga's own 1s step-retry backoff, so an open
        // circuit stays open across both scoring calls of one saga.
        open_timeout: Duration::from_secs(2),
        connect_timeout: Duration::from_secs(2),
        read_timeout: Duration::from_secs(2),
        write_timeout: Duration::from_secs(2),
        ..ResilienceConfig::default()
    }
}

/// A fraud downstream answering 503 to everything, reached through the real
/// breaker + retry stack with fraud fail-open disabled:
///
/// - while the circuit is closed, each saga exhausts its fraud retries,
///   compensates, and maps to 502;
/// - once enough failure samples accumulate the circuit opens and the next
///   saga gets 503 without the fraud service being contacted (inventory
///   still compensated, since reservation ran before scoring);
/// - after the open timeout one probe reaches the downstream in half-open
///   and the circuit re-opens.
#[tokio::test]
async fn fraud_outage_trips_breaker_and_fails_fast() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/analyze"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let breakers = Arc::new(BreakerRegistry::new());
    let config = outage_config();
    let core = breakers.core("fraud", || {
        BreakerSettings::builder()
            .name("fraud")
            .failure_threshold(config.failure_threshold)
            .success_threshold(config.success_threshold)
            .window_size(config.window_size)
            .open_timeout(config.open_timeout)
            .build()
    });
    let proxy = Arc::new(
        ResilientProxy::new(
            ProxyTarget::new("fraud", server.uri()).with_config(config),
            core,
        )
        .unwrap(),
    );

    let store = Arc::new(MemoryStore::new());
    let product = seed_catalog(&store, 50);
    let cart = cart_with(&store, "u1", product, 1);
    let payments = Arc::new(MockPaymentGateway::new());

    let run = |fraud_proxy: Arc<ResilientProxy>| {
        let store = Arc::clone(&store);
        let payments = Arc::clone(&payments);
        async move {
            let env = CheckoutEnv {
                store,
                fraud: Arc::new(ProxyFraudScorer::new(fraud_proxy, "/analyze")),
                payments,
                context: request_context(),
                fraud_fail_open: false,
            };
            checkout_saga().execute(Arc::new(env), checkout_input("u1", cart)).await
        }
    };

    // Closed circuit: sagas fail with retries exhausted -> 502, inventory
    // compensated every time. Each saga makes two scoring calls (step
    // retry), each of which makes two HTTP attempts (proxy retry) and lands
    // one failure sample; after three sagas the six samples open the
    // circuit.
    for _ in 0..3 {
        let report = run(Arc::clone(&proxy)).await;
        let error = outcome_from_report(&report).unwrap_err();
        assert_eq!(error.status, StatusCode::BAD_GATEWAY);
        assert_eq!(error.failed_step.as_deref(), Some("check_fraud"));
        assert_eq!(store.product_stock(product), Some(50));
        assert_eq!(store.cart_item_count(cart), Some(1));
    }
    assert_eq!(server.received_requests().await.unwrap().len(), 12);
    assert_eq!(proxy.target().service_name, "fraud");
    assert_eq!(
        breakers.get("fraud").unwrap().state_sync(),
        CircuitState::Open
    );

    // Open circuit: fail-fast 503, no new downstream contact, no payment.
    let report = run(Arc::clone(&proxy)).await;
    let error = outcome_from_report(&report).unwrap_err();
    assert_eq!(error.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(server.received_requests().await.unwrap().len(), 12);
    assert_eq!(payments.captured_charge_count(), 0);
    assert_eq!(store.product_stock(product), Some(50));

    // After the open timeout a single probe dispatch reaches the downstream
    // and the circuit re-opens on its failure.
    tokio::time::sleep(Duration::from_millis(2100)).await;
    let report = run(Arc::clone(&proxy)).await;
    assert!(outcome_from_report(&report).is_err());
    let requests = server.received_requests().await.unwrap().len();
    assert_eq!(requests, 14, "one probe dispatch (two attempts) expected");
    assert_eq!(
        breakers.get("fraud").unwrap().state_sync(),
        CircuitState::Open
    );
}
