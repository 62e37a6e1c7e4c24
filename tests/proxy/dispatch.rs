use gateway_proxy::{ProxyRequest, ResilienceConfig};
use http::Method;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::{context, proxy_for, test_config};

/// A retryable status burns retries until the downstream recovers.
#[tokio::test]
async fn retryable_status_is_retried_to_success() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let (proxy, _breakers) = proxy_for(&server.uri(), test_config());
    let response = proxy
        .forward(ProxyRequest::new(Method::GET, "/health", context()))
        .await;

    assert_eq!(response.status, http::StatusCode::OK);
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

/// When every attempt returns a retryable status, the downstream's own
/// response passes through after exhaustion.
#[tokio::test]
async fn exhausted_retries_pass_downstream_status_through() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream maintenance"))
        .mount(&server)
        .await;

    let (proxy, _breakers) = proxy_for(&server.uri(), test_config());
    let response = proxy
        .forward(ProxyRequest::new(Method::GET, "/health", context()))
        .await;

    assert_eq!(response.status, http::StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(&response.body[..], b"upstream maintenance");
    // max_retries = 1 in the test config: two attempts.
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

/// Enough exhausted calls trip the breaker; further calls fail fast with the
/// structured 503 and never reach the downstream.
#[tokio::test]
async fn breaker_opens_and_fails_fast() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let config = ResilienceConfig {
        failure_threshold: 3,
        max_retries: 0,
        ..test_config()
    };
    let (proxy, breakers) = proxy_for(&server.uri(), config);

    for _ in 0..3 {
        let response = proxy
            .forward(ProxyRequest::new(Method::GET, "/x", context()))
            .await;
        assert_eq!(response.status, http::StatusCode::INTERNAL_SERVER_ERROR);
    }
    assert_eq!(server.received_requests().await.unwrap().len(), 3);

    let response = proxy
        .forward(ProxyRequest::new(Method::GET, "/x", context()))
        .await;
    assert_eq!(response.status, http::StatusCode::SERVICE_UNAVAILABLE);
    let body: serde_json::Value = serde_json::from_slice(&response.body).unwrap();
    assert_eq!(body["error"]["type"], "service_unavailable");
    assert_eq!(body["error"]["correlation_id"], "cid-test");
    assert!(body["error"]["retry_after_seconds"].as_u64().unwrap() >= 1);

    // Fail-fast really was fail-fast: no new downstream request.
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
    assert_eq!(
        breakers.get("fraud").unwrap().state_sync(),
        gateway_circuitbreaker::CircuitState::Open
    );
}

/// A dead endpoint maps to 502 after the budget is spent.
#[tokio::test]
async fn connect_failure_maps_to_bad_gateway() {
    // Port from a started-then-dropped server: nothing is listening.
    let url = {
        let server = MockServer::start().await;
        server.uri()
    };

    let (proxy, _breakers) = proxy_for(&url, test_config());
    let response = proxy
        .forward(ProxyRequest::new(Method::GET, "/x", context()))
        .await;

    assert_eq!(response.status, http::StatusCode::BAD_GATEWAY);
    let body: serde_json::Value = serde_json::from_slice(&response.body).unwrap();
    assert_eq!(body["error"]["type"], "bad_gateway");
}
