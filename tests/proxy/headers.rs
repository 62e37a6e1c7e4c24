use gateway_proxy::ProxyRequest;
use http::{HeaderMap, HeaderValue, Method};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::{context, proxy_for, test_config};

/// Every outbound attempt carries the ingress correlation id and the
/// service-auth secret; the end-user Authorization header never leaves the
/// gateway.
#[tokio::test]
async fn outbound_headers_follow_the_policy() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/analyze"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
        .mount(&server)
        .await;

    let (proxy, _breakers) = proxy_for(&server.uri(), test_config());

    let mut headers = HeaderMap::new();
    headers.insert("authorization", HeaderValue::from_static("Bearer user-token"));
    headers.insert("accept", HeaderValue::from_static("application/json"));

    let response = proxy
        .forward(
            ProxyRequest::new(Method::POST, "/analyze", context())
                .with_headers(headers)
                .with_body(br#"{"amount": 1}"#.to_vec().into()),
        )
        .await;

    assert_eq!(response.status, http::StatusCode::OK);

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let outbound = &requests[0];
    assert_eq!(
        outbound.headers.get("x-correlation-id").unwrap(),
        "cid-test"
    );
    assert_eq!(outbound.headers.get("x-service-auth").unwrap(), "svc-secret");
    assert!(outbound.headers.get("authorization").is_none());
    assert_eq!(outbound.headers.get("accept").unwrap(), "application/json");
}

/// Responses are stamped with the correlation id and the gateway marker.
#[tokio::test]
async fn responses_carry_gateway_markers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let (proxy, _breakers) = proxy_for(&server.uri(), test_config());
    let response = proxy
        .forward(ProxyRequest::new(Method::GET, "/status", context()))
        .await;

    assert_eq!(
        response.headers.get("x-correlation-id").unwrap(),
        "cid-test"
    );
    assert_eq!(response.headers.get("x-proxied-by").unwrap(), "gateway");
}

/// A downstream 4xx is a successful proxy call: passed through untouched,
/// never retried.
#[tokio::test]
async fn client_errors_pass_through_without_retry() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(422).set_body_json(serde_json::json!({"detail": "bad input"})),
        )
        .mount(&server)
        .await;

    let (proxy, breakers) = proxy_for(&server.uri(), test_config());
    let response = proxy
        .forward(ProxyRequest::new(Method::POST, "/analyze", context()))
        .await;

    assert_eq!(response.status, http::StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(server.received_requests().await.unwrap().len(), 1);

    // And it is not a failure sample on the breaker.
    let snapshot = breakers.get("fraud").unwrap().snapshot().await;
    assert_eq!(snapshot.recent_failures, 0);
}
