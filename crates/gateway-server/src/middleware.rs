//! Ingress middleware: correlation + request telemetry, then rate limiting.
//!
//! Order matters. Correlation runs outermost so every later log line and
//! response carries the id; rate limiting runs before any handler so a
//! throttled client never reaches a downstream.

use std::net::SocketAddr;
use std::time::Instant;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{header, HeaderName, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use gateway_core::{CorrelationId, Identity, RequestContext, CORRELATION_HEADER};
use serde_json::json;
use tracing::Instrument;

use crate::state::AppState;

const RATE_LIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
const RATE_LIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
const RATE_LIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");
const PROCESS_TIME: HeaderName = HeaderName::from_static("x-process-time");

/// Paths that skip rate limiting (and, elsewhere, authentication).
pub fn is_exempt(path: &str) -> bool {
    matches!(path, "/health" | "/readiness" | "/metrics")
}

/// Outermost middleware: correlation id, request span, request log line,
/// ingress metrics, and the response stamps.
pub async fn observability(mut request: Request, next: Next) -> Response {
    let started = Instant::now();

    let correlation_id = CorrelationId::from_header(
        request
            .headers()
            .get(CORRELATION_HEADER)
            .and_then(|value| value.to_str().ok()),
    );
    request.extensions_mut().insert(correlation_id.clone());

    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let span = tracing::info_span!(
        "request",
        correlation_id = %correlation_id,
        method = %method,
        path = %path,
    );

    let mut response = next.run(request).instrument(span.clone()).await;

    let elapsed = started.elapsed();
    let status = response.status();

    span.in_scope(|| {
        tracing::info!(
            status = status.as_u16(),
            duration_ms = elapsed.as_millis() as u64,
            "request completed"
        );
    });

    metrics::counter!(
        "http_requests_total",
        "method" => method.to_string(),
        "path" => path.clone(),
        "status" => status.as_u16().to_string(),
    )
    .increment(1);
    metrics::histogram!(
        "http_request_duration_seconds",
        "method" => method.to_string(),
        "path" => path,
    )
    .record(elapsed.as_secs_f64());

    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(correlation_id.as_str()) {
        headers.insert(HeaderName::from_static(CORRELATION_HEADER), value);
    }
    if let Ok(value) = HeaderValue::from_str(&format!("{:.6}", elapsed.as_secs_f64())) {
        headers.insert(PROCESS_TIME, value);
    }

    response
}

/// Fixed-window admission control keyed by user id when a valid token is
/// present, else by client address.
pub async fn rate_limit(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    if is_exempt(request.uri().path()) {
        return next.run(request).await;
    }

    let identity = identify(&state, &request);
    request.extensions_mut().insert(identity.clone());

    let decision = state.rate_limiter.check(identity.rate_key());

    if decision.limited {
        let mut response = (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({
                "error": {
                    "type": "rate_limited",
                    "message": "Rate limit exceeded. Try again later.",
                    "retry_after": decision.retry_after_secs,
                }
            })),
        )
            .into_response();
        let headers = response.headers_mut();
        if let Ok(value) = HeaderValue::from_str(&decision.retry_after_secs.to_string()) {
            headers.insert(header::RETRY_AFTER, value);
        }
        apply_rate_headers(headers, &decision);
        return response;
    }

    let mut response = next.run(request).await;
    apply_rate_headers(response.headers_mut(), &decision);
    response
}

fn apply_rate_headers(
    headers: &mut axum::http::HeaderMap,
    decision: &gateway_auth::RateLimitDecision,
) {
    for (name, value) in [
        (RATE_LIMIT_LIMIT, decision.limit),
        (RATE_LIMIT_REMAINING, decision.remaining),
        (RATE_LIMIT_RESET, decision.reset_epoch_secs),
    ] {
        if let Ok(value) = HeaderValue::from_str(&value.to_string()) {
            headers.insert(name, value);
        }
    }
}

fn identify(state: &AppState, request: &Request) -> Identity {
    let authorization = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());

    if let Ok(claims) = state.authenticator.authenticate(authorization) {
        return Identity::User(claims.sub);
    }

    let ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string());
    Identity::ClientIp(ip)
}

/// Builds the per-request context handed to the proxy and the saga.
pub fn request_context(
    state: &AppState,
    correlation_id: CorrelationId,
    identity: Identity,
    method: http::Method,
    path: &str,
) -> RequestContext {
    RequestContext::new(
        correlation_id,
        identity,
        method,
        path,
        Some(state.config.ingress_timeout),
    )
}
