use gateway_circuitbreaker::CircuitBreakerError;
use gateway_core::RequestContext;
use http::StatusCode;
use serde_json::json;
use thiserror::Error;

use crate::request::ProxyResponse;

/// Failure of a single outbound attempt (or of the whole retried call, since
/// the last attempt's error is what escapes the retry layer).
#[derive(Debug, Clone, Error)]
pub enum ProxyError {
    /// TCP/TLS connect failure.
    #[error("connect error to {service}: {detail}")]
    Connect { service: String, detail: String },
    /// The attempt exceeded its read/write timeout.
    #[error("timeout calling {service}: {detail}")]
    Timeout { service: String, detail: String },
    /// No in-flight slot became available within the pool timeout.
    #[error("connection pool for {service} is saturated")]
    PoolTimeout { service: String },
    /// The downstream answered with a status from the retry set. The
    /// response is kept so that an exhausted call can still pass it through.
    #[error("{service} returned retryable status {status}")]
    RetryableStatus {
        service: String,
        status: u16,
        response: ProxyResponse,
    },
    /// The request could not be built or sent for a non-transport reason.
    #[error("proxy error for {service}: {detail}")]
    Internal { service: String, detail: String },
}

impl ProxyError {
    /// Every proxy error is worth another attempt except internal ones;
    /// terminal outcomes (downstream 4xx, open circuit) never surface as
    /// `ProxyError` in the first place.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ProxyError::Internal { .. })
    }
}

/// What escapes the full breaker + retry stack.
pub type DispatchError = CircuitBreakerError<ProxyError>;

/// Maps a dispatch failure onto the client-facing response described in the
/// error-handling policy: open circuit → 503 with a retry hint, exhausted
/// transport faults → 502/504, retryable downstream statuses pass through,
/// anything unexpected → 500 with the correlation id.
pub fn failure_to_response(error: DispatchError, context: &RequestContext) -> ProxyResponse {
    let correlation_id = context.correlation_id.as_str();

    match error {
        CircuitBreakerError::OpenCircuit {
            service,
            retry_after,
        } => ProxyResponse::json(
            StatusCode::SERVICE_UNAVAILABLE,
            &json!({
                "error": {
                    "type": "service_unavailable",
                    "message": format!("Service {service} is temporarily unavailable"),
                    "retry_after_seconds": retry_after.as_secs().max(1),
                    "correlation_id": correlation_id,
                }
            }),
        ),
        CircuitBreakerError::Inner(ProxyError::RetryableStatus { response, .. }) => response,
        CircuitBreakerError::Inner(ProxyError::Connect { service, .. }) => ProxyResponse::json(
            StatusCode::BAD_GATEWAY,
            &json!({
                "error": {
                    "type": "bad_gateway",
                    "message": format!("Could not reach service {service}"),
                    "correlation_id": correlation_id,
                }
            }),
        ),
        CircuitBreakerError::Inner(ProxyError::Timeout { service, .. }) => ProxyResponse::json(
            StatusCode::GATEWAY_TIMEOUT,
            &json!({
                "error": {
                    "type": "gateway_timeout",
                    "message": format!("Service {service} timed out"),
                    "correlation_id": correlation_id,
                }
            }),
        ),
        CircuitBreakerError::Inner(ProxyError::PoolTimeout { service }) => ProxyResponse::json(
            StatusCode::SERVICE_UNAVAILABLE,
            &json!({
                "error": {
                    "type": "service_unavailable",
                    "message": format!("Service {service} is saturated"),
                    "correlation_id": correlation_id,
                }
            }),
        ),
        CircuitBreakerError::Inner(ProxyError::Internal { .. }) => ProxyResponse::json(
            StatusCode::INTERNAL_SERVER_ERROR,
            &json!({
                "error": {
                    "type": "internal_error",
                    "message": "An unexpected error occurred",
                    "correlation_id": correlation_id,
                }
            }),
        ),
    }
}
