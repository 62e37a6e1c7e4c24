//! Resilient HTTP proxy for the gateway dispatch core.
//!
//! The proxy composes the circuit breaker around the retry executor around a
//! single-attempt HTTP service:
//!
//! ```text
//! breaker( retry( single_http_attempt ) )
//! ```
//!
//! The breaker wraps the retry (not the other way round), so an
//! all-retries-exhausted outcome counts as *one* failure sample. Breaker
//! state tracks logical downstream health, not attempt count.
//!
//! Per attempt the proxy buffers the inbound body, applies the header policy
//! (strip `Authorization` and hop-by-hop headers, inject `X-Correlation-ID`
//! and `X-Service-Auth`), issues the request with the target's timeouts, and
//! classifies the response: statuses in the retry set are failures,
//! everything else is a success regardless of status.

mod attempt;
mod config;
mod error;
pub mod headers;
mod registry;
mod request;
mod router;

pub use attempt::AttemptService;
pub use config::{ProxyTarget, ResilienceConfig};
pub use error::{failure_to_response, DispatchError, ProxyError};
pub use registry::ProxyRegistry;
pub use request::{ProxyRequest, ProxyResponse};
pub use router::{Route, RouteMatch, RouteTable};

use std::sync::Arc;

use gateway_circuitbreaker::{
    BreakerCore, CircuitBreaker, CircuitBreakerLayer, DefaultClassifier,
};
use gateway_retry::{ExponentialBackoff, Retry, RetryLayer};
use tower::{Layer, ServiceExt};

use crate::headers::decorate_response_headers;

type ProxyStack = CircuitBreaker<Retry<AttemptService, ProxyRequest, ProxyError>, DefaultClassifier>;

/// One downstream's full dispatch stack: breaker, retry, attempt.
pub struct ResilientProxy {
    target: Arc<ProxyTarget>,
    service: ProxyStack,
}

impl ResilientProxy {
    /// Builds the stack for one target, sharing `core` with the breaker
    /// registry so diagnostics and resets observe live state.
    pub fn new(target: ProxyTarget, core: Arc<BreakerCore>) -> Result<Self, ProxyError> {
        if target.service_auth_secret.is_none() {
            tracing::warn!(
                service = %target.service_name,
                "service auth secret not configured; downstream will reject forwarded requests"
            );
        }

        let target = Arc::new(target);
        let config = &target.config;

        // Connect and read timeouts live on the client; the write budget is
        // folded into the per-request total in the attempt service.
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.connect_timeout + config.read_timeout + config.write_timeout)
            .build()
            .map_err(|err| ProxyError::Internal {
                service: target.service_name.clone(),
                detail: format!("building http client: {err}"),
            })?;

        let limiter = config
            .max_in_flight
            .map(|n| Arc::new(tokio::sync::Semaphore::new(n)));

        let attempt = AttemptService::new(client, Arc::clone(&target), limiter);

        let service_label = target.service_name.clone();
        let retry_layer = RetryLayer::<ProxyRequest, ProxyError>::builder()
            .max_attempts(config.max_retries + 1)
            .backoff(
                ExponentialBackoff::new(config.base_delay)
                    .exp_base(config.exp_base)
                    .max_delay(config.max_delay)
                    .jitter(config.jitter_enabled),
            )
            .retry_on(ProxyError::is_retryable)
            .deadline_fn(|req: &ProxyRequest| req.context.deadline)
            .name(target.service_name.clone())
            .on_retry(move |_attempt, _delay| {
                metrics::counter!(
                    "gateway_proxy_retries_total",
                    "service" => service_label.clone()
                )
                .increment(1);
            })
            .build();

        let service = CircuitBreakerLayer::from_core(core).layer(retry_layer.layer(attempt));

        Ok(Self { target, service })
    }

    /// The target this proxy dispatches to.
    pub fn target(&self) -> &ProxyTarget {
        &self.target
    }

    /// Runs one request through breaker + retry and returns the raw outcome.
    ///
    /// Typed internal clients (fraud scoring, payment capture) use this so
    /// they can distinguish an open circuit from an exhausted downstream.
    pub async fn dispatch(&self, req: ProxyRequest) -> Result<ProxyResponse, DispatchError> {
        let method = req.method.as_str().to_string();
        let result = self.service.clone().oneshot(req).await;

        let status_label = match &result {
            Ok(_) => "success",
            Err(e) if e.is_circuit_open() => "circuit_open",
            Err(_) => "error",
        };
        metrics::counter!(
            "gateway_proxy_requests_total",
            "service" => self.target.service_name.clone(),
            "method" => method,
            "status" => status_label,
        )
        .increment(1);

        result
    }

    /// Proxies a request and maps every outcome onto the client-facing
    /// response: downstream statuses pass through, failures become the
    /// 500/502/503/504 bodies of the error policy, and all responses carry
    /// `X-Correlation-ID` and `X-Proxied-By`.
    pub async fn forward(&self, req: ProxyRequest) -> ProxyResponse {
        let context = req.context.clone();

        let mut response = match self.dispatch(req).await {
            Ok(response) => response,
            Err(error) => {
                if error.is_circuit_open() {
                    tracing::warn!(
                        service = %self.target.service_name,
                        correlation_id = %context.correlation_id,
                        "circuit open, failing fast"
                    );
                } else {
                    tracing::warn!(
                        service = %self.target.service_name,
                        correlation_id = %context.correlation_id,
                        error = %error,
                        "proxy dispatch failed"
                    );
                }
                failure_to_response(error, &context)
            }
        };

        response.headers = decorate_response_headers(&response.headers, &context);
        response
    }
}
