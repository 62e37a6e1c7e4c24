use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use futures::future::BoxFuture;
use tokio::sync::Semaphore;
use tower::Service;

use crate::config::ProxyTarget;
use crate::error::ProxyError;
use crate::headers::prepare_forward_headers;
use crate::request::{ProxyRequest, ProxyResponse};

/// One outbound HTTP attempt against a single target.
///
/// This is the innermost service in the stack: the retry layer replays it,
/// the breaker samples its overall outcome. It owns the per-target reqwest
/// client (connect/read timeouts baked in) and the optional in-flight
/// limiter.
#[derive(Clone)]
pub struct AttemptService {
    client: reqwest::Client,
    target: Arc<ProxyTarget>,
    limiter: Option<Arc<Semaphore>>,
}

impl AttemptService {
    pub(crate) fn new(
        client: reqwest::Client,
        target: Arc<ProxyTarget>,
        limiter: Option<Arc<Semaphore>>,
    ) -> Self {
        Self {
            client,
            target,
            limiter,
        }
    }

    fn url_for(&self, path_and_query: &str) -> String {
        let base = self.target.base_url.trim_end_matches('/');
        if path_and_query.starts_with('/') {
            format!("{base}{path_and_query}")
        } else {
            format!("{base}/{path_and_query}")
        }
    }
}

fn classify_send_error(service: &str, err: reqwest::Error) -> ProxyError {
    if err.is_timeout() {
        ProxyError::Timeout {
            service: service.to_string(),
            detail: err.to_string(),
        }
    } else if err.is_builder() || err.is_request() && err.is_body() {
        ProxyError::Internal {
            service: service.to_string(),
            detail: err.to_string(),
        }
    } else {
        // Connect failures and torn connections both read as "could not get
        // an answer"; retry treats them identically.
        ProxyError::Connect {
            service: service.to_string(),
            detail: err.to_string(),
        }
    }
}

impl Service<ProxyRequest> for AttemptService {
    type Response = ProxyResponse;
    type Error = ProxyError;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: ProxyRequest) -> Self::Future {
        let client = self.client.clone();
        let target = Arc::clone(&self.target);
        let limiter = self.limiter.clone();
        let url = self.url_for(&req.path_and_query);

        Box::pin(async move {
            let service = target.service_name.as_str();

            let _permit = match &limiter {
                Some(semaphore) => {
                    match tokio::time::timeout(
                        target.config.pool_timeout,
                        Arc::clone(semaphore).acquire_owned(),
                    )
                    .await
                    {
                        Ok(Ok(permit)) => Some(permit),
                        _ => {
                            return Err(ProxyError::PoolTimeout {
                                service: service.to_string(),
                            })
                        }
                    }
                }
                None => None,
            };

            let headers = prepare_forward_headers(
                &req.headers,
                &req.context,
                target.service_auth_secret.as_deref(),
            );

            let started = Instant::now();
            let result = client
                .request(req.method.clone(), &url)
                .headers(headers)
                .body(req.body.clone())
                .send()
                .await;

            let response = match result {
                Ok(response) => response,
                Err(err) => return Err(classify_send_error(service, err)),
            };

            let status = response.status();
            let resp_headers = response.headers().clone();
            let body = response.bytes().await.map_err(|err| ProxyError::Timeout {
                service: service.to_string(),
                detail: format!("reading body: {err}"),
            })?;

            metrics::histogram!(
                "gateway_proxy_request_duration_seconds",
                "service" => service.to_string(),
                "method" => req.method.as_str().to_string(),
            )
            .record(started.elapsed().as_secs_f64());

            let proxied = ProxyResponse {
                status,
                headers: resp_headers,
                body,
            };

            // A status from the retry set is a downstream fault: surface it
            // as an error so retry and breaker both see it. Everything else
            // (2xx, 3xx, and plain client 4xx) is a successful proxy call.
            if target.config.is_retryable_status(status.as_u16()) {
                return Err(ProxyError::RetryableStatus {
                    service: service.to_string(),
                    status: status.as_u16(),
                    response: proxied,
                });
            }

            Ok(proxied)
        })
    }
}
