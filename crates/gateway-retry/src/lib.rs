//! Retry executor for the gateway's outbound calls.
//!
//! Runs a service up to `max_attempts` times with exponential backoff and
//! full jitter between attempts. A classifier separates retryable failures
//! (connect errors, timeouts, retryable statuses) from terminal ones (client
//! errors, open circuits), and a per-request deadline trims the budget so no
//! attempt is scheduled past the ingress cutoff.
//!
//! # Example
//!
//! ```
//! use gateway_retry::RetryLayer;
//! use std::time::Duration;
//! use tower::{Layer, ServiceBuilder};
//!
//! # #[derive(Debug, Clone)]
//! # struct TransportError { retryable: bool }
//! # async fn example() {
//! let retry_layer = RetryLayer::<String, TransportError>::builder()
//!     .max_attempts(4) // 1 initial + 3 retries
//!     .exponential_backoff(Duration::from_millis(100))
//!     .retry_on(|err: &TransportError| err.retryable)
//!     .name("fraud")
//!     .build();
//!
//! let service = ServiceBuilder::new()
//!     .layer(retry_layer)
//!     .service(tower::service_fn(|req: String| async move {
//!         Ok::<_, TransportError>(req)
//!     }));
//! # }
//! ```

mod backoff;
mod config;
mod events;
mod layer;
mod policy;

pub use backoff::{ExponentialBackoff, FixedInterval, FnInterval, IntervalFunction};
pub use config::{DeadlineFn, RetryConfig, RetryConfigBuilder};
pub use events::RetryEvent;
pub use layer::RetryLayer;
pub use policy::{RetryPolicy, RetryPredicate};

use std::marker::PhantomData;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use futures::future::BoxFuture;
use tower::Service;

/// A Tower [`Service`] that retries failed requests.
pub struct Retry<S, Req, E> {
    inner: S,
    config: Arc<RetryConfig<Req, E>>,
    _phantom: PhantomData<Req>,
}

impl<S, Req, E> Retry<S, Req, E> {
    /// Creates a new `Retry` wrapping the given service.
    pub fn new(inner: S, config: Arc<RetryConfig<Req, E>>, _phantom: PhantomData<Req>) -> Self {
        Self {
            inner,
            config,
            _phantom,
        }
    }
}

impl<S, Req, E> Clone for Retry<S, Req, E>
where
    S: Clone,
{
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            config: Arc::clone(&self.config),
            _phantom: PhantomData,
        }
    }
}

impl<S, Req, E> Service<Req> for Retry<S, Req, E>
where
    S: Service<Req, Error = E> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Response: Send + 'static,
    Req: Clone + Send + 'static,
    E: Send + 'static,
{
    type Response = S::Response;
    type Error = E;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Req) -> Self::Future {
        let mut service = self.inner.clone();
        let config = Arc::clone(&self.config);

        let deadline = config.deadline_fn.as_ref().and_then(|f| f(&req));

        Box::pin(async move {
            let mut attempt = 0;

            loop {
                let result = service.call(req.clone()).await;

                match result {
                    Ok(response) => {
                        #[cfg(feature = "metrics")]
                        metrics::counter!(
                            "gateway_retry_calls_total",
                            "retry" => config.name.clone(),
                            "result" => "success"
                        )
                        .increment(1);

                        #[cfg(feature = "tracing")]
                        if attempt > 0 {
                            tracing::info!(
                                retry = %config.name,
                                attempts = attempt + 1,
                                "request succeeded after retries"
                            );
                        }

                        config.event_listeners.emit(&RetryEvent::Success {
                            pattern_name: config.name.clone(),
                            timestamp: Instant::now(),
                            attempts: attempt + 1,
                        });
                        return Ok(response);
                    }
                    Err(error) => {
                        if !config.policy.should_retry(&error) {
                            config.event_listeners.emit(&RetryEvent::IgnoredError {
                                pattern_name: config.name.clone(),
                                timestamp: Instant::now(),
                            });
                            return Err(error);
                        }

                        if attempt + 1 >= config.max_attempts {
                            #[cfg(feature = "metrics")]
                            metrics::counter!(
                                "gateway_retry_calls_total",
                                "retry" => config.name.clone(),
                                "result" => "exhausted"
                            )
                            .increment(1);

                            #[cfg(feature = "tracing")]
                            tracing::warn!(
                                retry = %config.name,
                                attempts = attempt + 1,
                                "retry attempts exhausted"
                            );

                            config.event_listeners.emit(&RetryEvent::Exhausted {
                                pattern_name: config.name.clone(),
                                timestamp: Instant::now(),
                                attempts: attempt + 1,
                            });
                            return Err(error);
                        }

                        let delay = config.policy.next_backoff(attempt);

                        // Never sleep into an attempt that would start past
                        // the request deadline; hand back the last error
                        // instead of burning budget the client will not wait
                        // for.
                        if let Some(deadline) = deadline {
                            if Instant::now() + delay >= deadline {
                                config.event_listeners.emit(&RetryEvent::DeadlineTrimmed {
                                    pattern_name: config.name.clone(),
                                    timestamp: Instant::now(),
                                    attempts: attempt + 1,
                                });
                                return Err(error);
                            }
                        }

                        config.event_listeners.emit(&RetryEvent::Retry {
                            pattern_name: config.name.clone(),
                            timestamp: Instant::now(),
                            attempt,
                            delay,
                        });

                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    }
                }
            }
        })
    }
}
