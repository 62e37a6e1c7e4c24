//! Circuit breaker for the gateway's downstream calls.
//!
//! One breaker guards one downstream service. Recent call outcomes are kept
//! in a bounded window; when the number of failures in that window reaches
//! the configured threshold the circuit opens and calls fail fast with
//! [`CircuitBreakerError::OpenCircuit`] instead of piling onto a sick
//! service.
//!
//! ## States
//! - **Closed**: normal operation, outcomes recorded.
//! - **Open**: calls rejected immediately. After `open_timeout` (measured
//!   from the last failure) the next call attempt flips the breaker to
//!   half-open; there is no background timer.
//! - **HalfOpen**: calls pass through as probes. `success_threshold`
//!   consecutive successes close the circuit; any failure reopens it.
//!
//! ## Example
//!
//! ```rust
//! use gateway_circuitbreaker::{BreakerSettings, CircuitBreakerLayer, CircuitState};
//! use std::time::Duration;
//! use tower::{service_fn, Layer};
//!
//! # async fn example() {
//! let layer = CircuitBreakerLayer::from_core(
//!     BreakerSettings::builder()
//!         .name("fraud")
//!         .failure_threshold(5)
//!         .open_timeout(Duration::from_secs(30))
//!         .build_core(),
//! );
//!
//! let svc = service_fn(|req: String| async move { Ok::<_, std::io::Error>(req) });
//! let mut guarded = layer.layer(svc);
//! # }
//! ```
//!
//! Multiple concurrent calls may pass one breaker; state mutations are
//! serialized behind a single async mutex which is never held across the
//! inner call's await point.

mod circuit;
mod classifier;
mod config;
mod error;
mod events;
mod layer;
mod registry;

pub use circuit::{CircuitSnapshot, CircuitState};
pub use classifier::{DefaultClassifier, FailureClassifier, FnClassifier};
pub use config::{BreakerSettings, BreakerSettingsBuilder};
pub use error::CircuitBreakerError;
pub use events::CircuitBreakerEvent;
pub use layer::CircuitBreakerLayer;
pub use registry::BreakerRegistry;

use std::sync::atomic::AtomicU8;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::sync::Mutex;
use tower::Service;

use circuit::Circuit;

/// The shared, non-generic heart of one breaker: settings plus the mutex-
/// protected state machine.
///
/// A core is shared between the Tower service that guards traffic and the
/// [`BreakerRegistry`] that serves diagnostics and operator resets.
pub struct BreakerCore {
    settings: BreakerSettings,
    circuit: Mutex<Circuit>,
    state_atomic: Arc<AtomicU8>,
}

impl BreakerCore {
    pub(crate) fn new(settings: BreakerSettings) -> Self {
        let state_atomic = Arc::new(AtomicU8::new(CircuitState::Closed as u8));
        Self {
            settings,
            circuit: Mutex::new(Circuit::new(Arc::clone(&state_atomic))),
            state_atomic,
        }
    }

    /// The downstream service this breaker guards.
    pub fn service_name(&self) -> &str {
        self.settings.name()
    }

    /// Current state of the circuit.
    pub async fn state(&self) -> CircuitState {
        self.circuit.lock().await.state()
    }

    /// Current state without an async context, from the atomic mirror.
    pub fn state_sync(&self) -> CircuitState {
        CircuitState::from_u8(self.state_atomic.load(std::sync::atomic::Ordering::Acquire))
    }

    /// Point-in-time diagnostics view.
    pub async fn snapshot(&self) -> CircuitSnapshot {
        self.circuit.lock().await.snapshot(&self.settings)
    }

    /// Operator override: close the circuit and clear all counts.
    pub async fn reset(&self) {
        self.circuit.lock().await.reset(&self.settings);
    }

    /// Operator override: open the circuit.
    pub async fn force_open(&self) {
        self.circuit.lock().await.force_open(&self.settings);
    }

    async fn try_acquire(&self) -> Result<(), Duration> {
        let mut circuit = self.circuit.lock().await;
        if circuit.try_acquire(&self.settings) {
            Ok(())
        } else {
            Err(circuit.retry_after(&self.settings))
        }
    }

    /// Records the outcome of one permitted call.
    ///
    /// This is also the entry point for callers that drive the breaker
    /// directly rather than through the Tower layer.
    pub async fn record(&self, failure: bool) {
        let mut circuit = self.circuit.lock().await;
        if failure {
            circuit.record_failure(&self.settings);
        } else {
            circuit.record_success(&self.settings);
        }
    }
}

/// A Tower service that applies circuit breaking to an inner service.
pub struct CircuitBreaker<S, C = DefaultClassifier> {
    inner: S,
    core: Arc<BreakerCore>,
    classifier: Arc<C>,
}

impl<S, C> CircuitBreaker<S, C> {
    pub(crate) fn new(inner: S, core: Arc<BreakerCore>, classifier: Arc<C>) -> Self {
        Self {
            inner,
            core,
            classifier,
        }
    }

    /// The shared core, for diagnostics and registry wiring.
    pub fn core(&self) -> &Arc<BreakerCore> {
        &self.core
    }
}

impl<S, C> Clone for CircuitBreaker<S, C>
where
    S: Clone,
{
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            core: Arc::clone(&self.core),
            classifier: Arc::clone(&self.classifier),
        }
    }
}

impl<S, C, Req> Service<Req> for CircuitBreaker<S, C>
where
    S: Service<Req> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Response: Send + 'static,
    S::Error: Send + 'static,
    C: FailureClassifier<S::Response, S::Error> + Send + Sync + 'static,
    Req: Send + 'static,
{
    type Response = S::Response;
    type Error = CircuitBreakerError<S::Error>;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(CircuitBreakerError::Inner)
    }

    fn call(&mut self, req: Req) -> Self::Future {
        let core = Arc::clone(&self.core);
        let classifier = Arc::clone(&self.classifier);
        let mut inner = self.inner.clone();

        Box::pin(async move {
            if let Err(retry_after) = core.try_acquire().await {
                return Err(CircuitBreakerError::OpenCircuit {
                    service: core.service_name().to_string(),
                    retry_after,
                });
            }

            // The mutex is not held across this await; concurrent calls may
            // complete in any order and record against whatever state the
            // breaker is in by then.
            let result = inner.call(req).await;

            core.record(classifier.is_failure(&result)).await;

            result.map_err(CircuitBreakerError::Inner)
        })
    }
}
