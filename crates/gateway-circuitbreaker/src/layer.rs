use std::sync::Arc;

use tower::Layer;

use crate::classifier::DefaultClassifier;
use crate::{BreakerCore, CircuitBreaker};

/// A Tower [`Layer`] that guards an inner service with a shared breaker core.
///
/// The layer holds an `Arc<BreakerCore>` rather than constructing its own so
/// that the Tower service, the diagnostics endpoint, and the operator reset
/// all observe the same circuit.
#[derive(Clone)]
pub struct CircuitBreakerLayer<C = DefaultClassifier> {
    core: Arc<BreakerCore>,
    classifier: Arc<C>,
}

impl CircuitBreakerLayer<DefaultClassifier> {
    /// Creates a layer over an existing core with the default classifier
    /// (every `Err` is a failure).
    pub fn from_core(core: Arc<BreakerCore>) -> Self {
        Self {
            core,
            classifier: Arc::new(DefaultClassifier),
        }
    }
}

impl<C> CircuitBreakerLayer<C> {
    /// Replaces the failure classifier.
    pub fn with_classifier<C2>(self, classifier: C2) -> CircuitBreakerLayer<C2> {
        CircuitBreakerLayer {
            core: self.core,
            classifier: Arc::new(classifier),
        }
    }

    /// The shared breaker core.
    pub fn core(&self) -> &Arc<BreakerCore> {
        &self.core
    }

    /// Wraps a service directly, without going through `Layer::layer`.
    /// Useful when the classifier type would otherwise need annotating.
    pub fn layer_service<S>(&self, service: S) -> CircuitBreaker<S, C> {
        CircuitBreaker::new(service, Arc::clone(&self.core), Arc::clone(&self.classifier))
    }
}

impl<S, C> Layer<S> for CircuitBreakerLayer<C> {
    type Service = CircuitBreaker<S, C>;

    fn layer(&self, service: S) -> Self::Service {
        CircuitBreaker::new(service, Arc::clone(&self.core), Arc::clone(&self.classifier))
    }
}
