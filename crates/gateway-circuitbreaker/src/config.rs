use std::time::Duration;

use gateway_core::{EventListeners, FnListener};

use crate::circuit::CircuitState;
use crate::events::CircuitBreakerEvent;
use crate::BreakerCore;

/// Immutable per-service breaker settings, fixed at startup.
///
/// Changing thresholds requires a restart; there is deliberately no hot
/// reconfiguration path.
pub struct BreakerSettings {
    pub(crate) name: String,
    pub(crate) failure_threshold: usize,
    pub(crate) success_threshold: usize,
    pub(crate) window_size: usize,
    pub(crate) open_timeout: Duration,
    pub(crate) event_listeners: EventListeners<CircuitBreakerEvent>,
}

impl BreakerSettings {
    /// Creates a new settings builder.
    pub fn builder() -> BreakerSettingsBuilder {
        BreakerSettingsBuilder::new()
    }

    /// The service name this breaker guards.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Builder for [`BreakerSettings`].
pub struct BreakerSettingsBuilder {
    name: String,
    failure_threshold: usize,
    success_threshold: usize,
    window_size: usize,
    open_timeout: Duration,
    event_listeners: EventListeners<CircuitBreakerEvent>,
}

impl BreakerSettingsBuilder {
    /// Creates a builder with the production defaults.
    pub fn new() -> Self {
        Self {
            name: String::from("<unnamed>"),
            failure_threshold: 5,
            success_threshold: 2,
            window_size: 100,
            open_timeout: Duration::from_secs(60),
            event_listeners: EventListeners::new(),
        }
    }

    /// Number of failures within the outcome window that opens the circuit.
    ///
    /// Default: 5
    pub fn failure_threshold(mut self, n: usize) -> Self {
        self.failure_threshold = n;
        self
    }

    /// Number of consecutive half-open successes that close the circuit.
    ///
    /// Default: 2
    pub fn success_threshold(mut self, n: usize) -> Self {
        self.success_threshold = n;
        self
    }

    /// Number of recent outcomes tracked for the failure count.
    ///
    /// Default: 100
    pub fn window_size(mut self, n: usize) -> Self {
        self.window_size = n;
        self
    }

    /// How long the circuit stays open before the next call is allowed to
    /// probe the downstream.
    ///
    /// Default: 60 seconds
    pub fn open_timeout(mut self, d: Duration) -> Self {
        self.open_timeout = d;
        self
    }

    /// Names the breaker after the downstream service it guards.
    pub fn name<N: Into<String>>(mut self, n: N) -> Self {
        self.name = n.into();
        self
    }

    /// Register a callback for state transition events.
    pub fn on_state_transition<F>(mut self, f: F) -> Self
    where
        F: Fn(CircuitState, CircuitState) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &CircuitBreakerEvent| {
                if let CircuitBreakerEvent::StateTransition {
                    from_state,
                    to_state,
                    ..
                } = event
                {
                    f(*from_state, *to_state);
                }
            }));
        self
    }

    /// Register a callback for rejected (fail-fast) calls.
    pub fn on_call_rejected<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &CircuitBreakerEvent| {
                if matches!(event, CircuitBreakerEvent::CallRejected { .. }) {
                    f();
                }
            }));
        self
    }

    /// Register a callback for recorded failures.
    pub fn on_failure<F>(mut self, f: F) -> Self
    where
        F: Fn(CircuitState) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &CircuitBreakerEvent| {
                if let CircuitBreakerEvent::FailureRecorded { state, .. } = event {
                    f(*state);
                }
            }));
        self
    }

    /// Finalizes the settings.
    pub fn build(self) -> BreakerSettings {
        assert!(
            self.window_size >= self.failure_threshold,
            "window_size must hold at least failure_threshold outcomes"
        );
        BreakerSettings {
            name: self.name,
            failure_threshold: self.failure_threshold,
            success_threshold: self.success_threshold.max(1),
            window_size: self.window_size,
            open_timeout: self.open_timeout,
            event_listeners: self.event_listeners,
        }
    }

    /// Builds the settings and wraps them in a ready-to-share core.
    pub fn build_core(self) -> std::sync::Arc<BreakerCore> {
        std::sync::Arc::new(BreakerCore::new(self.build()))
    }
}

impl Default for BreakerSettingsBuilder {
    fn default() -> Self {
        Self::new()
    }
}
