use std::collections::VecDeque;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::BreakerSettings;
use crate::events::CircuitBreakerEvent;

/// Represents the state of the circuit breaker.
///
/// The discriminant values are the wire encoding of the
/// `gateway_circuit_breaker_state` gauge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[repr(u8)]
pub enum CircuitState {
    /// Calls pass through; failures accumulate in the window.
    Closed = 0,
    /// Recovery probing: limited trust, any failure reopens.
    HalfOpen = 1,
    /// Calls are rejected immediately.
    Open = 2,
}

impl CircuitState {
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            1 => CircuitState::HalfOpen,
            2 => CircuitState::Open,
            _ => CircuitState::Closed,
        }
    }
}

/// Point-in-time view of one breaker, for the diagnostics endpoint.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct CircuitSnapshot {
    pub service: String,
    pub state: CircuitState,
    pub failure_count: usize,
    pub success_count: usize,
    /// Failures among the last `window_size` recorded outcomes.
    pub recent_failures: usize,
    pub total_calls: usize,
    /// Seconds since the most recent failure, if any.
    pub last_failure_age_secs: Option<u64>,
}

/// The state machine proper. All access goes through the owning mutex in
/// [`crate::BreakerCore`]; nothing here locks.
pub(crate) struct Circuit {
    state: CircuitState,
    state_atomic: Arc<AtomicU8>,
    failure_count: usize,
    success_count: usize,
    last_failure_at: Option<Instant>,
    recent_outcomes: VecDeque<bool>,
}

impl Circuit {
    pub(crate) fn new(state_atomic: Arc<AtomicU8>) -> Self {
        Self {
            state: CircuitState::Closed,
            state_atomic,
            failure_count: 0,
            success_count: 0,
            last_failure_at: None,
            recent_outcomes: VecDeque::new(),
        }
    }

    pub(crate) fn state(&self) -> CircuitState {
        self.state
    }

    fn recent_failures(&self) -> usize {
        self.recent_outcomes.iter().filter(|ok| !**ok).count()
    }

    fn push_outcome(&mut self, ok: bool, settings: &BreakerSettings) {
        if self.recent_outcomes.len() == settings.window_size {
            self.recent_outcomes.pop_front();
        }
        self.recent_outcomes.push_back(ok);
    }

    pub(crate) fn snapshot(&self, settings: &BreakerSettings) -> CircuitSnapshot {
        CircuitSnapshot {
            service: settings.name.clone(),
            state: self.state,
            failure_count: self.failure_count,
            success_count: self.success_count,
            recent_failures: self.recent_failures(),
            total_calls: self.recent_outcomes.len(),
            last_failure_age_secs: self.last_failure_at.map(|t| t.elapsed().as_secs()),
        }
    }

    /// Decides whether a call may proceed, performing the lazy Open →
    /// HalfOpen transition when the open timeout has elapsed. There is no
    /// background timer; recovery is driven entirely by call attempts.
    pub(crate) fn try_acquire(&mut self, settings: &BreakerSettings) -> bool {
        if self.state == CircuitState::Open {
            let waited_out = self
                .last_failure_at
                .map(|t| t.elapsed() >= settings.open_timeout)
                .unwrap_or(true);
            if waited_out {
                self.transition_to(CircuitState::HalfOpen, settings);
            }
        }

        let permitted = self.state != CircuitState::Open;
        if permitted {
            settings
                .event_listeners
                .emit(&CircuitBreakerEvent::CallPermitted {
                    pattern_name: settings.name.clone(),
                    timestamp: Instant::now(),
                    state: self.state,
                });
        } else {
            settings
                .event_listeners
                .emit(&CircuitBreakerEvent::CallRejected {
                    pattern_name: settings.name.clone(),
                    timestamp: Instant::now(),
                });

            #[cfg(feature = "metrics")]
            metrics::counter!(
                "gateway_circuit_breaker_rejections_total",
                "service" => settings.name.clone()
            )
            .increment(1);
        }
        permitted
    }

    pub(crate) fn record_success(&mut self, settings: &BreakerSettings) {
        self.push_outcome(true, settings);

        settings
            .event_listeners
            .emit(&CircuitBreakerEvent::SuccessRecorded {
                pattern_name: settings.name.clone(),
                timestamp: Instant::now(),
                state: self.state,
            });

        if self.state == CircuitState::HalfOpen {
            self.success_count += 1;
            if self.success_count >= settings.success_threshold {
                self.transition_to(CircuitState::Closed, settings);
            }
        }
    }

    pub(crate) fn record_failure(&mut self, settings: &BreakerSettings) {
        self.push_outcome(false, settings);
        self.failure_count += 1;
        self.last_failure_at = Some(Instant::now());

        settings
            .event_listeners
            .emit(&CircuitBreakerEvent::FailureRecorded {
                pattern_name: settings.name.clone(),
                timestamp: Instant::now(),
                state: self.state,
            });

        match self.state {
            CircuitState::Closed => {
                if self.recent_failures() >= settings.failure_threshold {
                    self.transition_to(CircuitState::Open, settings);
                }
            }
            CircuitState::HalfOpen => {
                // A single failure during recovery re-opens; this is what
                // keeps a herd of probes from hammering a sick downstream.
                self.transition_to(CircuitState::Open, settings);
            }
            CircuitState::Open => {}
        }
    }

    pub(crate) fn force_open(&mut self, settings: &BreakerSettings) {
        self.transition_to(CircuitState::Open, settings);
        self.last_failure_at = Some(Instant::now());
    }

    pub(crate) fn reset(&mut self, settings: &BreakerSettings) {
        self.transition_to(CircuitState::Closed, settings);
        self.last_failure_at = None;
    }

    fn transition_to(&mut self, state: CircuitState, settings: &BreakerSettings) {
        if self.state == state {
            return;
        }

        let from_state = self.state;

        settings
            .event_listeners
            .emit(&CircuitBreakerEvent::StateTransition {
                pattern_name: settings.name.clone(),
                timestamp: Instant::now(),
                from_state,
                to_state: state,
            });

        #[cfg(feature = "tracing")]
        tracing::info!(
            service = %settings.name,
            from = ?from_state,
            to = ?state,
            "circuit state transition"
        );

        #[cfg(feature = "metrics")]
        metrics::gauge!(
            "gateway_circuit_breaker_state",
            "service" => settings.name.clone()
        )
        .set(state as u8 as f64);

        self.state = state;
        self.state_atomic.store(state as u8, Ordering::Release);
        self.failure_count = 0;
        self.success_count = 0;
        self.recent_outcomes.clear();

        // An Open epoch starts with the failure that caused it; keep the
        // timestamp so the open timeout is measured from that failure.
        if state == CircuitState::Open && self.last_failure_at.is_none() {
            self.last_failure_at = Some(Instant::now());
        }
    }

    #[cfg(test)]
    pub(crate) fn set_last_failure_at(&mut self, at: Instant) {
        self.last_failure_at = Some(at);
    }

    /// Age of the last failure, used by the open-circuit error to suggest a
    /// retry interval.
    pub(crate) fn retry_after(&self, settings: &BreakerSettings) -> Duration {
        match self.last_failure_at {
            Some(t) => settings.open_timeout.saturating_sub(t.elapsed()),
            None => settings.open_timeout,
        }
    }
}
