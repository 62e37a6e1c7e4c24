use std::time::Duration;

use thiserror::Error;

/// Error returned by the circuit breaker service.
#[derive(Debug, Clone, Error)]
pub enum CircuitBreakerError<E> {
    /// The circuit is open; the call was rejected without reaching the
    /// downstream.
    #[error("circuit breaker '{service}' is open (retry after {retry_after:?})")]
    OpenCircuit {
        service: String,
        /// Suggested wait before the next attempt.
        retry_after: Duration,
    },
    /// The inner service failed.
    #[error(transparent)]
    Inner(E),
}

impl<E> CircuitBreakerError<E> {
    /// Returns `true` if this is the fail-fast open-circuit rejection.
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, CircuitBreakerError::OpenCircuit { .. })
    }

    /// Extracts the inner service error, if any.
    pub fn into_inner(self) -> Option<E> {
        match self {
            CircuitBreakerError::Inner(e) => Some(e),
            CircuitBreakerError::OpenCircuit { .. } => None,
        }
    }
}
