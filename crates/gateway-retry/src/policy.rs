use std::sync::Arc;
use std::time::Duration;

use crate::backoff::{ExponentialBackoff, IntervalFunction};

/// Predicate deciding whether an error is worth another attempt.
pub type RetryPredicate<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;

/// Retry decision logic: which failures to retry and how long to wait.
///
/// Transport faults and retryable statuses get another attempt; a terminal
/// failure (client error, open circuit) short-circuits the remaining budget.
pub struct RetryPolicy<E> {
    predicate: Option<RetryPredicate<E>>,
    interval_fn: Arc<dyn IntervalFunction>,
}

impl<E> RetryPolicy<E> {
    pub(crate) fn new(
        predicate: Option<RetryPredicate<E>>,
        interval_fn: Option<Arc<dyn IntervalFunction>>,
    ) -> Self {
        Self {
            predicate,
            interval_fn: interval_fn
                .unwrap_or_else(|| Arc::new(ExponentialBackoff::new(Duration::from_millis(100)))),
        }
    }

    /// Returns true when the error is retryable. Without a predicate every
    /// error is considered retryable.
    pub fn should_retry(&self, error: &E) -> bool {
        match &self.predicate {
            Some(p) => p(error),
            None => true,
        }
    }

    /// The wait before retry `attempt` (zero-based).
    pub fn next_backoff(&self, attempt: usize) -> Duration {
        self.interval_fn.interval_for(attempt)
    }
}

impl<E> Clone for RetryPolicy<E> {
    fn clone(&self) -> Self {
        Self {
            predicate: self.predicate.clone(),
            interval_fn: Arc::clone(&self.interval_fn),
        }
    }
}
