use std::marker::PhantomData;
use std::sync::Arc;
use std::time::{Duration, Instant};

use gateway_core::events::{EventListeners, FnListener};

use crate::backoff::{ExponentialBackoff, FixedInterval, IntervalFunction};
use crate::events::RetryEvent;
use crate::layer::RetryLayer;
use crate::policy::{RetryPolicy, RetryPredicate};

/// Extracts the deadline from a request, if it carries one.
pub type DeadlineFn<Req> = Arc<dyn Fn(&Req) -> Option<Instant> + Send + Sync>;

/// Configuration for the retry middleware.
pub struct RetryConfig<Req, E> {
    pub(crate) policy: RetryPolicy<E>,
    pub(crate) max_attempts: usize,
    pub(crate) deadline_fn: Option<DeadlineFn<Req>>,
    pub(crate) event_listeners: EventListeners<RetryEvent>,
    pub(crate) name: String,
}

/// Builder for [`RetryConfig`].
pub struct RetryConfigBuilder<Req, E> {
    max_attempts: usize,
    interval_fn: Option<Arc<dyn IntervalFunction>>,
    retry_predicate: Option<RetryPredicate<E>>,
    deadline_fn: Option<DeadlineFn<Req>>,
    event_listeners: EventListeners<RetryEvent>,
    name: String,
    _phantom: PhantomData<Req>,
}

impl<Req, E> RetryConfigBuilder<Req, E> {
    /// Creates a builder with defaults: 4 attempts (1 initial + 3 retries),
    /// exponential backoff from 100 ms with full jitter, no deadline.
    pub fn new() -> Self {
        Self {
            max_attempts: 4,
            interval_fn: None,
            retry_predicate: None,
            deadline_fn: None,
            event_listeners: EventListeners::new(),
            name: "<unnamed>".to_string(),
            _phantom: PhantomData,
        }
    }

    /// Total attempts including the initial one; `max_retries + 1`.
    pub fn max_attempts(mut self, n: usize) -> Self {
        self.max_attempts = n.max(1);
        self
    }

    /// Fixed wait between attempts.
    pub fn fixed_backoff(mut self, interval: Duration) -> Self {
        self.interval_fn = Some(Arc::new(FixedInterval::new(interval)));
        self
    }

    /// Exponential backoff starting at `base_delay` with default cap, base,
    /// and jitter. Use [`backoff`](Self::backoff) for full control.
    pub fn exponential_backoff(mut self, base_delay: Duration) -> Self {
        self.interval_fn = Some(Arc::new(ExponentialBackoff::new(base_delay)));
        self
    }

    /// Custom interval function.
    pub fn backoff<I>(mut self, interval_fn: I) -> Self
    where
        I: IntervalFunction + 'static,
    {
        self.interval_fn = Some(Arc::new(interval_fn));
        self
    }

    /// Predicate deciding which errors get another attempt; everything else
    /// is terminal and short-circuits.
    pub fn retry_on<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.retry_predicate = Some(Arc::new(predicate));
        self
    }

    /// Extracts a per-request deadline; no retry sleep is scheduled that
    /// would push the next attempt past it.
    pub fn deadline_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(&Req) -> Option<Instant> + Send + Sync + 'static,
    {
        self.deadline_fn = Some(Arc::new(f));
        self
    }

    /// Names this retry instance for events and logs.
    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    /// Register a callback invoked before each retry sleep.
    pub fn on_retry<F>(mut self, f: F) -> Self
    where
        F: Fn(usize, Duration) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &RetryEvent| {
                if let RetryEvent::Retry { attempt, delay, .. } = event {
                    f(*attempt, *delay);
                }
            }));
        self
    }

    /// Register a callback invoked when every attempt has failed.
    pub fn on_exhausted<F>(mut self, f: F) -> Self
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &RetryEvent| {
                if let RetryEvent::Exhausted { attempts, .. } = event {
                    f(*attempts);
                }
            }));
        self
    }

    /// Builds the configuration and returns a [`RetryLayer`].
    pub fn build(self) -> RetryLayer<Req, E> {
        RetryLayer::new(RetryConfig {
            policy: RetryPolicy::new(self.retry_predicate, self.interval_fn),
            max_attempts: self.max_attempts,
            deadline_fn: self.deadline_fn,
            event_listeners: self.event_listeners,
            name: self.name,
        })
    }
}

impl<Req, E> Default for RetryConfigBuilder<Req, E> {
    fn default() -> Self {
        Self::new()
    }
}
