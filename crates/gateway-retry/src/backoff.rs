use std::time::Duration;

use rand::Rng;

/// Computes the wait before retry attempt `n` (zero-based).
pub trait IntervalFunction: Send + Sync {
    fn interval_for(&self, attempt: usize) -> Duration;
}

/// The same wait before every retry.
#[derive(Debug, Clone, Copy)]
pub struct FixedInterval {
    interval: Duration,
}

impl FixedInterval {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl IntervalFunction for FixedInterval {
    fn interval_for(&self, _attempt: usize) -> Duration {
        self.interval
    }
}

/// Exponential backoff with an upper cap and optional jitter.
///
/// The raw delay for attempt `n` is `min(max_delay, base_delay * exp_base^n)`.
/// With jitter enabled the capped delay is multiplied by a uniform factor in
/// `[0.5, 1.0)`, spreading simultaneous retriers across half the interval so
/// a recovering downstream is not hit by a synchronized wave.
#[derive(Debug, Clone, Copy)]
pub struct ExponentialBackoff {
    base_delay: Duration,
    exp_base: f64,
    max_delay: Duration,
    jitter: bool,
}

impl ExponentialBackoff {
    pub fn new(base_delay: Duration) -> Self {
        Self {
            base_delay,
            exp_base: 2.0,
            max_delay: Duration::from_secs(10),
            jitter: true,
        }
    }

    pub fn exp_base(mut self, exp_base: f64) -> Self {
        self.exp_base = exp_base;
        self
    }

    pub fn max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    pub fn jitter(mut self, enabled: bool) -> Self {
        self.jitter = enabled;
        self
    }

    fn capped(&self, attempt: usize) -> Duration {
        let raw = self.base_delay.as_secs_f64() * self.exp_base.powi(attempt as i32);
        Duration::from_secs_f64(raw.min(self.max_delay.as_secs_f64()))
    }
}

impl IntervalFunction for ExponentialBackoff {
    fn interval_for(&self, attempt: usize) -> Duration {
        let capped = self.capped(attempt);
        if !self.jitter {
            return capped;
        }
        let factor: f64 = rand::rng().random_range(0.5..1.0);
        capped.mul_f64(factor)
    }
}

/// Adapts a closure into an [`IntervalFunction`].
pub struct FnInterval<F>(pub F);

impl<F> IntervalFunction for FnInterval<F>
where
    F: Fn(usize) -> Duration + Send + Sync,
{
    fn interval_for(&self, attempt: usize) -> Duration {
        (self.0)(attempt)
    }
}
