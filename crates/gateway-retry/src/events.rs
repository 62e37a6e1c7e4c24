use std::time::{Duration, Instant};

use gateway_core::GatewayEvent;

/// Events emitted by the retry executor.
#[derive(Debug, Clone)]
pub enum RetryEvent {
    /// An attempt failed retryably; another will run after `delay`.
    Retry {
        pattern_name: String,
        timestamp: Instant,
        attempt: usize,
        delay: Duration,
    },
    /// The call succeeded after `attempts` total attempts.
    Success {
        pattern_name: String,
        timestamp: Instant,
        attempts: usize,
    },
    /// Every attempt failed; the last error was returned.
    Exhausted {
        pattern_name: String,
        timestamp: Instant,
        attempts: usize,
    },
    /// The error was terminal; remaining attempts were skipped.
    IgnoredError {
        pattern_name: String,
        timestamp: Instant,
    },
    /// The next attempt would have started past the deadline, so the retry
    /// budget was cut short.
    DeadlineTrimmed {
        pattern_name: String,
        timestamp: Instant,
        attempts: usize,
    },
}

impl GatewayEvent for RetryEvent {
    fn event_type(&self) -> &'static str {
        match self {
            RetryEvent::Retry { .. } => "retry",
            RetryEvent::Success { .. } => "success",
            RetryEvent::Exhausted { .. } => "exhausted",
            RetryEvent::IgnoredError { .. } => "ignored_error",
            RetryEvent::DeadlineTrimmed { .. } => "deadline_trimmed",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            RetryEvent::Retry { timestamp, .. }
            | RetryEvent::Success { timestamp, .. }
            | RetryEvent::Exhausted { timestamp, .. }
            | RetryEvent::IgnoredError { timestamp, .. }
            | RetryEvent::DeadlineTrimmed { timestamp, .. } => *timestamp,
        }
    }

    fn pattern_name(&self) -> &str {
        match self {
            RetryEvent::Retry { pattern_name, .. }
            | RetryEvent::Success { pattern_name, .. }
            | RetryEvent::Exhausted { pattern_name, .. }
            | RetryEvent::IgnoredError { pattern_name, .. }
            | RetryEvent::DeadlineTrimmed { pattern_name, .. } => pattern_name,
        }
    }
}
