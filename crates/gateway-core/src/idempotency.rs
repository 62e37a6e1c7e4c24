//! Idempotency keys for write-side downstream calls.
//!
//! A retried capture or refund must be coalesced by the receiver into one
//! logical operation. The key is stable across retries of the same saga step:
//! `{saga_id}:{step_name}`.

use std::fmt;

use uuid::Uuid;

/// Header the payment gateway (and any write-side downstream) reads the key
/// from.
pub const IDEMPOTENCY_HEADER: &str = "idempotency-key";

/// A stable identifier attached to a write-side operation so that retries are
/// coalesced by the receiver.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    /// Derives the key for one saga step.
    pub fn for_step(saga_id: Uuid, step_name: &str) -> Self {
        Self(format!("{saga_id}:{step_name}"))
    }

    /// Returns the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
