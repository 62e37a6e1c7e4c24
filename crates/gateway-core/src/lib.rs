//! Shared plumbing for the gateway crates.
//!
//! This crate holds the pieces every other gateway crate depends on:
//!
//! - An [`events`] module with the listener machinery the circuit breaker,
//!   retry executor, and saga engine use to surface what they are doing
//!   without depending on any particular metrics or logging sink.
//! - A [`correlation`] module with the per-request [`CorrelationId`] and
//!   [`RequestContext`] that flow from ingress to every outbound call.
//! - An [`idempotency`] module with the key derivation used to make
//!   write-side downstream calls safe to retry.

pub mod correlation;
pub mod events;
pub mod idempotency;

pub use correlation::{CorrelationId, Identity, RequestContext, CORRELATION_HEADER};
pub use events::{EventListener, EventListeners, FnListener, GatewayEvent};
pub use idempotency::IdempotencyKey;
