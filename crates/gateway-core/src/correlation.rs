//! Correlation ids and the per-request context they travel in.
//!
//! Every inbound request gets a [`CorrelationId`]: either the one the client
//! supplied in `X-Correlation-ID` or a freshly generated UUID. The id appears
//! in every log line, every outbound header, and every response, so a single
//! grep ties an incident back to one client request across services.

use std::fmt;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Header carrying the correlation id on ingress and egress.
pub const CORRELATION_HEADER: &str = "x-correlation-id";

/// A per-request identifier propagated to every downstream call.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Generates a fresh id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Accepts a client-supplied header value, falling back to a generated id
    /// when the value is empty or implausibly long.
    pub fn from_header(value: Option<&str>) -> Self {
        match value {
            Some(v) if !v.is_empty() && v.len() <= 128 => Self(v.to_string()),
            _ => Self::generate(),
        }
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Who is making the request, for rate-limit keying and audit logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    /// An authenticated subject (user id).
    User(String),
    /// An unauthenticated caller, identified by client address.
    ClientIp(String),
}

impl Identity {
    /// Stable key for rate limiting.
    pub fn rate_key(&self) -> &str {
        match self {
            Identity::User(id) => id,
            Identity::ClientIp(ip) => ip,
        }
    }
}

/// Per-request state created at ingress and carried through every component.
///
/// A context belongs to exactly one request; it is moved into the handler and
/// never shared between concurrent requests.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub correlation_id: CorrelationId,
    pub client_identity: Identity,
    pub method: http::Method,
    pub path: String,
    pub received_at: Instant,
    /// Hard cutoff for all work on behalf of this request. `None` disables
    /// deadline trimming (used by background saga completion).
    pub deadline: Option<Instant>,
}

impl RequestContext {
    /// Creates a context for a freshly accepted request.
    pub fn new(
        correlation_id: CorrelationId,
        client_identity: Identity,
        method: http::Method,
        path: impl Into<String>,
        ingress_timeout: Option<Duration>,
    ) -> Self {
        let received_at = Instant::now();
        Self {
            correlation_id,
            client_identity,
            method,
            path: path.into(),
            received_at,
            deadline: ingress_timeout.map(|t| received_at + t),
        }
    }

    /// Remaining time before the deadline, if one is set.
    pub fn time_remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// True once the deadline has passed.
    pub fn deadline_exceeded(&self) -> bool {
        matches!(self.time_remaining(), Some(rem) if rem.is_zero())
    }
}
