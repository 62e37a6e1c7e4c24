use thiserror::Error;

/// Whether a step failed because the business said no, or because the
/// machinery underneath did.
///
/// The distinction drives both retry behavior (a business reject will not
/// change on retry) and the HTTP status the edge maps the saga failure to
/// (4xx versus 502/504).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepErrorKind {
    Business,
    Infrastructure,
    /// The dependency refused fast (open circuit); the client should retry
    /// later rather than blame the request.
    Unavailable,
}

/// Failure of one saga step.
#[derive(Debug, Clone, Error)]
#[error("{detail}")]
pub struct StepError {
    pub kind: StepErrorKind,
    pub detail: String,
}

impl StepError {
    /// A domain-level reject: empty cart, insufficient stock, fraud decline.
    pub fn business(detail: impl Into<String>) -> Self {
        Self {
            kind: StepErrorKind::Business,
            detail: detail.into(),
        }
    }

    /// A machinery failure: downstream unreachable, store error, timeout.
    pub fn infrastructure(detail: impl Into<String>) -> Self {
        Self {
            kind: StepErrorKind::Infrastructure,
            detail: detail.into(),
        }
    }

    /// A fail-fast reject from an open circuit.
    pub fn unavailable(detail: impl Into<String>) -> Self {
        Self {
            kind: StepErrorKind::Unavailable,
            detail: detail.into(),
        }
    }

    pub fn is_business(&self) -> bool {
        self.kind == StepErrorKind::Business
    }
}
