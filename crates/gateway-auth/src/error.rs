use thiserror::Error;

/// Authentication and rate-limit errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing bearer token")]
    MissingToken,
    #[error("could not validate credentials")]
    InvalidToken,
    #[error("token has expired")]
    ExpiredToken,
    #[error("token has been revoked")]
    Revoked,
    #[error("invalid credentials")]
    BadCredentials,
}

/// Failure of the backing key-value store (revocation set or rate counters).
///
/// The limiter treats this as a reason to let the request through, never to
/// block it.
#[derive(Debug, Clone, Error)]
#[error("auth store error: {0}")]
pub struct StoreError(pub String);
