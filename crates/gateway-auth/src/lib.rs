//! Authentication and admission control for the gateway ingress.
//!
//! Two concerns live here:
//!
//! - **Bearer tokens** ([`token`]): signed JWT claims carrying subject,
//!   scopes, and expiry. Verification checks signature, expiry, and the
//!   revocation set; logout writes an entry keyed by the token's hash with
//!   a TTL equal to the token's remaining lifetime.
//! - **Rate limiting** ([`ratelimit`]): per-identifier fixed-window quotas
//!   at minute granularity. The limiter fails open when its counter store is
//!   unavailable; admission control must not become an outage amplifier.
//!
//! The authenticator below ties both token checks together; the server's
//! middleware calls [`Authenticator::authenticate`] with the raw header
//! value.

mod error;
pub mod ratelimit;
mod revocation;
pub mod token;

pub use error::{AuthError, StoreError};
pub use ratelimit::{MemoryRateStore, RateLimitDecision, RateLimiter, RateStore};
pub use revocation::{MemoryRevocationStore, RevocationStore};
pub use token::{token_key, Claims, TokenIssuer, TokenResponse};

use std::sync::Arc;

/// Validates bearer tokens against the signing secret and the revocation
/// set.
pub struct Authenticator {
    issuer: TokenIssuer,
    revocations: Arc<dyn RevocationStore>,
}

impl Authenticator {
    pub fn new(issuer: TokenIssuer, revocations: Arc<dyn RevocationStore>) -> Self {
        Self {
            issuer,
            revocations,
        }
    }

    /// The underlying issuer, for login handlers.
    pub fn issuer(&self) -> &TokenIssuer {
        &self.issuer
    }

    /// Extracts and validates the token from an `Authorization` header
    /// value.
    pub fn authenticate(&self, authorization: Option<&str>) -> Result<Claims, AuthError> {
        let header = authorization.ok_or(AuthError::MissingToken)?;
        let token = header
            .strip_prefix("Bearer ")
            .or_else(|| header.strip_prefix("bearer "))
            .ok_or(AuthError::MissingToken)?;

        // Revocation first: a revoked token's signature still verifies.
        match self.revocations.is_revoked(&token_key(token)) {
            Ok(true) => return Err(AuthError::Revoked),
            Ok(false) => {}
            Err(err) => {
                tracing::warn!(error = %err, "revocation store unavailable, relying on expiry");
            }
        }

        self.issuer.verify(token)
    }

    /// Revokes a verified token for the rest of its lifetime.
    pub fn revoke(&self, token: &str) -> Result<(), AuthError> {
        let claims = self.issuer.verify(token)?;
        let ttl = claims.remaining_lifetime();
        self.revocations
            .revoke(&token_key(token), ttl)
            .map_err(|err| {
                tracing::error!(error = %err, "failed to persist revocation");
                AuthError::InvalidToken
            })
    }
}
