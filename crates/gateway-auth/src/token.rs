//! Bearer tokens: signed JWT claims with issue, verification, and the
//! revocation hook.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::AuthError;

/// Payload of an access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user id.
    pub sub: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub scopes: Vec<String>,
    /// Issued-at, epoch seconds.
    pub iat: u64,
    /// Expiry, epoch seconds.
    pub exp: u64,
}

impl Claims {
    /// Seconds until this token expires, zero if already past.
    pub fn remaining_lifetime(&self) -> Duration {
        Duration::from_secs(self.exp.saturating_sub(epoch_now()))
    }
}

/// Standard bearer-token response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
}

impl TokenResponse {
    pub fn bearer(access_token: String, expires_in: Duration) -> Self {
        Self {
            access_token,
            token_type: "bearer".to_string(),
            expires_in: expires_in.as_secs(),
        }
    }
}

pub(crate) fn epoch_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Stable revocation key for a token: its SHA-256, so raw tokens never sit
/// in the revocation store.
pub fn token_key(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

/// Issues and verifies access tokens with one signing secret.
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    header: Header,
    validation: Validation,
    ttl: Duration,
}

impl TokenIssuer {
    pub fn new(secret: &str, algorithm: Algorithm, ttl: Duration) -> Self {
        let mut validation = Validation::new(algorithm);
        validation.validate_exp = true;
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            header: Header::new(algorithm),
            validation,
            ttl,
        }
    }

    /// Token lifetime configured for this issuer.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Signs a token for `subject`.
    pub fn issue(
        &self,
        subject: &str,
        email: &str,
        scopes: Vec<String>,
    ) -> Result<String, AuthError> {
        let now = epoch_now();
        let claims = Claims {
            sub: subject.to_string(),
            email: email.to_string(),
            scopes,
            iat: now,
            exp: now + self.ttl.as_secs(),
        };
        encode(&self.header, &claims, &self.encoding_key).map_err(|_| AuthError::InvalidToken)
    }

    /// Checks signature and expiry, returning the claims.
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|err| match err.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::ExpiredToken,
                _ => AuthError::InvalidToken,
            })
    }
}
