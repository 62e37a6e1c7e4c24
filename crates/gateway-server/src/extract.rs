use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use gateway_auth::Claims;

use crate::error::ApiError;
use crate::state::AppState;

/// Extractor for routes that require a valid bearer token.
///
/// Authentication happens here, per protected route, so the exempt surface
/// (health, readiness, metrics, login) is simply the set of handlers that
/// don't ask for it.
pub struct AuthUser(pub Claims);

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok());
        let claims = state.authenticator.authenticate(header)?;
        Ok(AuthUser(claims))
    }
}

/// The raw bearer token, for logout.
pub struct BearerToken(pub String);

#[axum::async_trait]
impl FromRequestParts<AppState> for BearerToken {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|header| {
                header
                    .strip_prefix("Bearer ")
                    .or_else(|| header.strip_prefix("bearer "))
            })
            .map(|token| BearerToken(token.to_string()))
            .ok_or_else(|| gateway_auth::AuthError::MissingToken.into())
    }
}
