use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use gateway_auth::{AuthError, TokenResponse};
use serde::Deserialize;
use serde_json::json;

use crate::error::ApiError;
use crate::extract::{AuthUser, BearerToken};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Issues an access token for a configured credential.
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let user = state
        .config
        .users
        .iter()
        .find(|user| user.email == body.email && user.password == body.password)
        .ok_or(AuthError::BadCredentials)?;

    let token = state
        .authenticator
        .issuer()
        .issue(&user.user_id, &user.email, vec!["user".to_string()])?;

    tracing::info!(user_id = %user.user_id, "login succeeded");

    Ok(Json(TokenResponse::bearer(
        token,
        state.config.access_token_ttl,
    )))
}

/// Revokes the presented token for the rest of its lifetime.
pub async fn logout(
    State(state): State<AppState>,
    BearerToken(token): BearerToken,
) -> Result<impl IntoResponse, ApiError> {
    state.authenticator.revoke(&token)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Identity of the presented token.
pub async fn me(AuthUser(claims): AuthUser) -> impl IntoResponse {
    Json(json!({
        "id": claims.sub,
        "email": claims.email,
        "scopes": claims.scopes,
    }))
}
