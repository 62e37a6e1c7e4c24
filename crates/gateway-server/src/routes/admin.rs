use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;
use uuid::Uuid;

use crate::error::ApiError;
use crate::extract::AuthUser;
use crate::state::AppState;

/// Snapshot of every circuit breaker.
pub async fn circuit_breakers(
    State(state): State<AppState>,
    AuthUser(_claims): AuthUser,
) -> impl IntoResponse {
    let snapshots = state.breakers.snapshots().await;
    Json(json!({ "circuit_breakers": snapshots }))
}

/// Operator override: close a breaker and clear its counts. Audited.
pub async fn reset_circuit_breaker(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path(service): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    if !state.breakers.reset(&service).await {
        return Err(ApiError::not_found(format!(
            "no circuit breaker for service '{service}'"
        )));
    }

    tracing::warn!(
        service = %service,
        reset_by = %claims.sub,
        "circuit breaker manually reset"
    );

    Ok(Json(json!({
        "message": format!("Circuit breaker '{service}' has been reset"),
    })))
}

/// Status of one saga, while it runs and for the retention window after.
pub async fn saga_status(
    State(state): State<AppState>,
    AuthUser(_claims): AuthUser,
    Path(saga_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .sagas
        .get(saga_id)
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("saga {saga_id} not found")))
}
