use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use gateway_checkout::fraud::ProxyFraudScorer;
use gateway_checkout::store::ShippingAddress;
use gateway_checkout::{checkout_saga, outcome_from_report, CheckoutEnv, CheckoutRequest};
use gateway_core::{CorrelationId, Identity};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::error::ApiError;
use crate::extract::AuthUser;
use crate::middleware::request_context;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CheckoutBody {
    pub cart_id: Uuid,
    pub shipping_address: ShippingAddress,
    #[serde(default)]
    pub billing_same_as_shipping: Option<bool>,
    pub payment_method: String,
    #[serde(default)]
    pub customer_notes: String,
}

/// `POST /api/v1/checkout`: runs the checkout saga to a terminal state.
///
/// The saga runs on a detached task: a client that disconnects mid-payment
/// stops receiving bytes, but the transaction still completes (or
/// compensates) with its original correlation id.
pub async fn checkout(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    request: Request,
) -> Result<Response, ApiError> {
    let correlation_id = request
        .extensions()
        .get::<CorrelationId>()
        .cloned()
        .unwrap_or_else(CorrelationId::generate);

    let body = axum::body::to_bytes(request.into_body(), 256 * 1024)
        .await
        .map_err(|err| {
            ApiError::new(
                StatusCode::PAYLOAD_TOO_LARGE,
                "payload_too_large",
                err.to_string(),
            )
        })?;
    let body: CheckoutBody = serde_json::from_slice(&body).map_err(|err| {
        ApiError::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            "validation_error",
            err.to_string(),
        )
    })?;

    let context = request_context(
        &state,
        correlation_id,
        Identity::User(claims.sub.clone()),
        http::Method::POST,
        "/api/v1/checkout",
    );

    let fraud_target = state
        .target("fraud")
        .ok_or_else(|| ApiError::internal("fraud service not configured"))?;
    let fraud_proxy = state
        .proxies
        .proxy(&fraud_target)
        .map_err(|err| ApiError::internal(err.to_string()))?;

    let env = CheckoutEnv {
        store: state.store.clone(),
        fraud: Arc::new(ProxyFraudScorer::new(fraud_proxy, "/analyze")),
        payments: state.payments.clone(),
        context,
        fraud_fail_open: state.config.fraud_fail_open,
    };

    let input = CheckoutRequest {
        user_id: claims.sub,
        cart_id: body.cart_id,
        shipping_address: body.shipping_address,
        billing_same_as_shipping: body.billing_same_as_shipping.unwrap_or(true),
        payment_method: body.payment_method,
        customer_notes: body.customer_notes,
    };
    let initial_data = serde_json::to_value(&input)
        .map_err(|err| ApiError::internal(format!("encoding saga input: {err}")))?;

    let saga = checkout_saga().with_registry(Arc::clone(&state.sagas));
    let env = Arc::new(env);
    let report = tokio::spawn(async move { saga.execute(env, initial_data).await })
        .await
        .map_err(|err| ApiError::internal(format!("saga task failed: {err}")))?;

    match outcome_from_report(&report) {
        Ok(success) => Ok((StatusCode::CREATED, Json(success)).into_response()),
        Err(error) => Ok((
            error.status,
            Json(json!({
                "error": {
                    "type": error.kind,
                    "message": error.detail,
                    "saga_id": error.saga_id,
                    "failed_step": error.failed_step,
                }
            })),
        )
            .into_response()),
    }
}
