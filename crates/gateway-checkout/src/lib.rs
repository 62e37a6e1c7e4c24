//! The checkout saga: the multi-step business transaction behind
//! `POST /api/v1/checkout`.
//!
//! Five steps span resources that cannot share one atomic commit: the local
//! order store, the fraud-scoring service, and the payment gateway. Forward
//! steps run in order through the saga engine; on failure, compensations run
//! in reverse completion order (restock, refund, cancel). The cart is only
//! emptied by the final confirmation step, so a saga that fails earlier
//! leaves the shopper's cart intact.
//!
//! The store is consumed through [`store::CheckoutStore`], the row-locking
//! transactional interface of the SQL-backed domain service; fraud and
//! payment are consumed through [`fraud::FraudScorer`] and
//! [`payment::PaymentGateway`].

pub mod fraud;
mod money;
pub mod payment;
mod steps;
pub mod store;

pub use money::{totals, OrderTotals};
pub use steps::{checkout_saga, CheckoutEnv, PaymentOutcome};
pub use store::{MemoryStore, ShippingAddress};

use gateway_saga::{SagaReport, SagaStatus, StepErrorKind};
use http::StatusCode;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Checkout input: the authenticated user plus the request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutRequest {
    pub user_id: String,
    pub cart_id: Uuid,
    pub shipping_address: ShippingAddress,
    #[serde(default = "default_true")]
    pub billing_same_as_shipping: bool,
    pub payment_method: String,
    #[serde(default)]
    pub customer_notes: String,
}

fn default_true() -> bool {
    true
}

/// Body of the 201 response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSuccess {
    pub order_id: Uuid,
    pub order_number: String,
    pub total: Decimal,
    pub status: String,
}

/// A failed checkout, mapped to its HTTP shape.
#[derive(Debug, Clone)]
pub struct CheckoutError {
    pub status: StatusCode,
    pub kind: &'static str,
    pub detail: String,
    pub saga_id: Uuid,
    pub failed_step: Option<String>,
}

/// Translates a finished saga into the client-facing outcome.
///
/// Business rejects at the money steps (fraud decline, card decline) map to
/// 402; earlier domain rejects (empty cart, insufficient stock) to 400;
/// infrastructure failures to 502. Compensation already ran by the time this
/// is called.
pub fn outcome_from_report(report: &SagaReport) -> Result<CheckoutSuccess, CheckoutError> {
    let saga_id = report.saga_id();

    if report.status == SagaStatus::Completed {
        let summary: store::OrderSummary =
            report
                .context
                .result_as("create_order")
                .ok_or_else(|| CheckoutError {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    kind: "internal_error",
                    detail: "saga completed without an order result".to_string(),
                    saga_id,
                    failed_step: None,
                })?;
        return Ok(CheckoutSuccess {
            order_id: summary.order_id,
            order_number: summary.order_number,
            total: summary.total,
            status: "processing".to_string(),
        });
    }

    let failed_step = report.failed_step.clone();
    let (status, kind, detail) = match &report.error {
        Some(error) if error.kind == StepErrorKind::Business => {
            let status = match failed_step.as_deref() {
                Some("check_fraud") | Some("process_payment") => StatusCode::PAYMENT_REQUIRED,
                _ => StatusCode::BAD_REQUEST,
            };
            (status, "checkout_rejected", error.detail.clone())
        }
        Some(error) if error.kind == StepErrorKind::Unavailable => (
            StatusCode::SERVICE_UNAVAILABLE,
            "service_unavailable",
            error.detail.clone(),
        ),
        Some(error) => (
            StatusCode::BAD_GATEWAY,
            "checkout_unavailable",
            error.detail.clone(),
        ),
        None => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal_error",
            "saga failed without an error".to_string(),
        ),
    };

    Err(CheckoutError {
        status,
        kind,
        detail,
        saga_id,
        failed_step,
    })
}
