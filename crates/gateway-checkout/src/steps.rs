//! The five checkout steps and their compensations.
//!
//! | step              | attempts | idempotent | compensation          |
//! |-------------------|----------|------------|-----------------------|
//! | create_order      | 1        | no         | cancel order          |
//! | reserve_inventory | 3        | yes        | restock               |
//! | check_fraud       | 2        | yes        | none (read-only)      |
//! | process_payment   | 2        | yes        | refund                |
//! | confirm_order     | 3        | yes        | cancel order          |

use std::sync::Arc;
use std::time::Duration;

use gateway_core::{IdempotencyKey, RequestContext};
use gateway_saga::{Saga, SagaContext, SagaStep, StepError};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::fraud::{FraudAction, FraudCheck, FraudScorer, FraudUnavailable};
use crate::payment::{PaymentError, PaymentGateway};
use crate::store::{CheckoutStore, OrderSummary, StoreError};
use crate::CheckoutRequest;

/// Everything the steps need: the store, the two external parties, and the
/// originating request context (correlation id and deadline).
pub struct CheckoutEnv {
    pub store: Arc<dyn CheckoutStore>,
    pub fraud: Arc<dyn FraudScorer>,
    pub payments: Arc<dyn PaymentGateway>,
    pub context: RequestContext,
    /// Proceed with a degraded verdict when the fraud service is down.
    pub fraud_fail_open: bool,
}

fn store_err(err: StoreError) -> StepError {
    if err.is_business() {
        StepError::business(err.to_string())
    } else {
        StepError::infrastructure(err.to_string())
    }
}

fn checkout_input(ctx: &SagaContext) -> Result<CheckoutRequest, StepError> {
    serde_json::from_value(ctx.initial_data.clone())
        .map_err(|err| StepError::infrastructure(format!("invalid checkout payload: {err}")))
}

fn order_summary(ctx: &SagaContext) -> Result<OrderSummary, StepError> {
    ctx.result_as("create_order")
        .ok_or_else(|| StepError::infrastructure("create_order result missing"))
}

fn cancellation_note(ctx: &SagaContext) -> String {
    format!("cancelled by saga compensation (saga_id: {})", ctx.saga_id)
}

/// Result stored by `process_payment`, read back by its compensation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentOutcome {
    pub payment_id: Uuid,
    pub intent_id: String,
    pub amount: Decimal,
    pub status: String,
}

fn to_value<T: Serialize>(value: &T) -> Result<Value, StepError> {
    serde_json::to_value(value)
        .map_err(|err| StepError::infrastructure(format!("serializing step result: {err}")))
}

/// Assembles the checkout saga definition.
pub fn checkout_saga() -> Saga<CheckoutEnv> {
    Saga::new("checkout")
        .step(
            SagaStep::new("create_order", |ctx: SagaContext, env: Arc<CheckoutEnv>| {
                Box::pin(async move {
                    let input = checkout_input(&ctx)?;
                    let summary = env
                        .store
                        .create_order(
                            &input.user_id,
                            input.cart_id,
                            &input.shipping_address,
                            &input.customer_notes,
                        )
                        .await
                        .map_err(store_err)?;
                    tracing::info!(
                        saga_id = %ctx.saga_id,
                        order_number = %summary.order_number,
                        total = %summary.total,
                        "order created"
                    );
                    to_value(&summary)
                })
            })
            .compensate(|ctx: SagaContext, env: Arc<CheckoutEnv>| {
                Box::pin(async move {
                    let summary = order_summary(&ctx)?;
                    env.store
                        .cancel_order(summary.order_id, &cancellation_note(&ctx))
                        .await
                        .map_err(store_err)
                })
            })
            .timeout(Duration::from_secs(10))
            .idempotent(false),
        )
        .step(
            SagaStep::new(
                "reserve_inventory",
                |ctx: SagaContext, env: Arc<CheckoutEnv>| {
                    Box::pin(async move {
                        let summary = order_summary(&ctx)?;
                        let reservations = env
                            .store
                            .reserve_stock(summary.order_id)
                            .await
                            .map_err(store_err)?;
                        let total_items_reserved = reservations.len();
                        Ok(json!({
                            "reservations": reservations,
                            "total_items_reserved": total_items_reserved,
                        }))
                    })
                },
            )
            .compensate(|ctx: SagaContext, env: Arc<CheckoutEnv>| {
                Box::pin(async move {
                    let summary = order_summary(&ctx)?;
                    env.store
                        .release_stock(summary.order_id)
                        .await
                        .map_err(store_err)
                })
            })
            .timeout(Duration::from_secs(15))
            .max_retries(2),
        )
        .step(
            SagaStep::new("check_fraud", |ctx: SagaContext, env: Arc<CheckoutEnv>| {
                Box::pin(async move {
                    let input = checkout_input(&ctx)?;
                    let summary = order_summary(&ctx)?;
                    let check = FraudCheck {
                        user_id: input.user_id,
                        amount: summary.total,
                        payment_method: input.payment_method,
                        order_id: summary.order_id,
                    };

                    match env.fraud.analyze(&check, &env.context).await {
                        Ok(verdict) => {
                            tracing::info!(
                                saga_id = %ctx.saga_id,
                                risk_score = verdict.risk_score,
                                action = ?verdict.action,
                                "fraud check result"
                            );
                            if verdict.action == FraudAction::Reject || verdict.risk_score >= 0.9 {
                                return Err(StepError::business(format!(
                                    "transaction rejected due to high fraud risk (score: {})",
                                    verdict.risk_score
                                )));
                            }
                            if verdict.action == FraudAction::Review {
                                tracing::warn!(
                                    saga_id = %ctx.saga_id,
                                    order_id = %summary.order_id,
                                    "transaction flagged for manual review, proceeding"
                                );
                            }
                            to_value(&verdict)
                        }
                        Err(unavailable) if env.fraud_fail_open => {
                            // Availability choice: score unavailable, sell
                            // anyway, flag for review.
                            tracing::warn!(
                                saga_id = %ctx.saga_id,
                                error = %unavailable,
                                "fraud service unavailable, proceeding degraded"
                            );
                            Ok(json!({
                                "risk_score": 0.5,
                                "action": "review",
                                "risk_factors": [],
                                "degraded": true,
                            }))
                        }
                        Err(unavailable @ FraudUnavailable::CircuitOpen(_)) => {
                            Err(StepError::unavailable(unavailable.to_string()))
                        }
                        Err(unavailable) => {
                            Err(StepError::infrastructure(unavailable.to_string()))
                        }
                    }
                })
            })
            .timeout(Duration::from_secs(10))
            .max_retries(1),
        )
        .step(
            SagaStep::new(
                "process_payment",
                |ctx: SagaContext, env: Arc<CheckoutEnv>| {
                    Box::pin(async move {
                        let input = checkout_input(&ctx)?;
                        let summary = order_summary(&ctx)?;

                        // External capture first; the local transaction
                        // opens only once the money has actually moved.
                        let key = IdempotencyKey::for_step(ctx.saga_id, "payment");
                        let receipt = env
                            .payments
                            .capture(&key, summary.order_id, summary.total, &input.payment_method)
                            .await
                            .map_err(|err| match err {
                                PaymentError::CardDeclined(_) => {
                                    StepError::business(err.to_string())
                                }
                                PaymentError::Unavailable(_) => {
                                    StepError::infrastructure(err.to_string())
                                }
                            })?;

                        let payment_id = env
                            .store
                            .record_payment(summary.order_id, summary.total, &receipt.intent_id)
                            .await
                            .map_err(store_err)?;

                        tracing::info!(
                            saga_id = %ctx.saga_id,
                            payment_id = %payment_id,
                            intent_id = %receipt.intent_id,
                            "payment captured"
                        );

                        to_value(&PaymentOutcome {
                            payment_id,
                            intent_id: receipt.intent_id,
                            amount: summary.total,
                            status: "succeeded".to_string(),
                        })
                    })
                },
            )
            .compensate(|ctx: SagaContext, env: Arc<CheckoutEnv>| {
                Box::pin(async move {
                    let Some(payment) = ctx.result_as::<PaymentOutcome>("process_payment") else {
                        return Ok(());
                    };

                    let key = IdempotencyKey::for_step(ctx.saga_id, "refund");
                    env.payments
                        .refund(&key, &payment.intent_id, payment.amount)
                        .await
                        .map_err(|err| {
                            // The money lands in the reconciliation queue;
                            // the engine logs this and keeps compensating.
                            StepError::infrastructure(format!("refund failed: {err}"))
                        })?;

                    env.store
                        .record_refund(payment.payment_id, &cancellation_note(&ctx))
                        .await
                        .map_err(store_err)
                })
            })
            .timeout(Duration::from_secs(30))
            .max_retries(1),
        )
        .step(
            SagaStep::new("confirm_order", |ctx: SagaContext, env: Arc<CheckoutEnv>| {
                Box::pin(async move {
                    let input = checkout_input(&ctx)?;
                    let summary = order_summary(&ctx)?;
                    env.store
                        .confirm_order(summary.order_id, input.cart_id)
                        .await
                        .map_err(store_err)?;
                    Ok(json!({
                        "order_id": summary.order_id,
                        "order_number": summary.order_number,
                        "status": "processing",
                    }))
                })
            })
            .compensate(|ctx: SagaContext, env: Arc<CheckoutEnv>| {
                Box::pin(async move {
                    // The cart stays emptied on purpose: by the time this
                    // compensation runs the shopper has moved on, and a
                    // silently refilled cart reads as a glitch.
                    let summary = order_summary(&ctx)?;
                    env.store
                        .cancel_order(summary.order_id, &cancellation_note(&ctx))
                        .await
                        .map_err(store_err)
                })
            })
            .timeout(Duration::from_secs(10))
            .max_retries(2),
        )
}
