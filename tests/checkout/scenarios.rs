use std::sync::Arc;
use std::time::Duration;

use gateway_checkout::fraud::{FraudAction, FraudVerdict, StaticFraudScorer};
use gateway_checkout::payment::MockPaymentGateway;
use gateway_checkout::store::{MemoryStore, OrderStatus, PaymentState};
use gateway_checkout::{checkout_saga, outcome_from_report};
use http::StatusCode;

use super::{cart_with, checkout_input, dec, env, seed_catalog};

/// Happy path: fraud approves, payment captures, order lands in processing
/// with the exact store-rule totals.
#[tokio::test]
async fn happy_path_checkout() {
    let store = Arc::new(MemoryStore::new());
    let product = seed_catalog(&store, 50);
    let cart = cart_with(&store, "u1", product, 1);
    let payments = Arc::new(MockPaymentGateway::new());

    let env = env(
        Arc::clone(&store),
        Arc::new(StaticFraudScorer::with_verdict(FraudVerdict {
            risk_score: 0.1,
            action: FraudAction::Approve,
            risk_factors: vec![],
            degraded: false,
        })),
        Arc::clone(&payments),
        true,
    );

    let report = checkout_saga().execute(Arc::new(env), checkout_input("u1", cart)).await;
    let success = outcome_from_report(&report).unwrap();

    assert_eq!(success.status, "processing");
    assert_eq!(success.total, dec("219.989"));

    let order = store.order(success.order_id).unwrap();
    assert_eq!(order.subtotal, dec("199.99"));
    assert_eq!(order.tax, dec("19.999"));
    assert_eq!(order.shipping_cost, dec("0"));
    assert_eq!(order.status, OrderStatus::Processing);
    assert_eq!(order.payment_state, PaymentState::Paid);

    assert_eq!(store.product_stock(product), Some(49));
    assert_eq!(store.cart_item_count(cart), Some(0));
    assert_eq!(payments.captured_charge_count(), 1);
}

/// Fraud decline: reservation is unwound, the order ends cancelled, no
/// payment happens, and the cart is still intact; it is only emptied by the
/// confirmation step, which never ran.
#[tokio::test]
async fn fraud_decline_compensates_everything_before_money() {
    let store = Arc::new(MemoryStore::new());
    let product = seed_catalog(&store, 50);
    let cart = cart_with(&store, "u1", product, 1);
    let payments = Arc::new(MockPaymentGateway::new());

    let env = env(
        Arc::clone(&store),
        Arc::new(StaticFraudScorer::with_verdict(FraudVerdict {
            risk_score: 0.95,
            action: FraudAction::Reject,
            risk_factors: vec!["velocity".into()],
            degraded: false,
        })),
        Arc::clone(&payments),
        true,
    );

    let report = checkout_saga().execute(Arc::new(env), checkout_input("u1", cart)).await;
    let error = outcome_from_report(&report).unwrap_err();

    assert_eq!(error.status, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(error.failed_step.as_deref(), Some("check_fraud"));

    let order_id = report
        .context
        .result_as::<gateway_checkout::store::OrderSummary>("create_order")
        .unwrap()
        .order_id;
    let order = store.order(order_id).unwrap();
    assert_eq!(order.status, OrderStatus::Cancelled);
    assert!(order
        .audit_note
        .unwrap()
        .contains(&report.saga_id().to_string()));

    assert_eq!(store.product_stock(product), Some(50));
    assert_eq!(store.cart_item_count(cart), Some(1));
    assert!(store.payments_for(order_id).is_empty());
}

/// Card declined at capture: stock restored, order cancelled, and since
/// nothing was captured there is neither a payment row nor a refund row.
#[tokio::test]
async fn card_decline_cancels_without_refund() {
    let store = Arc::new(MemoryStore::new());
    let product = seed_catalog(&store, 50);
    let cart = cart_with(&store, "u1", product, 1);
    let payments = Arc::new(MockPaymentGateway::new());
    payments.decline_cards(true);

    let env = env(
        Arc::clone(&store),
        Arc::new(StaticFraudScorer::approving()),
        Arc::clone(&payments),
        true,
    );

    let report = checkout_saga().execute(Arc::new(env), checkout_input("u1", cart)).await;
    let error = outcome_from_report(&report).unwrap_err();

    assert_eq!(error.status, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(error.failed_step.as_deref(), Some("process_payment"));

    let order_id = report
        .context
        .result_as::<gateway_checkout::store::OrderSummary>("create_order")
        .unwrap()
        .order_id;
    assert_eq!(store.order(order_id).unwrap().status, OrderStatus::Cancelled);
    assert_eq!(store.product_stock(product), Some(50));
    assert!(store.payments_for(order_id).is_empty());
    assert!(store.refunds_for(order_id).is_empty());
    assert_eq!(payments.refund_count(), 0);
}

/// A failure after capture refunds the charge through the idempotent
/// pathway and records the refund.
#[tokio::test]
async fn post_capture_failure_refunds() {
    // The in-memory confirm step cannot be made to fail, so the post-capture
    // failure is assembled with the engine directly: the real payment step
    // and its refund compensation, followed by a step that always fails.
    use gateway_checkout::payment::PaymentGateway;
    use gateway_checkout::store::CheckoutStore;
    use gateway_checkout::{CheckoutEnv, PaymentOutcome};
    use gateway_core::IdempotencyKey;
    use gateway_saga::{Saga, SagaContext, SagaStep, StepError};

    let store = Arc::new(MemoryStore::new());
    let payments = Arc::new(MockPaymentGateway::new());
    let product = seed_catalog(&store, 50);
    let cart = cart_with(&store, "u1", product, 1);

    let env = env(
        Arc::clone(&store),
        Arc::new(StaticFraudScorer::approving()),
        Arc::clone(&payments),
        true,
    );

    let saga: Saga<CheckoutEnv> = Saga::new("capture-then-fail")
        .step(
            SagaStep::new("create_order", |ctx: SagaContext, env: Arc<CheckoutEnv>| {
                Box::pin(async move {
                    let input: gateway_checkout::CheckoutRequest =
                        serde_json::from_value(ctx.initial_data.clone())
                            .map_err(|e| StepError::infrastructure(e.to_string()))?;
                    let summary = env
                        .store
                        .create_order(&input.user_id, input.cart_id, &input.shipping_address, "")
                        .await
                        .map_err(|e| StepError::infrastructure(e.to_string()))?;
                    Ok(serde_json::to_value(summary).unwrap())
                })
            })
            .timeout(Duration::from_secs(5)),
        )
        .step(
            SagaStep::new("process_payment", |ctx: SagaContext, env: Arc<CheckoutEnv>| {
                Box::pin(async move {
                    let summary: gateway_checkout::store::OrderSummary =
                        ctx.result_as("create_order").unwrap();
                    let key = IdempotencyKey::for_step(ctx.saga_id, "payment");
                    let receipt = env
                        .payments
                        .capture(&key, summary.order_id, summary.total, "card")
                        .await
                        .map_err(|e| StepError::infrastructure(e.to_string()))?;
                    let payment_id = env
                        .store
                        .record_payment(summary.order_id, summary.total, &receipt.intent_id)
                        .await
                        .map_err(|e| StepError::infrastructure(e.to_string()))?;
                    Ok(serde_json::to_value(PaymentOutcome {
                        payment_id,
                        intent_id: receipt.intent_id,
                        amount: summary.total,
                        status: "succeeded".into(),
                    })
                    .unwrap())
                })
            })
            .compensate(|ctx: SagaContext, env: Arc<CheckoutEnv>| {
                Box::pin(async move {
                    let payment: PaymentOutcome = ctx.result_as("process_payment").unwrap();
                    let key = IdempotencyKey::for_step(ctx.saga_id, "refund");
                    env.payments
                        .refund(&key, &payment.intent_id, payment.amount)
                        .await
                        .map_err(|e| StepError::infrastructure(e.to_string()))?;
                    env.store
                        .record_refund(payment.payment_id, "saga compensation")
                        .await
                        .map_err(|e| StepError::infrastructure(e.to_string()))
                })
            })
            .timeout(Duration::from_secs(5)),
        )
        .step(
            SagaStep::new("explode", |_ctx: SagaContext, _env: Arc<CheckoutEnv>| {
                Box::pin(async move { Err(StepError::infrastructure("confirm failed")) })
            })
            .timeout(Duration::from_secs(5)),
        );

    let report = saga.execute(Arc::new(env), checkout_input("u1", cart)).await;
    assert_eq!(report.status, gateway_saga::SagaStatus::Failed);

    assert_eq!(payments.captured_charge_count(), 1);
    assert_eq!(payments.refund_count(), 1);
}

/// Two concurrent checkouts race for the last unit: exactly one wins, the
/// loser is fully compensated, and stock ends at zero.
#[tokio::test]
async fn concurrent_checkouts_of_last_unit() {
    let store = Arc::new(MemoryStore::new());
    let product = seed_catalog(&store, 1);
    let cart_a = cart_with(&store, "alice", product, 1);
    let cart_b = cart_with(&store, "bob", product, 1);
    let payments = Arc::new(MockPaymentGateway::new());

    let env_a = env(
        Arc::clone(&store),
        Arc::new(StaticFraudScorer::approving()),
        Arc::clone(&payments),
        true,
    );
    let env_b = env(
        Arc::clone(&store),
        Arc::new(StaticFraudScorer::approving()),
        Arc::clone(&payments),
        true,
    );

    let saga_a = checkout_saga();
    let saga_b = checkout_saga();
    let (report_a, report_b) = tokio::join!(
        saga_a.execute(Arc::new(env_a), checkout_input("alice", cart_a)),
        saga_b.execute(Arc::new(env_b), checkout_input("bob", cart_b)),
    );

    let outcomes = [
        outcome_from_report(&report_a),
        outcome_from_report(&report_b),
    ];
    let winners = outcomes.iter().filter(|o| o.is_ok()).count();
    assert_eq!(winners, 1, "exactly one saga may win the last unit");

    let loser = outcomes.iter().find_map(|o| o.as_ref().err()).unwrap();
    assert_eq!(loser.status, StatusCode::BAD_REQUEST);
    assert_eq!(loser.failed_step.as_deref(), Some("reserve_inventory"));

    assert_eq!(store.product_stock(product), Some(0));
    assert_eq!(payments.captured_charge_count(), 1);
}

/// The saga finishes even when nobody is waiting on it (client disconnect):
/// dropping the join handle does not cancel the spawned execution.
#[tokio::test]
async fn detached_saga_completes_after_disconnect() {
    let store = Arc::new(MemoryStore::new());
    let product = seed_catalog(&store, 50);
    let cart = cart_with(&store, "u1", product, 1);
    let payments = Arc::new(MockPaymentGateway::new());

    let env = env(
        Arc::clone(&store),
        Arc::new(StaticFraudScorer::approving()),
        Arc::clone(&payments),
        true,
    );

    let input = checkout_input("u1", cart);
    let handle = tokio::spawn(async move { checkout_saga().execute(Arc::new(env), input).await });
    drop(handle); // the "client" goes away

    // The saga still runs to completion.
    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    loop {
        if store.cart_item_count(cart) == Some(0) {
            break;
        }
        assert!(
            std::time::Instant::now() < deadline,
            "saga did not complete after disconnect"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(store.product_stock(product), Some(49));
    assert_eq!(payments.captured_charge_count(), 1);
}
