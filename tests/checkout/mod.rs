//! Checkout scenario suites.
//!
//! - scenarios.rs: the golden paths and failure paths (happy path, fraud
//!   decline, card decline, last-unit race, disconnect)
//! - fraud_outage.rs: fraud downstream failing through the real proxy stack
//!   (breaker trip, fail-fast, half-open probe)

mod fraud_outage;
mod scenarios;

use std::sync::Arc;
use std::time::Duration;

use gateway_checkout::fraud::FraudScorer;
use gateway_checkout::payment::MockPaymentGateway;
use gateway_checkout::store::{CartItem, MemoryStore, Product};
use gateway_checkout::CheckoutEnv;
use gateway_core::{CorrelationId, Identity, RequestContext};
use rust_decimal::Decimal;
use serde_json::json;
use uuid::Uuid;

pub fn dec(s: &str) -> Decimal {
    s.parse().unwrap()
}

pub fn request_context() -> RequestContext {
    RequestContext::new(
        CorrelationId::from_header(Some("cid-checkout")),
        Identity::User("u1".into()),
        http::Method::POST,
        "/api/v1/checkout",
        Some(Duration::from_secs(60)),
    )
}

/// Seeds product P from the scenario table: price 199.99, stock 50.
pub fn seed_catalog(store: &MemoryStore, stock: i64) -> Uuid {
    let product_id = Uuid::new_v4();
    store.insert_product(Product {
        id: product_id,
        name: "Walnut Desk".into(),
        sku: "DESK-001".into(),
        price: dec("199.99"),
        stock_quantity: stock,
        track_inventory: true,
    });
    product_id
}

pub fn cart_with(store: &MemoryStore, user_id: &str, product_id: Uuid, quantity: i64) -> Uuid {
    store.insert_cart(
        user_id,
        vec![CartItem {
            product_id,
            variant_name: None,
            quantity,
        }],
    )
}

pub fn checkout_input(user_id: &str, cart_id: Uuid) -> serde_json::Value {
    json!({
        "user_id": user_id,
        "cart_id": cart_id,
        "shipping_address": {
            "name": "Ada",
            "email": "ada@example.com",
            "address_line1": "1 Main St",
            "city": "Springfield",
            "postal_code": "11111",
        },
        "payment_method": "card",
    })
}

pub fn env(
    store: Arc<MemoryStore>,
    fraud: Arc<dyn FraudScorer>,
    payments: Arc<MockPaymentGateway>,
    fraud_fail_open: bool,
) -> CheckoutEnv {
    CheckoutEnv {
        store,
        fraud,
        payments,
        context: request_context(),
        fraud_fail_open,
    }
}
