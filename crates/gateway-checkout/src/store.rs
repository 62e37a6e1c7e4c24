//! The domain store interface the checkout saga consumes, and the in-memory
//! implementation used by tests and single-process deployments.
//!
//! The production store is an SQL database; every trait method corresponds
//! to one short transaction that takes `SELECT ... FOR UPDATE` row locks on
//! the rows it mutates. The in-memory store models the same contract with a
//! single table mutex: each call is one serializable transaction, and no
//! call spans a network await.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::money;

/// Failure of a store transaction.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The cart has no items; checkout is refused before any writes.
    #[error("cart is empty")]
    EmptyCart,
    /// A product cannot cover the requested quantity.
    #[error("insufficient stock for {product}: available {available}, required {required}")]
    InsufficientStock {
        product: String,
        available: i64,
        required: i64,
    },
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: Uuid },
    /// The store itself misbehaved (connection loss, constraint violation).
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Business errors are domain rejects; everything else is
    /// infrastructure.
    pub fn is_business(&self) -> bool {
        matches!(
            self,
            StoreError::EmptyCart | StoreError::InsufficientStock { .. }
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub sku: String,
    pub price: Decimal,
    pub stock_quantity: i64,
    pub track_inventory: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartItem {
    pub product_id: Uuid,
    pub variant_name: Option<String>,
    pub quantity: i64,
}

#[derive(Debug, Clone)]
pub struct Cart {
    pub id: Uuid,
    pub user_id: String,
    pub items: Vec<CartItem>,
}

/// Shipping details captured on the order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShippingAddress {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address_line1: String,
    #[serde(default)]
    pub address_line2: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default = "default_country")]
    pub country: String,
    #[serde(default)]
    pub postal_code: String,
}

fn default_country() -> String {
    "US".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Processing,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentState {
    Pending,
    Paid,
}

/// Line item snapshotted at order time, so later catalog edits never
/// rewrite history.
#[derive(Debug, Clone, Serialize)]
pub struct OrderItem {
    pub product_id: Uuid,
    pub product_name: String,
    pub sku: String,
    pub variant_name: Option<String>,
    pub quantity: i64,
    pub unit_price: Decimal,
    pub total_price: Decimal,
}

#[derive(Debug, Clone)]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub user_id: String,
    pub cart_id: Uuid,
    pub status: OrderStatus,
    pub payment_state: PaymentState,
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub shipping_cost: Decimal,
    pub total: Decimal,
    pub shipping_address: ShippingAddress,
    pub customer_notes: String,
    pub items: Vec<OrderItem>,
    /// Set once inventory has been decremented for this order; the flag is
    /// what makes reservation and its compensation idempotent.
    pub stock_reserved: bool,
    pub paid_at: Option<DateTime<Utc>>,
    pub audit_note: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentRecordStatus {
    Succeeded,
    Refunded,
}

#[derive(Debug, Clone)]
pub struct PaymentRecord {
    pub id: Uuid,
    pub order_id: Uuid,
    pub amount: Decimal,
    pub status: PaymentRecordStatus,
    pub intent_id: String,
}

#[derive(Debug, Clone)]
pub struct RefundRecord {
    pub id: Uuid,
    pub payment_id: Uuid,
    pub order_id: Uuid,
    pub amount: Decimal,
    pub description: String,
}

/// What `create_order` hands back to the saga.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderSummary {
    pub order_id: Uuid,
    pub order_number: String,
    pub total: Decimal,
    pub items_count: usize,
}

/// One reserved line, reported by `reserve_stock`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reservation {
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity_reserved: i64,
    pub remaining_stock: i64,
}

/// The transactional interface the saga steps drive.
#[async_trait]
pub trait CheckoutStore: Send + Sync {
    /// Locks the cart, refuses if empty, snapshots items at current catalog
    /// prices, and creates the pending order, in one transaction.
    async fn create_order(
        &self,
        user_id: &str,
        cart_id: Uuid,
        shipping: &ShippingAddress,
        customer_notes: &str,
    ) -> Result<OrderSummary, StoreError>;

    /// Locks each product row, checks stock, and decrements; all or
    /// nothing. A no-op when this order's deduction is already applied.
    async fn reserve_stock(&self, order_id: Uuid) -> Result<Vec<Reservation>, StoreError>;

    /// Re-increments stock by the order's recorded quantities. A no-op when
    /// nothing is reserved.
    async fn release_stock(&self, order_id: Uuid) -> Result<(), StoreError>;

    /// Records a succeeded payment and marks the order paid, in one
    /// transaction, opened only after the external capture succeeded.
    async fn record_payment(
        &self,
        order_id: Uuid,
        amount: Decimal,
        intent_id: &str,
    ) -> Result<Uuid, StoreError>;

    /// Marks the order processing and empties the cart, in one transaction.
    async fn confirm_order(&self, order_id: Uuid, cart_id: Uuid) -> Result<(), StoreError>;

    /// Marks the order cancelled with an audit note.
    async fn cancel_order(&self, order_id: Uuid, note: &str) -> Result<(), StoreError>;

    /// Records a refund against a payment and marks the payment refunded.
    async fn record_refund(
        &self,
        payment_id: Uuid,
        description: &str,
    ) -> Result<(), StoreError>;
}

#[derive(Default)]
struct Tables {
    products: HashMap<Uuid, Product>,
    carts: HashMap<Uuid, Cart>,
    orders: HashMap<Uuid, Order>,
    payments: HashMap<Uuid, PaymentRecord>,
    refunds: Vec<RefundRecord>,
}

/// In-memory store. One mutex over all tables: every trait call is a single
/// serializable transaction, which is exactly the row-lock discipline the
/// SQL store provides (and all transactions here are microseconds long).
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

fn generate_order_number(rng: &mut impl Rng) -> String {
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
    (0..12)
        .map(|_| CHARSET[rng.random_range(0..CHARSET.len())] as char)
        .collect()
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    // Seeding and inspection, used by server wiring and tests.

    pub fn insert_product(&self, product: Product) {
        let mut t = self.tables.lock().unwrap_or_else(|e| e.into_inner());
        t.products.insert(product.id, product);
    }

    pub fn insert_cart(&self, user_id: &str, items: Vec<CartItem>) -> Uuid {
        let mut t = self.tables.lock().unwrap_or_else(|e| e.into_inner());
        let id = Uuid::new_v4();
        t.carts.insert(
            id,
            Cart {
                id,
                user_id: user_id.to_string(),
                items,
            },
        );
        id
    }

    pub fn product_stock(&self, product_id: Uuid) -> Option<i64> {
        let t = self.tables.lock().unwrap_or_else(|e| e.into_inner());
        t.products.get(&product_id).map(|p| p.stock_quantity)
    }

    pub fn cart_item_count(&self, cart_id: Uuid) -> Option<usize> {
        let t = self.tables.lock().unwrap_or_else(|e| e.into_inner());
        t.carts.get(&cart_id).map(|c| c.items.len())
    }

    pub fn order(&self, order_id: Uuid) -> Option<Order> {
        let t = self.tables.lock().unwrap_or_else(|e| e.into_inner());
        t.orders.get(&order_id).cloned()
    }

    pub fn payments_for(&self, order_id: Uuid) -> Vec<PaymentRecord> {
        let t = self.tables.lock().unwrap_or_else(|e| e.into_inner());
        t.payments
            .values()
            .filter(|p| p.order_id == order_id)
            .cloned()
            .collect()
    }

    pub fn refunds_for(&self, order_id: Uuid) -> Vec<RefundRecord> {
        let t = self.tables.lock().unwrap_or_else(|e| e.into_inner());
        t.refunds
            .iter()
            .filter(|r| r.order_id == order_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl CheckoutStore for MemoryStore {
    async fn create_order(
        &self,
        user_id: &str,
        cart_id: Uuid,
        shipping: &ShippingAddress,
        customer_notes: &str,
    ) -> Result<OrderSummary, StoreError> {
        let mut t = self.tables.lock().unwrap_or_else(|e| e.into_inner());

        let cart = t.carts.get(&cart_id).cloned().ok_or(StoreError::NotFound {
            entity: "cart",
            id: cart_id,
        })?;
        if cart.items.is_empty() {
            return Err(StoreError::EmptyCart);
        }

        let mut subtotal = Decimal::ZERO;
        let mut items = Vec::with_capacity(cart.items.len());
        for cart_item in &cart.items {
            let product =
                t.products
                    .get(&cart_item.product_id)
                    .ok_or(StoreError::NotFound {
                        entity: "product",
                        id: cart_item.product_id,
                    })?;
            let line_total = product.price * Decimal::from(cart_item.quantity);
            subtotal += line_total;
            items.push(OrderItem {
                product_id: product.id,
                product_name: product.name.clone(),
                sku: product.sku.clone(),
                variant_name: cart_item.variant_name.clone(),
                quantity: cart_item.quantity,
                unit_price: product.price,
                total_price: line_total,
            });
        }

        let totals = money::totals(subtotal);
        let id = Uuid::new_v4();
        let order_number = generate_order_number(&mut rand::rng());
        let items_count = items.len();

        t.orders.insert(
            id,
            Order {
                id,
                order_number: order_number.clone(),
                user_id: user_id.to_string(),
                cart_id,
                status: OrderStatus::Pending,
                payment_state: PaymentState::Pending,
                subtotal: totals.subtotal,
                tax: totals.tax,
                shipping_cost: totals.shipping,
                total: totals.total,
                shipping_address: shipping.clone(),
                customer_notes: customer_notes.to_string(),
                items,
                stock_reserved: false,
                paid_at: None,
                audit_note: None,
            },
        );

        Ok(OrderSummary {
            order_id: id,
            order_number,
            total: totals.total,
            items_count,
        })
    }

    async fn reserve_stock(&self, order_id: Uuid) -> Result<Vec<Reservation>, StoreError> {
        let mut t = self.tables.lock().unwrap_or_else(|e| e.into_inner());

        let order = t.orders.get(&order_id).cloned().ok_or(StoreError::NotFound {
            entity: "order",
            id: order_id,
        })?;

        // Already applied for this order: the retried step is a no-op.
        if order.stock_reserved {
            return Ok(Vec::new());
        }

        // Validate every line before touching any stock so a failure leaves
        // no partial reservation behind.
        for item in &order.items {
            let product = t.products.get(&item.product_id).ok_or(StoreError::NotFound {
                entity: "product",
                id: item.product_id,
            })?;
            if product.track_inventory && product.stock_quantity < item.quantity {
                return Err(StoreError::InsufficientStock {
                    product: product.name.clone(),
                    available: product.stock_quantity,
                    required: item.quantity,
                });
            }
        }

        let mut reservations = Vec::new();
        for item in &order.items {
            let Some(product) = t.products.get_mut(&item.product_id) else {
                continue;
            };
            if product.track_inventory {
                product.stock_quantity -= item.quantity;
                reservations.push(Reservation {
                    product_id: product.id,
                    product_name: product.name.clone(),
                    quantity_reserved: item.quantity,
                    remaining_stock: product.stock_quantity,
                });
            }
        }

        if let Some(order) = t.orders.get_mut(&order_id) {
            order.stock_reserved = true;
        }

        Ok(reservations)
    }

    async fn release_stock(&self, order_id: Uuid) -> Result<(), StoreError> {
        let mut t = self.tables.lock().unwrap_or_else(|e| e.into_inner());

        let order = t.orders.get(&order_id).cloned().ok_or(StoreError::NotFound {
            entity: "order",
            id: order_id,
        })?;
        if !order.stock_reserved {
            return Ok(());
        }

        for item in &order.items {
            if let Some(product) = t.products.get_mut(&item.product_id) {
                if product.track_inventory {
                    product.stock_quantity += item.quantity;
                }
            }
        }

        if let Some(order) = t.orders.get_mut(&order_id) {
            order.stock_reserved = false;
        }

        Ok(())
    }

    async fn record_payment(
        &self,
        order_id: Uuid,
        amount: Decimal,
        intent_id: &str,
    ) -> Result<Uuid, StoreError> {
        let mut t = self.tables.lock().unwrap_or_else(|e| e.into_inner());

        let order = t.orders.get_mut(&order_id).ok_or(StoreError::NotFound {
            entity: "order",
            id: order_id,
        })?;
        order.payment_state = PaymentState::Paid;
        order.paid_at = Some(Utc::now());

        let id = Uuid::new_v4();
        t.payments.insert(
            id,
            PaymentRecord {
                id,
                order_id,
                amount,
                status: PaymentRecordStatus::Succeeded,
                intent_id: intent_id.to_string(),
            },
        );
        Ok(id)
    }

    async fn confirm_order(&self, order_id: Uuid, cart_id: Uuid) -> Result<(), StoreError> {
        let mut t = self.tables.lock().unwrap_or_else(|e| e.into_inner());

        let order = t.orders.get_mut(&order_id).ok_or(StoreError::NotFound {
            entity: "order",
            id: order_id,
        })?;
        order.status = OrderStatus::Processing;

        if let Some(cart) = t.carts.get_mut(&cart_id) {
            cart.items.clear();
        }
        Ok(())
    }

    async fn cancel_order(&self, order_id: Uuid, note: &str) -> Result<(), StoreError> {
        let mut t = self.tables.lock().unwrap_or_else(|e| e.into_inner());

        let order = t.orders.get_mut(&order_id).ok_or(StoreError::NotFound {
            entity: "order",
            id: order_id,
        })?;
        order.status = OrderStatus::Cancelled;
        order.audit_note = Some(note.to_string());
        Ok(())
    }

    async fn record_refund(
        &self,
        payment_id: Uuid,
        description: &str,
    ) -> Result<(), StoreError> {
        let mut t = self.tables.lock().unwrap_or_else(|e| e.into_inner());

        let payment = t.payments.get_mut(&payment_id).ok_or(StoreError::NotFound {
            entity: "payment",
            id: payment_id,
        })?;
        payment.status = PaymentRecordStatus::Refunded;
        let (order_id, amount) = (payment.order_id, payment.amount);

        t.refunds.push(RefundRecord {
            id: Uuid::new_v4(),
            payment_id,
            order_id,
            amount,
            description: description.to_string(),
        });
        Ok(())
    }
}
