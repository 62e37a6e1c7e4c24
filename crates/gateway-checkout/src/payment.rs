//! Payment gateway interface and the keyed mock used in tests.
//!
//! The real gateway is a third party reached over HTTPS. What the saga
//! relies on is the contract: captures and refunds are idempotent by key, so
//! a retried capture lands at most one charge.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use gateway_core::IdempotencyKey;
use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Error)]
pub enum PaymentError {
    /// The card was declined; retrying will not help.
    #[error("payment failed: {0}")]
    CardDeclined(String),
    /// The gateway could not be reached or answered abnormally.
    #[error("payment gateway unavailable: {0}")]
    Unavailable(String),
}

impl PaymentError {
    pub fn is_declined(&self) -> bool {
        matches!(self, PaymentError::CardDeclined(_))
    }
}

/// Successful capture.
#[derive(Debug, Clone)]
pub struct CaptureReceipt {
    /// The gateway's payment-intent id, stored on the payment row.
    pub intent_id: String,
}

/// The external payment processor, idempotent by key.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn capture(
        &self,
        key: &IdempotencyKey,
        order_id: Uuid,
        amount: Decimal,
        payment_method: &str,
    ) -> Result<CaptureReceipt, PaymentError>;

    async fn refund(
        &self,
        key: &IdempotencyKey,
        intent_id: &str,
        amount: Decimal,
    ) -> Result<(), PaymentError>;
}

/// In-process gateway with a keyed capture ledger.
///
/// Repeated captures under one idempotency key return the original receipt
/// without charging again, which is what the at-most-one-capture tests
/// assert against. Failure injection covers declines and transient outages.
#[derive(Default)]
pub struct MockPaymentGateway {
    captures: Mutex<HashMap<String, CaptureReceipt>>,
    refunds: Mutex<HashMap<String, String>>,
    decline_cards: AtomicBool,
    fail_captures_remaining: AtomicUsize,
    fail_refunds: AtomicBool,
    capture_attempts: AtomicUsize,
}

impl MockPaymentGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every capture from now on is declined.
    pub fn decline_cards(&self, decline: bool) {
        self.decline_cards.store(decline, Ordering::SeqCst);
    }

    /// The next `n` captures fail as transient outages.
    pub fn fail_next_captures(&self, n: usize) {
        self.fail_captures_remaining.store(n, Ordering::SeqCst);
    }

    /// Refunds fail from now on.
    pub fn fail_refunds(&self, fail: bool) {
        self.fail_refunds.store(fail, Ordering::SeqCst);
    }

    /// Number of capture calls, successful or not.
    pub fn capture_attempts(&self) -> usize {
        self.capture_attempts.load(Ordering::SeqCst)
    }

    /// Number of distinct charges actually placed.
    pub fn captured_charge_count(&self) -> usize {
        self.captures.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Number of refunds recorded.
    pub fn refund_count(&self) -> usize {
        self.refunds.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[async_trait]
impl PaymentGateway for MockPaymentGateway {
    async fn capture(
        &self,
        key: &IdempotencyKey,
        _order_id: Uuid,
        _amount: Decimal,
        _payment_method: &str,
    ) -> Result<CaptureReceipt, PaymentError> {
        self.capture_attempts.fetch_add(1, Ordering::SeqCst);

        if self
            .fail_captures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(PaymentError::Unavailable("gateway timeout".into()));
        }

        if self.decline_cards.load(Ordering::SeqCst) {
            return Err(PaymentError::CardDeclined("card was declined".into()));
        }

        let mut captures = self.captures.lock().unwrap_or_else(|e| e.into_inner());
        // Same key, same charge: the receiver coalesces retries.
        let receipt = captures
            .entry(key.as_str().to_string())
            .or_insert_with(|| CaptureReceipt {
                intent_id: format!("pi_{}", Uuid::new_v4().simple()),
            });
        Ok(receipt.clone())
    }

    async fn refund(
        &self,
        key: &IdempotencyKey,
        intent_id: &str,
        _amount: Decimal,
    ) -> Result<(), PaymentError> {
        if self.fail_refunds.load(Ordering::SeqCst) {
            return Err(PaymentError::Unavailable("refund endpoint down".into()));
        }
        let mut refunds = self.refunds.lock().unwrap_or_else(|e| e.into_inner());
        refunds
            .entry(key.as_str().to_string())
            .or_insert_with(|| intent_id.to_string());
        Ok(())
    }
}
