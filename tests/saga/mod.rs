//! Saga suites.
//!
//! - ordering.rs: forward order, reverse compensation, no progress after
//!   failure
//! - stock_identity.rs: reservation followed by its compensation is a stock
//!   no-op

mod ordering;
mod stock_identity;
