//! Circuit breaker suites.
//!
//! - transitions.rs: closed/open threshold behavior
//! - half_open.rs: recovery probing
//! - isolation.rs: independence between breakers
//! - reset.rs: operator overrides

mod half_open;
mod isolation;
