//! Revocation set for logged-out tokens.
//!
//! An entry lives exactly as long as the token it shadows; after that the
//! token is expired anyway and the entry is garbage.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::error::StoreError;

/// Keyed store of revoked-token entries with per-entry TTL.
pub trait RevocationStore: Send + Sync {
    fn revoke(&self, key: &str, ttl: Duration) -> Result<(), StoreError>;
    fn is_revoked(&self, key: &str) -> Result<bool, StoreError>;
}

/// In-process revocation set; the stand-in for the shared keyed store a
/// multi-instance deployment would use.
#[derive(Default)]
pub struct MemoryRevocationStore {
    entries: Mutex<HashMap<String, Instant>>,
}

impl MemoryRevocationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RevocationStore for MemoryRevocationStore {
    fn revoke(&self, key: &str, ttl: Duration) -> Result<(), StoreError> {
        if ttl.is_zero() {
            return Ok(());
        }
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();
        entries.retain(|_, expires| *expires > now);
        entries.insert(key.to_string(), now + ttl);
        Ok(())
    }

    fn is_revoked(&self, key: &str) -> Result<bool, StoreError> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        Ok(matches!(entries.get(key), Some(expires) if *expires > Instant::now()))
    }
}
