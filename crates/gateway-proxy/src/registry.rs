use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use gateway_circuitbreaker::{BreakerRegistry, BreakerSettings};

use crate::config::ProxyTarget;
use crate::error::ProxyError;
use crate::ResilientProxy;

/// Process-wide cache of one [`ResilientProxy`] per downstream.
///
/// Proxies are created on first use and live for the rest of the process, so
/// each downstream keeps a single breaker and a single connection pool. The
/// breaker registry is shared with the admin surface.
pub struct ProxyRegistry {
    breakers: Arc<BreakerRegistry>,
    proxies: RwLock<HashMap<String, Arc<ResilientProxy>>>,
}

impl ProxyRegistry {
    pub fn new(breakers: Arc<BreakerRegistry>) -> Self {
        Self {
            breakers,
            proxies: RwLock::new(HashMap::new()),
        }
    }

    /// The shared breaker registry backing this proxy cache.
    pub fn breakers(&self) -> &Arc<BreakerRegistry> {
        &self.breakers
    }

    /// Returns the proxy for `target.service_name`, building the full stack
    /// on first use.
    pub fn proxy(&self, target: &ProxyTarget) -> Result<Arc<ResilientProxy>, ProxyError> {
        if let Some(proxy) = self
            .proxies
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&target.service_name)
        {
            return Ok(Arc::clone(proxy));
        }

        let core = self.breakers.core(&target.service_name, || {
            BreakerSettings::builder()
                .name(target.service_name.clone())
                .failure_threshold(target.config.failure_threshold)
                .success_threshold(target.config.success_threshold)
                .window_size(target.config.window_size)
                .open_timeout(target.config.open_timeout)
                .build()
        });

        let mut proxies = self.proxies.write().unwrap_or_else(|e| e.into_inner());
        if let Some(proxy) = proxies.get(&target.service_name) {
            return Ok(Arc::clone(proxy));
        }

        let proxy = Arc::new(ResilientProxy::new(target.clone(), core)?);
        proxies.insert(target.service_name.clone(), Arc::clone(&proxy));
        Ok(proxy)
    }
}
