use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::circuit::CircuitSnapshot;
use crate::config::BreakerSettings;
use crate::BreakerCore;

/// Process-wide registry of breaker cores, keyed by downstream service name.
///
/// Lookups dominate writes (a core is created once per service per process),
/// so a read-write lock guards the map. The cores themselves serialize their
/// own state; the registry lock is never held across I/O.
#[derive(Default)]
pub struct BreakerRegistry {
    cores: RwLock<HashMap<String, Arc<BreakerCore>>>,
}

impl BreakerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the core for `name`, creating it from `settings` on first use.
    pub fn core(&self, name: &str, settings: impl FnOnce() -> BreakerSettings) -> Arc<BreakerCore> {
        if let Some(core) = self.cores.read().unwrap_or_else(|e| e.into_inner()).get(name) {
            return Arc::clone(core);
        }

        let mut cores = self.cores.write().unwrap_or_else(|e| e.into_inner());
        Arc::clone(
            cores
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(BreakerCore::new(settings()))),
        )
    }

    /// Looks up an existing core without creating one.
    pub fn get(&self, name: &str) -> Option<Arc<BreakerCore>> {
        self.cores
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .cloned()
    }

    /// Snapshots every registered breaker, sorted by service name.
    pub async fn snapshots(&self) -> Vec<CircuitSnapshot> {
        let cores: Vec<Arc<BreakerCore>> = {
            let map = self.cores.read().unwrap_or_else(|e| e.into_inner());
            map.values().cloned().collect()
        };

        let mut snapshots = Vec::with_capacity(cores.len());
        for core in cores {
            snapshots.push(core.snapshot().await);
        }
        snapshots.sort_by(|a, b| a.service.cmp(&b.service));
        snapshots
    }

    /// Resets the named breaker. Returns false if no such breaker exists.
    pub async fn reset(&self, name: &str) -> bool {
        match self.get(name) {
            Some(core) => {
                core.reset().await;
                true
            }
            None => false,
        }
    }
}
