use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use uuid::Uuid;

use crate::context::SagaStatus;

/// Observable status of one saga, updated as it runs.
#[derive(Debug, Clone)]
#[derive(serde::Serialize)]
pub struct SagaStatusView {
    pub saga_id: Uuid,
    pub status: SagaStatus,
    pub total_steps: usize,
    pub completed_steps: usize,
    pub failed_step: Option<String>,
}

struct Entry {
    view: SagaStatusView,
    terminal_at: Option<Instant>,
}

/// In-process registry of saga executions.
///
/// Running sagas are always visible; terminal ones stay queryable for a
/// short retention window and are then purged lazily on the next write or
/// lookup.
pub struct SagaRegistry {
    sagas: RwLock<HashMap<Uuid, Entry>>,
    retention: Duration,
}

impl SagaRegistry {
    pub fn new(retention: Duration) -> Self {
        Self {
            sagas: RwLock::new(HashMap::new()),
            retention,
        }
    }

    fn purge(&self, sagas: &mut HashMap<Uuid, Entry>) {
        let retention = self.retention;
        sagas.retain(|_, entry| match entry.terminal_at {
            Some(at) => at.elapsed() < retention,
            None => true,
        });
    }

    /// Inserts or refreshes a saga's status view.
    pub fn update(&self, view: SagaStatusView) {
        let mut sagas = self.sagas.write().unwrap_or_else(|e| e.into_inner());
        self.purge(&mut sagas);
        let terminal_at = view.status.is_terminal().then(Instant::now);
        sagas.insert(
            view.saga_id,
            Entry { view, terminal_at },
        );
    }

    /// Looks up one saga, if still retained.
    pub fn get(&self, saga_id: Uuid) -> Option<SagaStatusView> {
        let sagas = self.sagas.read().unwrap_or_else(|e| e.into_inner());
        sagas.get(&saga_id).and_then(|entry| {
            match entry.terminal_at {
                Some(at) if at.elapsed() >= self.retention => None,
                _ => Some(entry.view.clone()),
            }
        })
    }

    /// All retained sagas.
    pub fn all(&self) -> Vec<SagaStatusView> {
        let mut sagas = self.sagas.write().unwrap_or_else(|e| e.into_inner());
        self.purge(&mut sagas);
        sagas.values().map(|entry| entry.view.clone()).collect()
    }
}

impl Default for SagaRegistry {
    fn default() -> Self {
        Self::new(Duration::from_secs(300))
    }
}
