use std::collections::HashMap;
use std::time::Instant;

use serde::de::DeserializeOwned;
use serde_json::Value;
use uuid::Uuid;

/// Lifecycle of one saga execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[derive(serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SagaStatus {
    Pending,
    Running,
    Compensating,
    Completed,
    Failed,
}

impl SagaStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, SagaStatus::Completed | SagaStatus::Failed)
    }
}

/// Mutable per-execution record threaded through every step.
///
/// Steps read `initial_data` and the results of earlier steps, and return a
/// value the engine stores under the step's name; the payment step finds
/// the order id where the create-order step left it. Each step invocation
/// receives its own clone, so a step observes the context as of its start.
#[derive(Debug, Clone)]
pub struct SagaContext {
    pub saga_id: Uuid,
    pub initial_data: Value,
    results: HashMap<String, Value>,
    completed_steps: Vec<String>,
    pub status: SagaStatus,
    pub started_at: Option<Instant>,
    pub ended_at: Option<Instant>,
    pub failed_step: Option<String>,
}

impl SagaContext {
    pub fn new(initial_data: Value) -> Self {
        Self {
            saga_id: Uuid::new_v4(),
            initial_data,
            results: HashMap::new(),
            completed_steps: Vec::new(),
            status: SagaStatus::Pending,
            started_at: None,
            ended_at: None,
            failed_step: None,
        }
    }

    /// Reads a field of the initial data, deserialized to `T`.
    pub fn input<T: DeserializeOwned>(&self, field: &str) -> Option<T> {
        self.initial_data
            .get(field)
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok())
    }

    /// Raw result of a completed step.
    pub fn result(&self, step_name: &str) -> Option<&Value> {
        self.results.get(step_name)
    }

    /// Result of a completed step, deserialized to `T`.
    pub fn result_as<T: DeserializeOwned>(&self, step_name: &str) -> Option<T> {
        self.results
            .get(step_name)
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok())
    }

    pub(crate) fn record_completion(&mut self, step_name: &str, value: Value) {
        self.results.insert(step_name.to_string(), value);
        self.completed_steps.push(step_name.to_string());
    }

    /// Names of completed steps, in completion order.
    pub fn completed_steps(&self) -> &[String] {
        &self.completed_steps
    }
}
