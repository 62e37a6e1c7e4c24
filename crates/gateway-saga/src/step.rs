use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use serde_json::Value;

use crate::context::SagaContext;
use crate::error::StepError;

/// Forward action of a step: receives a snapshot of the context (initial
/// data plus earlier results) and the shared environment, returns the value
/// to store under the step's name.
pub type StepAction<S> = Arc<
    dyn Fn(SagaContext, Arc<S>) -> BoxFuture<'static, Result<Value, StepError>> + Send + Sync,
>;

/// Compensation of a step: best-effort undo, invoked in reverse completion
/// order when a later step fails.
pub type StepCompensation<S> =
    Arc<dyn Fn(SagaContext, Arc<S>) -> BoxFuture<'static, Result<(), StepError>> + Send + Sync>;

/// Immutable definition of one saga step.
pub struct SagaStep<S> {
    pub(crate) name: String,
    pub(crate) action: StepAction<S>,
    pub(crate) compensation: Option<StepCompensation<S>>,
    pub(crate) timeout: Duration,
    pub(crate) max_retries: usize,
    pub(crate) idempotent: bool,
}

impl<S> SagaStep<S> {
    /// Creates a step with defaults: 30 s timeout, no retries, idempotent.
    pub fn new<F>(name: impl Into<String>, action: F) -> Self
    where
        F: Fn(SagaContext, Arc<S>) -> BoxFuture<'static, Result<Value, StepError>>
            + Send
            + Sync
            + 'static,
    {
        Self {
            name: name.into(),
            action: Arc::new(action),
            compensation: None,
            timeout: Duration::from_secs(30),
            max_retries: 0,
            idempotent: true,
        }
    }

    pub fn compensate<F>(mut self, compensation: F) -> Self
    where
        F: Fn(SagaContext, Arc<S>) -> BoxFuture<'static, Result<(), StepError>>
            + Send
            + Sync
            + 'static,
    {
        self.compensation = Some(Arc::new(compensation));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Retries beyond the first attempt. Only honored for idempotent steps;
    /// a non-idempotent step always runs exactly once.
    pub fn max_retries(mut self, retries: usize) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn idempotent(mut self, idempotent: bool) -> Self {
        self.idempotent = idempotent;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}
