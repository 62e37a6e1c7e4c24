//! Saga engine: ordered forward steps, reverse-order compensation.
//!
//! A saga is a linear sequence of steps spanning resources that cannot share
//! one atomic commit. The engine runs the steps in order; on the first
//! failure it walks the completed steps backwards and invokes each step's
//! compensation, best-effort. A compensation that itself fails is logged and
//! counted but never stops the remaining compensations; the saga undoes as
//! much as it can.
//!
//! Each step carries its own timeout and retry budget, independent of the
//! HTTP-level retries underneath: saga retries happen at business-operation
//! granularity. Only steps marked idempotent are retried; a non-idempotent
//! step runs exactly once. Between attempts the engine sleeps with an
//! exponential backoff capped at a few seconds.
//!
//! ```
//! use std::sync::Arc;
//! use gateway_saga::{Saga, SagaStep};
//! use serde_json::json;
//!
//! # async fn example() {
//! let saga: Saga<()> = Saga::new("demo").step(SagaStep::new("hello", |ctx, _state| {
//!     Box::pin(async move { Ok(json!({"who": ctx.input::<String>("name")})) })
//! }));
//! let report = saga.execute(Arc::new(()), json!({"name": "world"})).await;
//! assert!(report.status.is_terminal());
//! # }
//! ```

mod context;
mod error;
mod registry;
mod step;

pub use context::{SagaContext, SagaStatus};
pub use error::{StepError, StepErrorKind};
pub use registry::{SagaRegistry, SagaStatusView};
pub use step::{SagaStep, StepAction, StepCompensation};

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;

/// Cap on the sleep between saga-step retries.
const STEP_BACKOFF_CAP: Duration = Duration::from_secs(5);

/// Final report of one saga execution.
#[derive(Debug)]
pub struct SagaReport {
    pub status: SagaStatus,
    pub failed_step: Option<String>,
    pub error: Option<StepError>,
    pub duration: Duration,
    /// Final context, including every stored step result.
    pub context: SagaContext,
}

impl SagaReport {
    pub fn saga_id(&self) -> uuid::Uuid {
        self.context.saga_id
    }
}

/// An ordered list of steps sharing an environment `S` (store handles,
/// downstream clients).
pub struct Saga<S> {
    name: String,
    steps: Vec<SagaStep<S>>,
    registry: Option<Arc<SagaRegistry>>,
}

impl<S: Send + Sync + 'static> Saga<S> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
            registry: None,
        }
    }

    /// Appends a step; execution order is definition order.
    pub fn step(mut self, step: SagaStep<S>) -> Self {
        self.steps.push(step);
        self
    }

    /// Publishes live status into `registry` while executing.
    pub fn with_registry(mut self, registry: Arc<SagaRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    fn publish(&self, ctx: &SagaContext) {
        if let Some(registry) = &self.registry {
            registry.update(SagaStatusView {
                saga_id: ctx.saga_id,
                status: ctx.status,
                total_steps: self.steps.len(),
                completed_steps: ctx.completed_steps().len(),
                failed_step: ctx.failed_step.clone(),
            });
        }
    }

    /// Runs the saga to a terminal state.
    pub async fn execute(&self, state: Arc<S>, initial_data: Value) -> SagaReport {
        let mut ctx = SagaContext::new(initial_data);
        let started = Instant::now();
        ctx.status = SagaStatus::Running;
        ctx.started_at = Some(started);
        self.publish(&ctx);

        tracing::info!(
            saga = %self.name,
            saga_id = %ctx.saga_id,
            steps = self.steps.len(),
            "starting saga"
        );

        let mut failure: Option<StepError> = None;

        for step in &self.steps {
            match self.execute_step(step, &ctx, &state).await {
                Ok(value) => {
                    ctx.record_completion(&step.name, value);
                    self.publish(&ctx);
                    tracing::info!(
                        saga_id = %ctx.saga_id,
                        step = %step.name,
                        "step completed"
                    );
                }
                Err(error) => {
                    tracing::error!(
                        saga_id = %ctx.saga_id,
                        step = %step.name,
                        error = %error,
                        "step failed"
                    );
                    ctx.failed_step = Some(step.name.clone());
                    failure = Some(error);
                    break;
                }
            }
        }

        let status = if failure.is_none() {
            SagaStatus::Completed
        } else {
            ctx.status = SagaStatus::Compensating;
            self.publish(&ctx);
            self.compensate(&ctx, &state).await;
            SagaStatus::Failed
        };

        ctx.status = status;
        ctx.ended_at = Some(Instant::now());
        self.publish(&ctx);

        let duration = started.elapsed();

        #[cfg(feature = "metrics")]
        metrics::counter!(
            "saga_executions_total",
            "outcome" => match status {
                SagaStatus::Completed => "completed",
                _ => "failed",
            }
        )
        .increment(1);

        match status {
            SagaStatus::Completed => tracing::info!(
                saga_id = %ctx.saga_id,
                duration_ms = duration.as_millis() as u64,
                "saga completed"
            ),
            _ => tracing::error!(
                saga_id = %ctx.saga_id,
                failed_step = ctx.failed_step.as_deref().unwrap_or(""),
                "saga failed"
            ),
        }

        SagaReport {
            status,
            failed_step: ctx.failed_step.clone(),
            error: failure,
            duration,
            context: ctx,
        }
    }

    async fn execute_step(
        &self,
        step: &SagaStep<S>,
        ctx: &SagaContext,
        state: &Arc<S>,
    ) -> Result<Value, StepError> {
        let attempts = if step.idempotent {
            step.max_retries + 1
        } else {
            1
        };

        let started = Instant::now();
        let mut last_error = StepError::infrastructure("step did not run");

        for attempt in 0..attempts {
            tracing::debug!(
                saga_id = %ctx.saga_id,
                step = %step.name,
                attempt = attempt + 1,
                attempts,
                "executing step"
            );

            let fut = (step.action)(ctx.clone(), Arc::clone(state));
            let outcome = tokio::time::timeout(step.timeout, fut).await;

            let error = match outcome {
                Ok(Ok(value)) => {
                    self.record_step_metric(step, "success", started);
                    return Ok(value);
                }
                Ok(Err(error)) if error.is_business() => {
                    // A domain reject will not change on retry.
                    self.record_step_metric(step, "rejected", started);
                    return Err(error);
                }
                Ok(Err(error)) => error,
                Err(_) => StepError::infrastructure(format!(
                    "step '{}' timed out after {:?}",
                    step.name, step.timeout
                )),
            };

            tracing::warn!(
                saga_id = %ctx.saga_id,
                step = %step.name,
                attempt = attempt + 1,
                error = %error,
                "step attempt failed"
            );
            last_error = error;

            if attempt + 1 < attempts {
                let backoff = Duration::from_secs(1u64 << attempt.min(8)).min(STEP_BACKOFF_CAP);
                tokio::time::sleep(backoff).await;
            }
        }

        self.record_step_metric(step, "failed", started);
        Err(last_error)
    }

    async fn compensate(&self, ctx: &SagaContext, state: &Arc<S>) {
        tracing::warn!(
            saga_id = %ctx.saga_id,
            completed = ctx.completed_steps().len(),
            "starting compensation"
        );

        for step_name in ctx.completed_steps().iter().rev() {
            let Some(step) = self.steps.iter().find(|s| &s.name == step_name) else {
                continue;
            };
            let Some(compensation) = &step.compensation else {
                tracing::debug!(
                    saga_id = %ctx.saga_id,
                    step = %step_name,
                    "no compensation defined"
                );
                continue;
            };

            let fut = compensation(ctx.clone(), Arc::clone(state));
            let outcome = tokio::time::timeout(step.timeout, fut).await;

            let result_label = match outcome {
                Ok(Ok(())) => {
                    tracing::info!(
                        saga_id = %ctx.saga_id,
                        step = %step_name,
                        "compensated step"
                    );
                    "success"
                }
                Ok(Err(error)) => {
                    // Best effort only: log for the reconciliation queue and
                    // keep undoing earlier steps.
                    tracing::error!(
                        saga_id = %ctx.saga_id,
                        step = %step_name,
                        error = %error,
                        "compensation failed"
                    );
                    "failed"
                }
                Err(_) => {
                    tracing::error!(
                        saga_id = %ctx.saga_id,
                        step = %step_name,
                        "compensation timed out"
                    );
                    "failed"
                }
            };

            #[cfg(feature = "metrics")]
            metrics::counter!(
                "saga_compensations_total",
                "step" => step.name.clone(),
                "outcome" => result_label,
            )
            .increment(1);
            #[cfg(not(feature = "metrics"))]
            let _ = result_label;
        }
    }

    fn record_step_metric(&self, step: &SagaStep<S>, outcome: &'static str, started: Instant) {
        #[cfg(feature = "metrics")]
        metrics::histogram!(
            "saga_step_duration_seconds",
            "step" => step.name.clone(),
            "outcome" => outcome,
        )
        .record(started.elapsed().as_secs_f64());
        #[cfg(not(feature = "metrics"))]
        let _ = (step, outcome, started);
    }
}
