use std::sync::{Arc, Mutex};
use std::time::Duration;

use gateway_saga::{Saga, SagaStatus, SagaStep, StepError};
use serde_json::json;

type Log = Arc<Mutex<Vec<String>>>;

fn logged_step(name: &'static str, log: Log, fail: bool) -> SagaStep<()> {
    let action_log = Arc::clone(&log);
    SagaStep::new(name, move |_ctx, _state: Arc<()>| {
        let log = Arc::clone(&action_log);
        Box::pin(async move {
            log.lock().unwrap().push(name.to_string());
            if fail {
                Err(StepError::infrastructure("boom"))
            } else {
                Ok(json!({}))
            }
        })
    })
    .compensate(move |_ctx, _state: Arc<()>| {
        let log = Arc::clone(&log);
        Box::pin(async move {
            log.lock().unwrap().push(format!("undo_{name}"));
            Ok(())
        })
    })
    .timeout(Duration::from_secs(1))
}

/// For steps [a, b, c] where c fails before completing, compensations run
/// [b, a] (c never completed, so its compensation is skipped) and no
/// forward work happens after the failure.
#[tokio::test]
async fn failing_last_step_compensates_completed_prefix_in_reverse() {
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let saga = Saga::new("order-test")
        .step(logged_step("a", Arc::clone(&log), false))
        .step(logged_step("b", Arc::clone(&log), false))
        .step(logged_step("c", Arc::clone(&log), true))
        .step(logged_step("d", Arc::clone(&log), false));

    let report = saga.execute(Arc::new(()), json!({})).await;

    assert_eq!(report.status, SagaStatus::Failed);
    assert_eq!(report.failed_step.as_deref(), Some("c"));
    assert_eq!(
        *log.lock().unwrap(),
        vec!["a", "b", "c", "undo_b", "undo_a"]
    );
}

/// A mid-list failure leaves later steps untouched entirely.
#[tokio::test]
async fn steps_after_failure_never_run() {
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let saga = Saga::new("order-test")
        .step(logged_step("a", Arc::clone(&log), true))
        .step(logged_step("b", Arc::clone(&log), false));

    let report = saga.execute(Arc::new(()), json!({})).await;

    assert_eq!(report.status, SagaStatus::Failed);
    assert_eq!(*log.lock().unwrap(), vec!["a"]);
    assert!(report.context.completed_steps().is_empty());
}
