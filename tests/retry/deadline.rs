use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use gateway_retry::RetryLayer;
use tower::{service_fn, Layer, Service};

#[derive(Debug, Clone)]
struct Failure;

#[derive(Clone)]
struct DeadlineReq {
    deadline: Instant,
}

fn always_failing(
    calls: Arc<AtomicUsize>,
) -> impl Service<
    DeadlineReq,
    Response = (),
    Error = Failure,
    Future = impl std::future::Future<Output = Result<(), Failure>> + Send,
> + Clone {
    service_fn(move |_req: DeadlineReq| {
        let calls = Arc::clone(&calls);
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(Failure)
        }
    })
}

/// No retry sleep is scheduled that would start an attempt after the
/// deadline: a tight deadline collapses the budget to one attempt.
#[tokio::test]
async fn tight_deadline_prevents_retry_sleeps() {
    let calls = Arc::new(AtomicUsize::new(0));
    let layer = RetryLayer::<DeadlineReq, Failure>::builder()
        .max_attempts(5)
        .fixed_backoff(Duration::from_millis(100))
        .deadline_fn(|req: &DeadlineReq| Some(req.deadline))
        .build();
    let mut svc = layer.layer(always_failing(Arc::clone(&calls)));

    let req = DeadlineReq {
        deadline: Instant::now() + Duration::from_millis(20),
    };
    assert!(svc.call(req).await.is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

/// A roomy deadline leaves the budget intact.
#[tokio::test]
async fn roomy_deadline_allows_full_budget() {
    let calls = Arc::new(AtomicUsize::new(0));
    let layer = RetryLayer::<DeadlineReq, Failure>::builder()
        .max_attempts(3)
        .fixed_backoff(Duration::from_millis(5))
        .deadline_fn(|req: &DeadlineReq| Some(req.deadline))
        .build();
    let mut svc = layer.layer(always_failing(Arc::clone(&calls)));

    let req = DeadlineReq {
        deadline: Instant::now() + Duration::from_secs(60),
    };
    assert!(svc.call(req).await.is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

/// The whole schedule respects the deadline: attempts stop as soon as the
/// next sleep would cross it.
#[tokio::test]
async fn deadline_cuts_schedule_mid_budget() {
    let calls = Arc::new(AtomicUsize::new(0));
    let layer = RetryLayer::<DeadlineReq, Failure>::builder()
        .max_attempts(10)
        .fixed_backoff(Duration::from_millis(30))
        .deadline_fn(|req: &DeadlineReq| Some(req.deadline))
        .build();
    let mut svc = layer.layer(always_failing(Arc::clone(&calls)));

    let deadline = Instant::now() + Duration::from_millis(100);
    let req = DeadlineReq { deadline };
    assert!(svc.call(req).await.is_err());

    // Roughly 100ms / 30ms sleeps: well under the 10-attempt budget, and
    // every attempt started before the deadline.
    let attempts = calls.load(Ordering::SeqCst);
    assert!(attempts < 10, "deadline did not trim attempts: {attempts}");
    assert!(Instant::now() >= deadline - Duration::from_millis(40));
}
