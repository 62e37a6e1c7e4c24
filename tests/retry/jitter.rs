use std::time::Duration;

use gateway_retry::{ExponentialBackoff, IntervalFunction};
use proptest::prelude::*;

/// The deterministic (jitter off) schedule is `min(max, base * 2^n)`.
#[test]
fn deterministic_schedule_grows_then_caps() {
    let backoff = ExponentialBackoff::new(Duration::from_millis(100))
        .exp_base(2.0)
        .max_delay(Duration::from_secs(10))
        .jitter(false);

    assert_eq!(backoff.interval_for(0), Duration::from_millis(100));
    assert_eq!(backoff.interval_for(1), Duration::from_millis(200));
    assert_eq!(backoff.interval_for(5), Duration::from_millis(3200));
    assert_eq!(backoff.interval_for(7), Duration::from_secs(10));
    assert_eq!(backoff.interval_for(20), Duration::from_secs(10));
}

proptest! {
    /// With jitter on, the n-th delay always falls in
    /// `[0.5 * min(M, b * 2^n), min(M, b * 2^n))`.
    #[test]
    fn jittered_delay_stays_in_band(
        base_ms in 1u64..500,
        max_ms in 500u64..20_000,
        attempt in 0usize..10,
    ) {
        let base = Duration::from_millis(base_ms);
        let max = Duration::from_millis(max_ms);
        let capped = Duration::from_secs_f64(
            (base.as_secs_f64() * 2f64.powi(attempt as i32)).min(max.as_secs_f64()),
        );

        let backoff = ExponentialBackoff::new(base)
            .exp_base(2.0)
            .max_delay(max)
            .jitter(true);

        let delay = backoff.interval_for(attempt);
        prop_assert!(delay >= capped.mul_f64(0.5), "delay {delay:?} below band for cap {capped:?}");
        prop_assert!(delay < capped, "delay {delay:?} at or above cap {capped:?}");
    }
}
