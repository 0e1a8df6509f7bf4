use super::*;
use hortator_core::RetrySpec;
use proptest::prelude::*;
use rand::rngs::mock::StepRng;

fn retry(max_attempts: u32) -> RetrySpec {
    RetrySpec {
        max_attempts,
        backoff_seconds: 30,
        max_backoff_seconds: 300,
    }
}

#[test]
fn exit_zero_is_never_transient() {
    assert!(!is_transient_failure(Some(0)));
}

#[test]
fn nonzero_exit_is_transient() {
    assert!(is_transient_failure(Some(1)));
    assert!(is_transient_failure(Some(137))); // OOM-killed
}

#[test]
fn missing_exit_code_is_transient() {
    assert!(is_transient_failure(None));
}

#[test]
fn cannot_retry_with_zero_max_attempts() {
    assert!(!can_retry(&retry(0), 0));
}

#[test]
fn can_retry_while_under_the_cap() {
    assert!(can_retry(&retry(2), 0));
    assert!(can_retry(&retry(2), 1));
    assert!(!can_retry(&retry(2), 2));
}

#[test]
fn backoff_doubles_per_completed_attempt_until_capped() {
    let retry = RetrySpec {
        max_attempts: 5,
        backoff_seconds: 10,
        max_backoff_seconds: 100,
    };
    let mut rng = StepRng::new(u64::MAX / 2, 0); // deterministic ~1.0x jitter factor
    let b0 = backoff_with_jitter_rng(&retry, 0, &mut rng).as_secs_f64();
    let b1 = backoff_with_jitter_rng(&retry, 1, &mut rng).as_secs_f64();
    let b2 = backoff_with_jitter_rng(&retry, 2, &mut rng).as_secs_f64();
    assert!((b0 - 10.0).abs() < 1.0);
    assert!((b1 - 20.0).abs() < 1.0);
    assert!((b2 - 40.0).abs() < 1.0);
}

#[test]
fn backoff_is_capped_at_max_backoff_seconds() {
    let retry = RetrySpec {
        max_attempts: 10,
        backoff_seconds: 30,
        max_backoff_seconds: 300,
    };
    let (_, upper) = backoff_bounds(&retry, 20);
    assert!(upper <= 300.0 * 1.25);
}

proptest! {
    #[test]
    fn jittered_backoff_always_within_bounds(
        base in 1u64..120,
        max_backoff in 120u64..600,
        completed in 0u32..8,
        jitter_seed in any::<u64>(),
    ) {
        let retry = RetrySpec { max_attempts: 10, backoff_seconds: base, max_backoff_seconds: max_backoff };
        let mut rng = StepRng::new(jitter_seed, 1);
        let sample = backoff_with_jitter_rng(&retry, completed, &mut rng).as_secs_f64();
        let (lower, upper) = backoff_bounds(&retry, completed);
        prop_assert!(sample >= lower - 1e-6);
        prop_assert!(sample <= upper + 1e-6);
    }
}
