//! Classify worker failures and schedule jittered backoff (§4.7).

use hortator_core::RetrySpec;
use rand::Rng;
use std::time::Duration;

/// A pod terminating with exit code 0 is never transient: the agent
/// completed deliberately, possibly with a logical failure it reported
/// itself. Any non-zero exit (including OOM) is transient (§4.7).
pub fn is_transient_failure(exit_code: Option<i32>) -> bool {
    exit_code != Some(0)
}

/// Retries are possible only when `maxAttempts > 0` and `attempts <
/// maxAttempts` (§4.7).
pub fn can_retry(retry: &RetrySpec, attempts: u32) -> bool {
    retry.max_attempts > 0 && attempts < retry.max_attempts
}

/// Backoff before attempt `completed_attempts + 1`: start from
/// `backoffSeconds`, double per completed attempt, cap at
/// `maxBackoffSeconds`, then apply independent uniform ±25% jitter with a
/// floor of 1s (§4.7, §8).
pub fn backoff_with_jitter(retry: &RetrySpec, completed_attempts: u32) -> Duration {
    let mut rng = rand::thread_rng();
    backoff_with_jitter_rng(retry, completed_attempts, &mut rng)
}

pub fn backoff_with_jitter_rng(retry: &RetrySpec, completed_attempts: u32, rng: &mut impl Rng) -> Duration {
    let base = base_backoff_seconds(retry, completed_attempts);
    let jitter = rng.gen_range(0.75..=1.25);
    let jittered = (base as f64 * jitter).max(1.0);
    Duration::from_secs_f64(jittered)
}

fn base_backoff_seconds(retry: &RetrySpec, completed_attempts: u32) -> u64 {
    let doubled = retry.backoff_seconds.saturating_mul(1u64 << completed_attempts.min(32));
    doubled.min(retry.max_backoff_seconds)
}

/// The `[lower, upper]` bound a jittered backoff must fall within, used by
/// boundary tests (§8): `[max(1, base·0.75·2^k), base·1.25·2^k]` capped at
/// `maxBackoffSeconds·1.25`.
pub fn backoff_bounds(retry: &RetrySpec, completed_attempts: u32) -> (f64, f64) {
    let base = base_backoff_seconds(retry, completed_attempts) as f64;
    let lower = (base * 0.75).max(1.0);
    let upper = (base * 1.25).min(retry.max_backoff_seconds as f64 * 1.25);
    (lower, upper)
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod tests;
