//! Randomised delays: retry backoff and inter-destination pacing.

use std::time::Duration;

use rand::Rng;

use beacon_common::config::{PacingPolicy, RetryPolicy};

/// Delay before retrying after the 0-indexed attempt `attempt`:
/// `initial_delay * 2^attempt` plus a jitter drawn from `[0, max_jitter)`.
pub fn backoff_delay(policy: &RetryPolicy, attempt: u32) -> Duration {
    policy.base_delay(attempt) + random_below(policy.max_jitter)
}

/// Pause between two destinations, drawn from `[min, max]`.
pub fn pacing_delay(policy: &PacingPolicy) -> Duration {
    if policy.max <= policy.min {
        return policy.min;
    }
    let secs = rand::rng().random_range(policy.min.as_secs_f64()..=policy.max.as_secs_f64());
    Duration::from_secs_f64(secs)
}

fn random_below(bound: Duration) -> Duration {
    if bound.is_zero() {
        return Duration::ZERO;
    }
    Duration::from_secs_f64(rand::rng().random_range(0.0..bound.as_secs_f64()))
}
