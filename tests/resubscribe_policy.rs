//! Scenario-level coverage for the resubscribe backoff policy (spec.md
//! §4.F, §8 scenario 3), complementing the unit tests already in
//! `src/resubscribe.rs`: determinism across the scenario's full 3-retry run,
//! and the documented bounds at both the Fibonacci-index cap and in the
//! saturated-above-cap regime.

use std::time::Duration;

use proptest::prelude::*;

use wdm_subscription_client::limits::{MAX_FIB_INDEX, MAX_RETRY_WAIT_MS, MIN_WAIT_TIME_PERCENT, RESUBSCRIBE_WAIT_TIME_MULTIPLIER_MS};
use wdm_subscription_client::resubscribe::{DefaultResubscribePolicy, ResubscribeParam, ResubscribePolicy};

#[test]
fn two_policies_seeded_identically_produce_identical_sequences() {
    let mut a = DefaultResubscribePolicy::new(0x5EED);
    let mut b = DefaultResubscribePolicy::new(0x5EED);
    for n in 0..20u32 {
        let wa = a.compute_wait(ResubscribeParam { num_retries: n });
        let wb = b.compute_wait(ResubscribeParam { num_retries: n });
        assert_eq!(wa, wb, "retry {n} diverged between identically-seeded policies");
    }
}

#[test]
fn different_seeds_diverge_somewhere_in_the_first_20_retries() {
    let mut a = DefaultResubscribePolicy::new(0x5EED);
    let mut b = DefaultResubscribePolicy::new(0xC0FFEE);
    let diverged = (0..20u32).any(|n| {
        a.compute_wait(ResubscribeParam { num_retries: n }) != b.compute_wait(ResubscribeParam { num_retries: n })
    });
    assert!(diverged);
}

#[test]
fn num_retries_zero_waits_exactly_zero() {
    // fib(0) == 0, so max_wait_ms == 0 and `compute_wait` short-circuits to
    // `Duration::ZERO` regardless of the seed (spec.md §8 scenario 3's first
    // retry).
    let mut policy = DefaultResubscribePolicy::new(42);
    assert_eq!(policy.compute_wait(ResubscribeParam { num_retries: 0 }), Duration::ZERO);
}

#[test]
fn wait_saturates_past_the_fibonacci_index_cap() {
    let mut policy = DefaultResubscribePolicy::new(0x5EED);
    let at_cap = policy.compute_wait(ResubscribeParam { num_retries: MAX_FIB_INDEX + 1 });
    let far_past_cap = policy.compute_wait(ResubscribeParam { num_retries: MAX_FIB_INDEX + 50 });
    let max = Duration::from_millis(MAX_RETRY_WAIT_MS);
    assert!(at_cap <= max);
    assert!(far_past_cap <= max);
}

proptest! {
    /// For any retry count, `compute_wait` stays within
    /// `[min_wait, max_wait)` (or exactly zero when `max_wait == 0`), where
    /// `min_wait` is `MIN_WAIT_TIME_PERCENT` of `max_wait` (spec.md §4.F).
    #[test]
    fn compute_wait_stays_within_its_declared_bounds(num_retries in 0u32..200, seed in any::<u64>()) {
        let mut policy = DefaultResubscribePolicy::new(seed);
        let wait = policy.compute_wait(ResubscribeParam { num_retries });

        let max_wait_ms = if num_retries <= MAX_FIB_INDEX {
            fibonacci_ms(num_retries)
        } else {
            MAX_RETRY_WAIT_MS
        };

        if max_wait_ms == 0 {
            prop_assert_eq!(wait, Duration::ZERO);
        } else {
            let min_wait_ms = MIN_WAIT_TIME_PERCENT * max_wait_ms / 100;
            prop_assert!(wait.as_millis() as u64 >= min_wait_ms);
            prop_assert!(wait.as_millis() as u64 <= max_wait_ms);
        }
    }
}

/// Mirrors `DefaultResubscribePolicy::max_wait_ms`'s Fibonacci step so the
/// property test can compute an expected bound independently of the
/// implementation under test.
fn fibonacci_ms(n: u32) -> u64 {
    let (mut a, mut b) = (0u64, 1u64);
    for _ in 0..n {
        let next = a.saturating_add(b);
        a = b;
        b = next;
    }
    a.saturating_mul(RESUBSCRIBE_WAIT_TIME_MULTIPLIER_MS)
}
