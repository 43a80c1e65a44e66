//! Component F: Fibonacci-bounded randomized resubscribe backoff
//! (spec.md §4.F).
//!
//! The wait-time shape (growing window, floor percentage, hard cap) is the
//! original implementation's `DefaultResubscribePolicyCallback`. The jitter
//! mechanics — a deterministic SplitMix64 mix rather than an external `rand`
//! dependency — are grounded in the teacher's
//! `governance::retry::adaptive::compute`, which uses the identical
//! fold-duration-into-seed-then-mix64 trick for reproducible test vectors.

use core::time::Duration;

use crate::limits::{
    MAX_FIB_INDEX, MAX_RETRY_WAIT_MS, MIN_WAIT_TIME_PERCENT, RESUBSCRIBE_WAIT_TIME_MULTIPLIER_MS,
};

/// `fib(0) = 0, fib(1) = 1, fib(n) = fib(n-1) + fib(n-2)`, computed
/// iteratively and saturating rather than overflowing for large `n` (the
/// caller clamps `n` to [`MAX_FIB_INDEX`] first, but saturate defensively).
fn fibonacci(n: u32) -> u64 {
    let (mut a, mut b) = (0u64, 1u64);
    for _ in 0..n {
        let next = a.saturating_add(b);
        a = b;
        b = next;
    }
    a
}

/// Inputs the policy needs to compute the next wait (spec.md §4.F,
/// §8 scenario 3).
#[derive(Clone, Copy, Debug)]
pub struct ResubscribeParam {
    pub num_retries: u32,
}

/// A resubscribe policy: given the current retry count, produce the next
/// wait duration. Custom policies may be supplied (spec.md §4.F); the
/// default implements the Fibonacci-bounded scheme below.
pub trait ResubscribePolicy {
    fn compute_wait(&mut self, param: ResubscribeParam) -> Duration;
}

/// The default policy (spec.md §4.F, §8 scenario 3).
///
/// `max_wait = fib(min(n, MAX_FIB_INDEX)) * MULT_MS`, saturating at
/// `MAX_RETRY_WAIT_MS` once `n` exceeds the Fibonacci index cap. Actual wait
/// is uniform in `[min_wait, max_wait)` where
/// `min_wait = MIN_PCT * max_wait / 100`.
#[derive(Debug)]
pub struct DefaultResubscribePolicy {
    /// SplitMix64 generator state; deterministic for a fixed seed so the
    /// scenario in spec.md §8 #3 can assert an exact wait sequence.
    rng_state: u64,
}

impl DefaultResubscribePolicy {
    pub fn new(seed: u64) -> Self {
        Self { rng_state: seed }
    }

    fn next_u64(&mut self) -> u64 {
        // SplitMix64: cheap, deterministic, good enough avalanche for
        // jitter — not a cryptographic PRNG and never claimed to be one.
        self.rng_state = self.rng_state.wrapping_add(0x9E3779B97F4A7C15);
        let mut z = self.rng_state;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
        z ^ (z >> 31)
    }

    fn max_wait_ms(num_retries: u32) -> u64 {
        if num_retries <= MAX_FIB_INDEX {
            fibonacci(num_retries).saturating_mul(RESUBSCRIBE_WAIT_TIME_MULTIPLIER_MS)
        } else {
            MAX_RETRY_WAIT_MS
        }
    }
}

impl ResubscribePolicy for DefaultResubscribePolicy {
    fn compute_wait(&mut self, param: ResubscribeParam) -> Duration {
        let max_wait_ms = Self::max_wait_ms(param.num_retries);
        if max_wait_ms == 0 {
            return Duration::ZERO;
        }
        let min_wait_ms = (MIN_WAIT_TIME_PERCENT * max_wait_ms) / 100;
        let span = max_wait_ms.saturating_sub(min_wait_ms).max(1);
        let jitter = self.next_u64() % span;
        Duration::from_millis(min_wait_ms + jitter)
    }
}

/// Retry-counter bookkeeping the lifecycle FSM threads through
/// `Resubscribe_Holdoff` (spec.md §4.D, §4.F).
#[derive(Debug, Default)]
pub struct RetryCounter(u32);

impl RetryCounter {
    pub fn new() -> Self {
        Self(0)
    }

    pub fn count(&self) -> u32 {
        self.0
    }

    pub fn increment(&mut self) -> u32 {
        self.0 = self.0.saturating_add(1);
        self.0
    }

    /// `ResetResubscribe` zeroes the counter (spec.md §4.F).
    pub fn reset(&mut self) {
        self.0 = 0;
    }
}
