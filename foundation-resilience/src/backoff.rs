//! Backoff strategies.

use rand::Rng;
use std::time::Duration;

/// How the delay between retry attempts grows.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Backoff {
    /// Every delay equals the base delay.
    Fixed,
    /// Delay grows as `base * n` for attempt `n`.
    Linear,
    /// Delay grows as `base * 2^(n-1)`.
    Exponential,
    /// Delay grows as `base * fib(n)`.
    Fibonacci,
}

impl Backoff {
    /// Computes the delay after the `attempt`th failure (1-based), before
    /// jitter, capped at `max`.
    pub fn delay(self, attempt: u32, base: Duration, max: Duration) -> Duration {
        debug_assert!(attempt >= 1, "attempts are 1-based");
        let factor = match self {
            Backoff::Fixed => 1,
            Backoff::Linear => u64::from(attempt),
            Backoff::Exponential => 1u64.checked_shl(attempt.saturating_sub(1)).unwrap_or(u64::MAX),
            Backoff::Fibonacci => fib(attempt),
        };
        scale(base, factor).min(max)
    }
}

/// Applies full jitter: a uniform draw from `[0, delay]`.
pub fn full_jitter(delay: Duration) -> Duration {
    if delay.is_zero() {
        return delay;
    }
    let nanos = delay.as_nanos().min(u128::from(u64::MAX)) as u64;
    Duration::from_nanos(rand::thread_rng().gen_range(0..=nanos))
}

fn scale(base: Duration, factor: u64) -> Duration {
    let nanos = base.as_nanos().saturating_mul(u128::from(factor));
    if nanos > u128::from(u64::MAX) {
        Duration::from_nanos(u64::MAX)
    } else {
        Duration::from_nanos(nanos as u64)
    }
}

fn fib(n: u32) -> u64 {
    let (mut prev, mut current) = (0u64, 1u64);
    for _ in 1..n {
        let next = prev.saturating_add(current);
        prev = current;
        current = next;
    }
    current
}
