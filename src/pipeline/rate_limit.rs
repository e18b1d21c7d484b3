//! Rate limiting and sampling.

use super::{Outcome, Processor};
use foundation_core::LogRecord;
use parking_lot::Mutex;
use rand::Rng;
use std::collections::HashMap;
use std::time::Instant;

/// A token-bucket policy: `capacity` events pass immediately, refilling at
/// `refill_per_second`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RateLimitPolicy {
    /// Burst size; also the initial token count.
    pub capacity: f64,
    /// Tokens restored per second.
    pub refill_per_second: f64,
}

impl RateLimitPolicy {
    /// A policy allowing `capacity` events per `per_second` window.
    pub fn new(capacity: f64, refill_per_second: f64) -> Self {
        RateLimitPolicy {
            capacity,
            refill_per_second,
        }
    }
}

#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn new(policy: &RateLimitPolicy, now: Instant) -> Self {
        TokenBucket {
            tokens: policy.capacity,
            last_refill: now,
        }
    }

    fn allow(&mut self, policy: &RateLimitPolicy, now: Instant) -> bool {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.last_refill = now;
        self.tokens = (self.tokens + elapsed * policy.refill_per_second).min(policy.capacity);
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Drops records once their `(logger, event)` bucket is exhausted.
///
/// With capacity N and no refill inside the window, exactly the first N
/// identical events pass and the (N+1)th drops.
pub struct RateLimitProcessor {
    policy: RateLimitPolicy,
    buckets: Mutex<HashMap<(String, String), TokenBucket>>,
}

impl RateLimitProcessor {
    /// A limiter applying `policy` per `(logger, event)` key.
    pub fn new(policy: RateLimitPolicy) -> Self {
        RateLimitProcessor {
            policy,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    fn allow(&self, logger: &str, event: &str) -> bool {
        let now = Instant::now();
        let mut buckets = self.buckets.lock();
        let bucket = buckets
            .entry((logger.to_owned(), event.to_owned()))
            .or_insert_with(|| TokenBucket::new(&self.policy, now));
        bucket.allow(&self.policy, now)
    }
}

impl Processor for RateLimitProcessor {
    fn name(&self) -> &'static str {
        "rate_limit"
    }

    fn process(&self, record: &mut LogRecord) -> Outcome {
        if self.allow(record.logger(), record.event()) {
            Outcome::Continue
        } else {
            Outcome::Drop
        }
    }
}

/// Passes a uniform fraction of records through.
pub struct SamplingProcessor {
    rate: f64,
}

impl SamplingProcessor {
    /// Samples at `rate` in `[0, 1]`; 1.0 passes everything.
    pub fn new(rate: f64) -> Self {
        SamplingProcessor {
            rate: rate.clamp(0.0, 1.0),
        }
    }
}

impl Processor for SamplingProcessor {
    fn name(&self) -> &'static str {
        "sampling"
    }

    fn process(&self, _record: &mut LogRecord) -> Outcome {
        if self.rate >= 1.0 || rand::thread_rng().gen::<f64>() < self.rate {
            Outcome::Continue
        } else {
            Outcome::Drop
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use foundation_core::{attrs, Level};

    fn record(logger: &str, event: &str) -> LogRecord {
        LogRecord::new(logger, Level::Info, event, attrs! {})
    }

    #[test]
    fn capacity_boundary_is_exact() {
        // No refill within the test window.
        let limiter = RateLimitProcessor::new(RateLimitPolicy::new(3.0, 0.0));
        let mut r = record("app", "repeated");
        assert_eq!(limiter.process(&mut r), Outcome::Continue);
        assert_eq!(limiter.process(&mut r), Outcome::Continue);
        assert_eq!(limiter.process(&mut r), Outcome::Continue);
        assert_eq!(limiter.process(&mut r), Outcome::Drop);
    }

    #[test]
    fn buckets_are_keyed_by_logger_and_event() {
        let limiter = RateLimitProcessor::new(RateLimitPolicy::new(1.0, 0.0));
        assert_eq!(
            limiter.process(&mut record("app", "one")),
            Outcome::Continue
        );
        // A different event key gets its own bucket.
        assert_eq!(
            limiter.process(&mut record("app", "two")),
            Outcome::Continue
        );
        // Same for a different logger.
        assert_eq!(
            limiter.process(&mut record("other", "one")),
            Outcome::Continue
        );
        assert_eq!(limiter.process(&mut record("app", "one")), Outcome::Drop);
    }

    #[test]
    fn sampling_at_one_passes_everything() {
        let sampler = SamplingProcessor::new(1.0);
        for _ in 0..100 {
            assert_eq!(sampler.process(&mut record("app", "x")), Outcome::Continue);
        }
    }

    #[test]
    fn sampling_at_zero_drops_everything() {
        let sampler = SamplingProcessor::new(0.0);
        for _ in 0..100 {
            assert_eq!(sampler.process(&mut record("app", "x")), Outcome::Drop);
        }
    }
}
