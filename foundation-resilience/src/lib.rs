//! Resilience patterns composable around any callable.
//!
//! Three patterns, designed to nest:
//!
//! - [`Retry`] re-runs an operation under a [`RetryPolicy`] — bounded
//!   attempts, a [`Backoff`] strategy (fixed, linear, exponential, or
//!   fibonacci), optional full jitter, and cooperative cancellation via
//!   [`CancellationToken`];
//! - [`CircuitBreaker`] short-circuits calls to a failing dependency and
//!   probes for recovery;
//! - [`FallbackChain`] tries ordered alternates until one succeeds.
//!
//! Composition is by nesting closures, outer-wraps-inner:
//!
//! ```
//! use foundation_core::FoundationError;
//! use foundation_resilience::{FallbackChain, Retry, RetryPolicy};
//!
//! fn fetch_primary() -> Result<String, FoundationError> {
//!     Err(FoundationError::network("primary unreachable"))
//! }
//!
//! let retry = Retry::new(RetryPolicy::new().max_attempts(2));
//! let chain = FallbackChain::new(move || {
//!     retry
//!         .execute(fetch_primary)
//!         .map_err(|e| FoundationError::network(e.to_string()))
//! })
//! .or(|| Ok("cached".to_owned()));
//!
//! assert_eq!(chain.execute().unwrap(), "cached");
//! ```
//!
//! Error classification runs through the [`Retryable`] trait (implemented
//! for `FoundationError` by kind) or an explicit predicate. For HTTP-shaped
//! calls, [`Retry::execute_http`] additionally treats a *successful*
//! response whose status is in [`RetryPolicy::retryable_status`] as a
//! retryable failure — the response type just exposes its code through
//! [`HttpOutcome`].

mod backoff;
mod cancel;
mod circuit;
mod fallback;
mod retry;

pub use self::backoff::{full_jitter, Backoff};
pub use self::cancel::CancellationToken;
pub use self::circuit::{
    CircuitBreaker, CircuitError, CircuitState, Clock, ManualClock, SystemClock,
};
pub use self::fallback::FallbackChain;
pub use self::retry::{
    HttpOutcome, Retry, RetryError, RetryPolicy, Retryable, Sleeper, ThreadSleeper,
};
