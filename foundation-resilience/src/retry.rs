//! The retry executor.
//!
//! A [`RetryPolicy`] describes how many attempts to make and how long to
//! wait between them; [`Retry`] runs a callable under that policy. Both a
//! synchronous shape and (behind the `tokio` feature) an asynchronous shape
//! are provided with identical semantics.
//!
//! Classification works on the whole outcome of an attempt, not just on
//! errors: the `execute_http` family consults
//! [`RetryPolicy::retryable_status`] so a call that *succeeded* with a
//! retryable status code (429, 503, …) is retried like a failure, and
//! [`Retry::execute_outcome`] accepts an arbitrary outcome predicate for
//! anything more exotic.
//!
//! Sleeping goes through the [`Sleeper`] seam so tests can record intended
//! delays instead of actually waiting.

use crate::backoff::{full_jitter, Backoff};
use crate::cancel::CancellationToken;
use foundation_core::FoundationError;
use std::collections::HashSet;
use std::error::Error as StdError;
use std::time::Duration;

/// Classifies an error as worth retrying or not.
///
/// [`FoundationError`] implements this by kind: network, timeout, and
/// rate-limit failures retry; validation and auth failures do not.
pub trait Retryable {
    /// True if a retry could plausibly succeed.
    fn is_retryable(&self) -> bool;
}

impl Retryable for FoundationError {
    fn is_retryable(&self) -> bool {
        FoundationError::is_retryable(self)
    }
}

/// Exposes an HTTP-style status code for retry classification.
///
/// Response types implement this so the `execute_http` family can hold
/// their status against [`RetryPolicy::retryable_status`]. A bare status
/// code qualifies as its own outcome.
pub trait HttpOutcome {
    /// The outcome's status code, when it has one.
    fn status(&self) -> Option<u16>;
}

impl HttpOutcome for u16 {
    fn status(&self) -> Option<u16> {
        Some(*self)
    }
}

/// Describes the retry schedule for an operation.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
    backoff: Backoff,
    jitter: bool,
    retryable_status: HashSet<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            backoff: Backoff::Exponential,
            jitter: true,
            retryable_status: HashSet::new(),
        }
    }
}

impl RetryPolicy {
    /// The default policy: 3 attempts, exponential backoff from 100ms
    /// capped at 30s, with full jitter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the total number of attempts (the first call included).
    ///
    /// # Panics
    ///
    /// Panics if `max_attempts` is zero; a policy that never calls the
    /// operation is a configuration bug.
    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        assert!(max_attempts >= 1, "a retry policy needs at least one attempt");
        self.max_attempts = max_attempts;
        self
    }

    /// Sets the base delay fed to the backoff strategy.
    pub fn base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    /// Caps every computed delay.
    pub fn max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Selects the backoff strategy.
    pub fn backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Enables or disables full jitter.
    pub fn jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Treats these HTTP-style status codes as retryable failures even
    /// when the call itself succeeded. Consulted by the `execute_http`
    /// executor family.
    pub fn retryable_status(mut self, statuses: impl IntoIterator<Item = u16>) -> Self {
        self.retryable_status = statuses.into_iter().collect();
        self
    }

    /// True if `status` is in the retryable set.
    pub fn status_is_retryable(&self, status: u16) -> bool {
        self.retryable_status.contains(&status)
    }

    /// The delay to wait after the `attempt`th failure (1-based).
    ///
    /// Without jitter this is exactly the backoff formula capped at the
    /// maximum delay; with jitter it is a uniform draw from `[0, that]`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = self
            .backoff
            .delay(attempt, self.base_delay, self.max_delay);
        if self.jitter {
            full_jitter(delay)
        } else {
            delay
        }
    }

    /// The configured number of attempts.
    pub fn attempts(&self) -> u32 {
        self.max_attempts
    }
}

/// The error surfaced by a retry execution.
#[derive(Debug, thiserror::Error)]
pub enum RetryError<E>
where
    E: StdError + 'static,
{
    /// Every attempt failed; wraps the last error.
    #[error("retries exhausted after {attempts} attempts")]
    Exhausted {
        /// How many attempts were made.
        attempts: u32,
        /// The error from the final attempt.
        #[source]
        last: E,
    },
    /// The first non-retryable error, surfaced immediately.
    #[error("operation failed with a non-retryable error")]
    NotRetryable(#[source] E),
    /// The cancellation token fired between attempts.
    #[error("operation cancelled between retry attempts")]
    Cancelled,
}

impl<E: StdError + 'static> RetryError<E> {
    /// Extracts the underlying operation error, if any.
    pub fn into_inner(self) -> Option<E> {
        match self {
            RetryError::Exhausted { last, .. } => Some(last),
            RetryError::NotRetryable(inner) => Some(inner),
            RetryError::Cancelled => None,
        }
    }
}

/// Puts a thread (or task) to sleep between attempts.
pub trait Sleeper: Send + Sync {
    /// Blocks for `duration`.
    fn sleep(&self, duration: Duration);
}

/// The default [`Sleeper`]: `std::thread::sleep`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}

// Lifts an error-only predicate to the outcome level: successes never
// retry, failures consult the predicate.
fn retry_on_err<T, E>(retryable: impl Fn(&E) -> bool) -> impl Fn(&Result<T, E>) -> bool {
    move |outcome| match outcome {
        Ok(_) => false,
        Err(error) => retryable(error),
    }
}

/// Executes callables under a [`RetryPolicy`].
pub struct Retry {
    policy: RetryPolicy,
    sleeper: Box<dyn Sleeper>,
}

impl Retry {
    /// An executor that really sleeps between attempts.
    pub fn new(policy: RetryPolicy) -> Self {
        Retry {
            policy,
            sleeper: Box::new(ThreadSleeper),
        }
    }

    /// An executor with a custom sleeper. Used by tests to observe delays
    /// without waiting for them.
    pub fn with_sleeper(policy: RetryPolicy, sleeper: impl Sleeper + 'static) -> Self {
        Retry {
            policy,
            sleeper: Box::new(sleeper),
        }
    }

    /// The policy this executor runs under.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Runs `op`, retrying errors the [`Retryable`] impl accepts.
    pub fn execute<T, E, F>(&self, op: F) -> Result<T, RetryError<E>>
    where
        E: StdError + Retryable + 'static,
        F: FnMut() -> Result<T, E>,
    {
        self.execute_outcome(
            &CancellationToken::new(),
            op,
            retry_on_err(Retryable::is_retryable),
        )
    }

    /// Runs `op` with an explicit error-retryability predicate.
    pub fn execute_with<T, E, F>(
        &self,
        op: F,
        retryable: impl Fn(&E) -> bool,
    ) -> Result<T, RetryError<E>>
    where
        E: StdError + 'static,
        F: FnMut() -> Result<T, E>,
    {
        self.execute_outcome(&CancellationToken::new(), op, retry_on_err(retryable))
    }

    /// Runs `op` under a cancellation token, classifying via [`Retryable`].
    pub fn execute_cancellable<T, E, F>(
        &self,
        token: &CancellationToken,
        op: F,
    ) -> Result<T, RetryError<E>>
    where
        E: StdError + Retryable + 'static,
        F: FnMut() -> Result<T, E>,
    {
        self.execute_outcome(token, op, retry_on_err(Retryable::is_retryable))
    }

    /// The cancellable shape of [`execute_with`](Retry::execute_with).
    pub fn execute_cancellable_with<T, E, F>(
        &self,
        token: &CancellationToken,
        op: F,
        retryable: impl Fn(&E) -> bool,
    ) -> Result<T, RetryError<E>>
    where
        E: StdError + 'static,
        F: FnMut() -> Result<T, E>,
    {
        self.execute_outcome(token, op, retry_on_err(retryable))
    }

    /// Runs an HTTP-shaped `op`: errors classify via [`Retryable`], and a
    /// *successful* call whose status is in the policy's
    /// [`retryable_status`](RetryPolicy::retryable_status) set counts as a
    /// retryable failure.
    ///
    /// A response whose status is still retryable on the final attempt is
    /// returned as-is — the status set bounds how often the call repeats,
    /// not what the caller gets back.
    pub fn execute_http<T, E, F>(&self, op: F) -> Result<T, RetryError<E>>
    where
        T: HttpOutcome,
        E: StdError + Retryable + 'static,
        F: FnMut() -> Result<T, E>,
    {
        self.execute_http_cancellable(&CancellationToken::new(), op)
    }

    /// The cancellable shape of [`execute_http`](Retry::execute_http).
    pub fn execute_http_cancellable<T, E, F>(
        &self,
        token: &CancellationToken,
        op: F,
    ) -> Result<T, RetryError<E>>
    where
        T: HttpOutcome,
        E: StdError + Retryable + 'static,
        F: FnMut() -> Result<T, E>,
    {
        let policy = &self.policy;
        self.execute_outcome(token, op, move |outcome| match outcome {
            Ok(value) => value
                .status()
                .map_or(false, |status| policy.status_is_retryable(status)),
            Err(error) => error.is_retryable(),
        })
    }

    /// The fully general synchronous shape: `should_retry` classifies the
    /// whole outcome of each attempt, so successes can be retried too.
    ///
    /// The token is consulted before each attempt and again before each
    /// sleep; a running attempt is never interrupted. An outcome still
    /// classified retryable on the final attempt is surfaced as-is: `Ok`
    /// values return to the caller, errors wrap in
    /// [`RetryError::Exhausted`].
    pub fn execute_outcome<T, E, F>(
        &self,
        token: &CancellationToken,
        mut op: F,
        should_retry: impl Fn(&Result<T, E>) -> bool,
    ) -> Result<T, RetryError<E>>
    where
        E: StdError + 'static,
        F: FnMut() -> Result<T, E>,
    {
        let mut attempt = 0u32;
        loop {
            if token.is_cancelled() {
                return Err(RetryError::Cancelled);
            }
            attempt += 1;
            let outcome = op();
            if !should_retry(&outcome) {
                return outcome.map_err(RetryError::NotRetryable);
            }
            if attempt >= self.policy.max_attempts {
                return match outcome {
                    Ok(value) => Ok(value),
                    Err(error) => Err(RetryError::Exhausted {
                        attempts: attempt,
                        last: error,
                    }),
                };
            }
            if token.is_cancelled() {
                return Err(RetryError::Cancelled);
            }
            self.sleeper.sleep(self.policy.delay_for_attempt(attempt));
        }
    }

    /// The asynchronous shape of
    /// [`execute_cancellable_with`](Retry::execute_cancellable_with), with
    /// identical semantics.
    #[cfg(feature = "tokio")]
    pub async fn execute_async<T, E, F, Fut>(
        &self,
        token: &CancellationToken,
        op: F,
        retryable: impl Fn(&E) -> bool,
    ) -> Result<T, RetryError<E>>
    where
        E: StdError + 'static,
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
    {
        self.execute_outcome_async(token, op, retry_on_err(retryable))
            .await
    }

    /// The asynchronous shape of
    /// [`execute_http_cancellable`](Retry::execute_http_cancellable), with
    /// identical semantics.
    #[cfg(feature = "tokio")]
    pub async fn execute_http_async<T, E, F, Fut>(
        &self,
        token: &CancellationToken,
        op: F,
    ) -> Result<T, RetryError<E>>
    where
        T: HttpOutcome,
        E: StdError + Retryable + 'static,
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
    {
        let policy = &self.policy;
        self.execute_outcome_async(token, op, move |outcome| match outcome {
            Ok(value) => value
                .status()
                .map_or(false, |status| policy.status_is_retryable(status)),
            Err(error) => error.is_retryable(),
        })
        .await
    }

    /// The asynchronous shape of
    /// [`execute_outcome`](Retry::execute_outcome), with identical
    /// semantics. Sleeps with `tokio::time::sleep`.
    #[cfg(feature = "tokio")]
    pub async fn execute_outcome_async<T, E, F, Fut>(
        &self,
        token: &CancellationToken,
        mut op: F,
        should_retry: impl Fn(&Result<T, E>) -> bool,
    ) -> Result<T, RetryError<E>>
    where
        E: StdError + 'static,
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
    {
        let mut attempt = 0u32;
        loop {
            if token.is_cancelled() {
                return Err(RetryError::Cancelled);
            }
            attempt += 1;
            let outcome = op().await;
            if !should_retry(&outcome) {
                return outcome.map_err(RetryError::NotRetryable);
            }
            if attempt >= self.policy.max_attempts {
                return match outcome {
                    Ok(value) => Ok(value),
                    Err(error) => Err(RetryError::Exhausted {
                        attempts: attempt,
                        last: error,
                    }),
                };
            }
            if token.is_cancelled() {
                return Err(RetryError::Cancelled);
            }
            tokio::time::sleep(self.policy.delay_for_attempt(attempt)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// Records requested sleeps instead of performing them.
    #[derive(Clone, Default)]
    pub(crate) struct RecordingSleeper {
        slept: Arc<Mutex<Vec<Duration>>>,
    }

    impl RecordingSleeper {
        pub(crate) fn sleeps(&self) -> Vec<Duration> {
            self.slept.lock().clone()
        }
    }

    impl Sleeper for RecordingSleeper {
        fn sleep(&self, duration: Duration) {
            self.slept.lock().push(duration);
        }
    }

    fn network_error() -> FoundationError {
        FoundationError::network("connection refused")
    }

    fn test_policy() -> RetryPolicy {
        RetryPolicy::new()
            .max_attempts(3)
            .base_delay(Duration::from_millis(100))
            .backoff(Backoff::Exponential)
            .jitter(false)
    }

    #[test]
    fn succeeds_on_third_attempt() {
        let sleeper = RecordingSleeper::default();
        let retry = Retry::with_sleeper(test_policy(), sleeper.clone());
        let calls = Arc::new(Mutex::new(0u32));
        let result: Result<&str, _> = retry.execute(|| {
            let mut calls = calls.lock();
            *calls += 1;
            if *calls < 3 {
                Err(network_error())
            } else {
                Ok("ready")
            }
        });
        assert_eq!(result.unwrap(), "ready");
        assert_eq!(*calls.lock(), 3);
        assert_eq!(
            sleeper.sleeps(),
            vec![Duration::from_millis(100), Duration::from_millis(200)]
        );
    }

    #[test]
    fn exhaustion_wraps_the_last_error() {
        let sleeper = RecordingSleeper::default();
        let retry = Retry::with_sleeper(test_policy(), sleeper.clone());
        let calls = Arc::new(Mutex::new(0u32));
        let result: Result<(), _> = retry.execute(|| {
            *calls.lock() += 1;
            Err(network_error())
        });
        match result.unwrap_err() {
            RetryError::Exhausted { attempts, last } => {
                assert_eq!(attempts, 3);
                assert!(last.is_retryable());
            }
            other => panic!("expected exhaustion, got {:?}", other),
        }
        assert_eq!(*calls.lock(), 3);
        assert_eq!(sleeper.sleeps().len(), 2);
    }

    #[test]
    fn non_retryable_errors_surface_immediately() {
        let sleeper = RecordingSleeper::default();
        let retry = Retry::with_sleeper(test_policy(), sleeper.clone());
        let calls = Arc::new(Mutex::new(0u32));
        let result: Result<(), _> = retry.execute(|| {
            *calls.lock() += 1;
            Err(FoundationError::auth("bad token"))
        });
        assert!(matches!(result.unwrap_err(), RetryError::NotRetryable(_)));
        assert_eq!(*calls.lock(), 1);
        assert!(sleeper.sleeps().is_empty());
    }

    #[test]
    fn single_attempt_policy_never_sleeps() {
        let sleeper = RecordingSleeper::default();
        let retry = Retry::with_sleeper(
            RetryPolicy::new().max_attempts(1).jitter(false),
            sleeper.clone(),
        );
        let calls = Arc::new(Mutex::new(0u32));
        let result: Result<(), _> = retry.execute(|| {
            *calls.lock() += 1;
            Err(network_error())
        });
        assert!(matches!(
            result.unwrap_err(),
            RetryError::Exhausted { attempts: 1, .. }
        ));
        assert_eq!(*calls.lock(), 1);
        assert!(sleeper.sleeps().is_empty());
    }

    #[test]
    fn cancellation_stops_before_the_next_attempt() {
        let sleeper = RecordingSleeper::default();
        let retry = Retry::with_sleeper(test_policy().max_attempts(10), sleeper);
        let token = CancellationToken::new();
        let calls = Arc::new(Mutex::new(0u32));
        let result: Result<(), _> = retry.execute_cancellable(&token, || {
            *calls.lock() += 1;
            token.cancel();
            Err(network_error())
        });
        assert!(matches!(result.unwrap_err(), RetryError::Cancelled));
        assert_eq!(*calls.lock(), 1);
    }

    #[test]
    fn custom_predicate_overrides_kind_classification() {
        let retry = Retry::with_sleeper(test_policy(), RecordingSleeper::default());
        let result: Result<(), _> = retry.execute_with(
            || Err(FoundationError::validation("odd input")),
            |_| true,
        );
        // The predicate said "retry", so validation errors exhaust instead
        // of surfacing immediately.
        assert!(matches!(
            result.unwrap_err(),
            RetryError::Exhausted { attempts: 3, .. }
        ));
    }

    #[test]
    fn bad_status_successes_retry_through_the_executor() {
        let sleeper = RecordingSleeper::default();
        let retry = Retry::with_sleeper(
            test_policy().retryable_status([429, 503]),
            sleeper.clone(),
        );
        let calls = Arc::new(Mutex::new(0u32));
        let result: Result<u16, RetryError<FoundationError>> = retry.execute_http(|| {
            let mut calls = calls.lock();
            *calls += 1;
            if *calls < 3 {
                Ok(503)
            } else {
                Ok(200)
            }
        });
        assert_eq!(result.unwrap(), 200);
        assert_eq!(*calls.lock(), 3);
        assert_eq!(
            sleeper.sleeps(),
            vec![Duration::from_millis(100), Duration::from_millis(200)]
        );
    }

    #[test]
    fn status_exhaustion_surfaces_the_last_response() {
        let retry = Retry::with_sleeper(
            test_policy().retryable_status([503]),
            RecordingSleeper::default(),
        );
        let calls = Arc::new(Mutex::new(0u32));
        let result: Result<u16, RetryError<FoundationError>> = retry.execute_http(|| {
            *calls.lock() += 1;
            Ok(503)
        });
        // The attempt bound was spent; the caller gets the final response
        // back, status and all.
        assert_eq!(result.unwrap(), 503);
        assert_eq!(*calls.lock(), 3);
    }

    #[test]
    fn statuses_outside_the_set_never_retry() {
        let retry = Retry::with_sleeper(
            test_policy().retryable_status([503]),
            RecordingSleeper::default(),
        );
        let calls = Arc::new(Mutex::new(0u32));
        let result: Result<u16, RetryError<FoundationError>> = retry.execute_http(|| {
            *calls.lock() += 1;
            Ok(404)
        });
        assert_eq!(result.unwrap(), 404);
        assert_eq!(*calls.lock(), 1);
        assert!(retry.policy().status_is_retryable(503));
        assert!(!retry.policy().status_is_retryable(404));
    }

    #[test]
    fn http_errors_still_classify_by_kind() {
        let retry = Retry::with_sleeper(
            test_policy().retryable_status([503]),
            RecordingSleeper::default(),
        );
        let calls = Arc::new(Mutex::new(0u32));
        let result: Result<u16, RetryError<FoundationError>> = retry.execute_http(|| {
            *calls.lock() += 1;
            Err(FoundationError::auth("bad token"))
        });
        assert!(matches!(result.unwrap_err(), RetryError::NotRetryable(_)));
        assert_eq!(*calls.lock(), 1);
    }

    #[test]
    fn outcome_predicates_can_retry_arbitrary_successes() {
        let retry = Retry::with_sleeper(test_policy(), RecordingSleeper::default());
        let token = CancellationToken::new();
        let calls = Arc::new(Mutex::new(0u32));
        let result: Result<u32, RetryError<FoundationError>> = retry.execute_outcome(
            &token,
            || {
                let mut calls = calls.lock();
                *calls += 1;
                Ok(*calls)
            },
            // Retry until the op has produced an even value.
            |outcome| matches!(outcome, Ok(value) if value % 2 == 1),
        );
        assert_eq!(result.unwrap(), 2);
        assert_eq!(*calls.lock(), 2);
    }

    #[cfg(feature = "tokio")]
    #[tokio::test]
    async fn async_shape_matches_sync_semantics() {
        let retry = Retry::new(
            RetryPolicy::new()
                .max_attempts(3)
                .base_delay(Duration::from_millis(1))
                .jitter(false),
        );
        let calls = Arc::new(Mutex::new(0u32));
        let token = CancellationToken::new();
        let result: Result<u32, _> = retry
            .execute_async(
                &token,
                || {
                    let calls = calls.clone();
                    async move {
                        let mut calls = calls.lock();
                        *calls += 1;
                        if *calls < 3 {
                            Err(network_error())
                        } else {
                            Ok(*calls)
                        }
                    }
                },
                |e| e.is_retryable(),
            )
            .await;
        assert_eq!(result.unwrap(), 3);
    }

    #[cfg(feature = "tokio")]
    #[tokio::test]
    async fn async_status_classification_matches_sync() {
        let retry = Retry::new(
            RetryPolicy::new()
                .max_attempts(3)
                .base_delay(Duration::from_millis(1))
                .jitter(false)
                .retryable_status([503]),
        );
        let calls = Arc::new(Mutex::new(0u32));
        let token = CancellationToken::new();
        let result: Result<u16, RetryError<FoundationError>> = retry
            .execute_http_async(&token, || {
                let calls = calls.clone();
                async move {
                    let mut calls = calls.lock();
                    *calls += 1;
                    if *calls < 2 {
                        Ok(503)
                    } else {
                        Ok(200)
                    }
                }
            })
            .await;
        assert_eq!(result.unwrap(), 200);
        assert_eq!(*calls.lock(), 2);
    }
}
