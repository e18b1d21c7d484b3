//! Circuit breakers.
//!
//! A breaker guards one named operation. It passes calls through while
//! CLOSED, short-circuits them while OPEN, and lets a bounded number of
//! probes through while HALF_OPEN. All state lives behind a single mutex;
//! the guarded operation itself always runs with no lock held.
//!
//! Time is observed through the [`Clock`] seam so the recovery timeout can
//! be tested without sleeping.

use parking_lot::Mutex;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// The observable state of a breaker.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CircuitState {
    /// Calls pass through; failures are counted.
    Closed,
    /// Calls are rejected until the recovery timeout elapses.
    Open,
    /// A bounded number of probe calls may pass.
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed => f.pad("closed"),
            CircuitState::Open => f.pad("open"),
            CircuitState::HalfOpen => f.pad("half-open"),
        }
    }
}

/// A time source. The default reads `Instant::now`; tests advance a manual
/// clock instead of sleeping through recovery timeouts.
pub trait Clock: Send + Sync {
    /// The current instant.
    fn now(&self) -> Instant;
}

/// The wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock advanced by hand. Test scope only.
#[derive(Clone)]
pub struct ManualClock {
    anchor: Instant,
    offset: Arc<Mutex<Duration>>,
}

impl ManualClock {
    /// A clock frozen at its creation instant.
    pub fn new() -> Self {
        ManualClock {
            anchor: Instant::now(),
            offset: Arc::new(Mutex::new(Duration::ZERO)),
        }
    }

    /// Moves the clock forward.
    pub fn advance(&self, by: Duration) {
        *self.offset.lock() += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.anchor + *self.offset.lock()
    }
}

/// The error surfaced by a guarded call.
#[derive(Debug, thiserror::Error)]
pub enum CircuitError<E>
where
    E: StdError + 'static,
{
    /// The breaker is open; the operation was not invoked.
    #[error("circuit {name:?} is open; retry in {retry_after:?}")]
    Open {
        /// The breaker's name.
        name: String,
        /// Time remaining until the breaker will admit a probe.
        retry_after: Duration,
    },
    /// The operation ran and failed; the failure was counted.
    #[error("guarded operation failed")]
    Inner(#[source] E),
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    consecutive_failures: u32,
    last_opened_at: Option<Instant>,
    half_open_in_flight: u32,
}

/// A named circuit breaker.
pub struct CircuitBreaker {
    name: String,
    failure_threshold: u32,
    recovery_timeout: Duration,
    half_open_probes: u32,
    clock: Box<dyn Clock>,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    /// A breaker on the system clock.
    pub fn new(
        name: impl Into<String>,
        failure_threshold: u32,
        recovery_timeout: Duration,
        half_open_probes: u32,
    ) -> Self {
        Self::with_clock(
            name,
            failure_threshold,
            recovery_timeout,
            half_open_probes,
            SystemClock,
        )
    }

    /// A breaker observing time through `clock`.
    pub fn with_clock(
        name: impl Into<String>,
        failure_threshold: u32,
        recovery_timeout: Duration,
        half_open_probes: u32,
        clock: impl Clock + 'static,
    ) -> Self {
        assert!(failure_threshold >= 1, "threshold of zero would never close");
        assert!(half_open_probes >= 1, "at least one probe must be admitted");
        CircuitBreaker {
            name: name.into(),
            failure_threshold,
            recovery_timeout,
            half_open_probes,
            clock: Box::new(clock),
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                last_opened_at: None,
                half_open_in_flight: 0,
            }),
        }
    }

    /// The breaker's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The current state, as last recorded.
    ///
    /// An OPEN breaker whose recovery timeout has elapsed still reports
    /// `Open` here; the transition to HALF_OPEN happens when the next call
    /// asks to pass.
    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    /// Runs `op` under the breaker.
    ///
    /// While OPEN, returns [`CircuitError::Open`] without invoking `op`.
    /// Success and failure are reported back into the state machine.
    pub fn call<T, E, F>(&self, op: F) -> Result<T, CircuitError<E>>
    where
        E: StdError + 'static,
        F: FnOnce() -> Result<T, E>,
    {
        let was_probe = match self.try_acquire() {
            Ok(probe) => probe,
            Err(retry_after) => {
                return Err(CircuitError::Open {
                    name: self.name.clone(),
                    retry_after,
                })
            }
        };
        let result = op();
        match &result {
            Ok(_) => self.on_success(was_probe),
            Err(_) => self.on_failure(was_probe),
        }
        result.map_err(CircuitError::Inner)
    }

    /// Forces the breaker back to CLOSED with cleared counters.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.state = CircuitState::Closed;
        inner.consecutive_failures = 0;
        inner.last_opened_at = None;
        inner.half_open_in_flight = 0;
    }

    /// Admits or rejects a call; `Ok(true)` means the call is a half-open
    /// probe, `Err` carries the time until the next probe window.
    fn try_acquire(&self) -> Result<bool, Duration> {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => Ok(false),
            CircuitState::Open => {
                let opened_at = inner.last_opened_at.unwrap_or(now);
                let elapsed = now.saturating_duration_since(opened_at);
                if elapsed >= self.recovery_timeout {
                    inner.state = CircuitState::HalfOpen;
                    inner.half_open_in_flight = 1;
                    Ok(true)
                } else {
                    Err(self.recovery_timeout - elapsed)
                }
            }
            CircuitState::HalfOpen => {
                if inner.half_open_in_flight < self.half_open_probes {
                    inner.half_open_in_flight += 1;
                    Ok(true)
                } else {
                    Err(self.recovery_timeout)
                }
            }
        }
    }

    fn on_success(&self, was_probe: bool) {
        let mut inner = self.inner.lock();
        if was_probe {
            inner.half_open_in_flight = inner.half_open_in_flight.saturating_sub(1);
        }
        match inner.state {
            // First successful probe closes the breaker.
            CircuitState::HalfOpen => {
                inner.state = CircuitState::Closed;
                inner.consecutive_failures = 0;
                inner.last_opened_at = None;
                inner.half_open_in_flight = 0;
            }
            CircuitState::Closed => {
                inner.consecutive_failures = 0;
            }
            CircuitState::Open => {}
        }
    }

    fn on_failure(&self, was_probe: bool) {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        if was_probe {
            inner.half_open_in_flight = inner.half_open_in_flight.saturating_sub(1);
        }
        match inner.state {
            CircuitState::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.failure_threshold {
                    inner.state = CircuitState::Open;
                    inner.last_opened_at = Some(now);
                }
            }
            // Any half-open failure reopens immediately.
            CircuitState::HalfOpen => {
                inner.state = CircuitState::Open;
                inner.last_opened_at = Some(now);
                inner.half_open_in_flight = 0;
            }
            CircuitState::Open => {
                inner.last_opened_at = Some(now);
            }
        }
    }
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("state", &inner.state)
            .field("consecutive_failures", &inner.consecutive_failures)
            .finish()
    }
}
