//! Fallback chains.

use std::error::Error as StdError;

type Candidate<T, E> = Box<dyn Fn() -> Result<T, E> + Send + Sync>;

/// A primary operation plus ordered alternates.
///
/// [`execute`](FallbackChain::execute) runs the primary; each non-fatal
/// failure moves on to the next candidate. The first success wins; if every
/// candidate fails, the last error surfaces.
///
/// Chains compose with the other resilience pieces by nesting closures —
/// the outer pattern wraps the inner one, so `fallback(retry(op))` retries
/// the primary before trying alternates, while `retry(fallback(op))`
/// retries the whole chain.
pub struct FallbackChain<T, E> {
    candidates: Vec<Candidate<T, E>>,
}

impl<T, E> FallbackChain<T, E>
where
    E: StdError + 'static,
{
    /// A chain with only a primary.
    pub fn new(primary: impl Fn() -> Result<T, E> + Send + Sync + 'static) -> Self {
        FallbackChain {
            candidates: vec![Box::new(primary)],
        }
    }

    /// Appends an alternate, tried after everything before it.
    pub fn or(mut self, alternate: impl Fn() -> Result<T, E> + Send + Sync + 'static) -> Self {
        self.candidates.push(Box::new(alternate));
        self
    }

    /// Number of candidates, the primary included.
    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    /// True if the chain has no candidates. Cannot happen via `new`.
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Runs the chain, treating every error as non-fatal.
    pub fn execute(&self) -> Result<T, E> {
        self.execute_with(|_| false)
    }

    /// Runs the chain; an error for which `fatal` returns true surfaces
    /// immediately without consulting the remaining candidates.
    pub fn execute_with(&self, fatal: impl Fn(&E) -> bool) -> Result<T, E> {
        let mut last_error = None;
        for candidate in &self.candidates {
            match candidate() {
                Ok(value) => return Ok(value),
                Err(error) => {
                    if fatal(&error) {
                        return Err(error);
                    }
                    last_error = Some(error);
                }
            }
        }
        // `new` guarantees at least one candidate ran.
        Err(last_error.expect("fallback chain has at least one candidate"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use foundation_core::{ErrorKind, FoundationError};
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[test]
    fn primary_success_skips_alternates() {
        let alternate_ran = Arc::new(Mutex::new(false));
        let flag = alternate_ran.clone();
        let chain = FallbackChain::new(|| Ok::<_, FoundationError>("primary")).or(move || {
            *flag.lock() = true;
            Ok("alternate")
        });
        assert_eq!(chain.execute().unwrap(), "primary");
        assert!(!*alternate_ran.lock());
    }

    #[test]
    fn first_successful_alternate_wins() {
        let chain = FallbackChain::new(|| Err(FoundationError::network("a down")))
            .or(|| Err(FoundationError::network("b down")))
            .or(|| Ok("c"));
        assert_eq!(chain.execute().unwrap(), "c");
    }

    #[test]
    fn all_failures_surface_the_last_error() {
        let chain: FallbackChain<(), _> =
            FallbackChain::new(|| Err(FoundationError::network("a down")))
                .or(|| Err(FoundationError::timeout("b slow")));
        let err = chain.execute().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);
    }

    #[test]
    fn fatal_errors_stop_the_chain() {
        let alternate_ran = Arc::new(Mutex::new(false));
        let flag = alternate_ran.clone();
        let chain: FallbackChain<(), _> =
            FallbackChain::new(|| Err(FoundationError::auth("denied"))).or(move || {
                *flag.lock() = true;
                Err(FoundationError::network("down"))
            });
        let err = chain.execute_with(|e| e.kind() == ErrorKind::Auth).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Auth);
        assert!(!*alternate_ran.lock());
    }
}
