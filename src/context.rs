//! Scoped context propagation.
//!
//! A thread-local attribute map rides along with the code that installs
//! it: [`push_context`] merges new entries over the current map and
//! returns a guard that restores the previous map when dropped, on every
//! exit path including panics. The logger's context-merge processor reads
//! the active map into each record.
//!
//! Trace correlation (`trace_id` / `span_id`) uses the same discipline
//! with its own slot.

use foundation_core::AttributeMap;
use std::cell::RefCell;

thread_local! {
    static CURRENT_CONTEXT: RefCell<AttributeMap> = RefCell::new(AttributeMap::new());
    static CURRENT_TRACE: RefCell<Option<TraceContext>> = RefCell::new(None);
}

/// Trace correlation identifiers.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceContext {
    /// The trace id.
    pub trace_id: String,
    /// The active span id, when known.
    pub span_id: Option<String>,
}

/// A snapshot of the thread's current context map.
pub fn current_context() -> AttributeMap {
    CURRENT_CONTEXT.with(|context| context.borrow().clone())
}

/// The thread's current trace context, if any.
pub fn current_trace() -> Option<TraceContext> {
    CURRENT_TRACE.with(|trace| trace.borrow().clone())
}

/// Restores the previous context map when dropped.
#[must_use = "dropping the guard immediately restores the previous context"]
#[derive(Debug)]
pub struct ContextScope {
    previous: Option<AttributeMap>,
}

impl Drop for ContextScope {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            CURRENT_CONTEXT.with(|context| *context.borrow_mut() = previous);
        }
    }
}

/// Installs `entries` merged over the current map for the guard's
/// lifetime.
pub fn push_context(entries: AttributeMap) -> ContextScope {
    CURRENT_CONTEXT.with(|context| {
        let mut current = context.borrow_mut();
        let previous = current.clone();
        current.extend(&entries);
        ContextScope {
            previous: Some(previous),
        }
    })
}

/// Runs `f` with `entries` merged into the context, restoring the
/// previous context afterwards whether `f` returns or panics.
pub fn with_context<T>(entries: AttributeMap, f: impl FnOnce() -> T) -> T {
    let _scope = push_context(entries);
    f()
}

/// Restores the previous trace context when dropped.
#[must_use = "dropping the guard immediately restores the previous trace context"]
#[derive(Debug)]
pub struct TraceScope {
    previous: Option<Option<TraceContext>>,
}

impl Drop for TraceScope {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            CURRENT_TRACE.with(|trace| *trace.borrow_mut() = previous);
        }
    }
}

/// Installs a trace context for the guard's lifetime.
pub fn push_trace(trace_id: impl Into<String>, span_id: Option<String>) -> TraceScope {
    CURRENT_TRACE.with(|trace| {
        let mut current = trace.borrow_mut();
        let previous = current.clone();
        *current = Some(TraceContext {
            trace_id: trace_id.into(),
            span_id,
        });
        TraceScope {
            previous: Some(previous),
        }
    })
}

/// Clears both slots on the current thread. Test scope only.
pub fn reset() {
    CURRENT_CONTEXT.with(|context| *context.borrow_mut() = AttributeMap::new());
    CURRENT_TRACE.with(|trace| *trace.borrow_mut() = None);
}

#[cfg(test)]
mod tests {
    use super::*;
    use foundation_core::attrs;

    #[test]
    fn scopes_nest_and_restore() {
        reset();
        assert!(current_context().is_empty());
        {
            let _outer = push_context(attrs! { "request_id" => "r-1" });
            assert_eq!(
                current_context().get("request_id").and_then(|v| v.as_str()),
                Some("r-1")
            );
            {
                let _inner = push_context(attrs! { "request_id" => "r-2", "user" => "ada" });
                let context = current_context();
                assert_eq!(
                    context.get("request_id").and_then(|v| v.as_str()),
                    Some("r-2")
                );
                assert_eq!(context.get("user").and_then(|v| v.as_str()), Some("ada"));
            }
            // Inner frame gone; outer untouched.
            let context = current_context();
            assert_eq!(
                context.get("request_id").and_then(|v| v.as_str()),
                Some("r-1")
            );
            assert!(context.get("user").is_none());
        }
        assert!(current_context().is_empty());
    }

    #[test]
    fn with_context_restores_after_a_panic() {
        reset();
        let result = std::panic::catch_unwind(|| {
            with_context(attrs! { "k" => "v" }, || panic!("inside the scope"));
        });
        assert!(result.is_err());
        assert!(current_context().is_empty());
    }

    #[test]
    fn trace_scope_restores_previous() {
        reset();
        {
            let _outer = push_trace("trace-a", Some("span-1".to_owned()));
            {
                let _inner = push_trace("trace-b", None);
                assert_eq!(current_trace().unwrap().trace_id, "trace-b");
            }
            let outer = current_trace().unwrap();
            assert_eq!(outer.trace_id, "trace-a");
            assert_eq!(outer.span_id.as_deref(), Some("span-1"));
        }
        assert!(current_trace().is_none());
    }
}
