//! Log records.
//!
//! A [`LogRecord`] is produced per logging call, transformed in place by the
//! processor chain, and handed to sinks by shared reference — once a sink
//! sees a record it is immutable.

use crate::attributes::AttributeMap;
use crate::level::Level;
use crate::value::Value;
use chrono::{DateTime, SecondsFormat, Utc};
use std::error::Error;
use std::sync::atomic::{AtomicU64, Ordering};

// Process-wide ordering sequence. Wall clocks can repeat or step backwards;
// this never does.
static NEXT_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// A single structured log event.
#[derive(Debug, Clone)]
pub struct LogRecord {
    timestamp: DateTime<Utc>,
    sequence: u64,
    level: Level,
    logger: String,
    event: String,
    attributes: AttributeMap,
    trace_id: Option<String>,
    span_id: Option<String>,
    error: Option<ErrorInfo>,
}

impl LogRecord {
    /// Creates a record stamped with the current wall time and the next
    /// monotonic sequence number.
    pub fn new(
        logger: impl Into<String>,
        level: Level,
        event: impl Into<String>,
        attributes: AttributeMap,
    ) -> Self {
        LogRecord {
            timestamp: Utc::now(),
            sequence: NEXT_SEQUENCE.fetch_add(1, Ordering::Relaxed),
            level,
            logger: logger.into(),
            event: event.into(),
            attributes,
            trace_id: None,
            span_id: None,
            error: None,
        }
    }

    /// Wall-clock timestamp.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// The timestamp in ISO-8601 form with microsecond precision.
    pub fn timestamp_rfc3339(&self) -> String {
        self.timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    /// Monotonic, process-wide sequence number.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// The record's severity.
    pub fn level(&self) -> Level {
        self.level
    }

    /// Reassigns the severity. Processors only.
    pub fn set_level(&mut self, level: Level) {
        self.level = level;
    }

    /// Dotted name of the emitting logger.
    pub fn logger(&self) -> &str {
        &self.logger
    }

    /// The event message.
    pub fn event(&self) -> &str {
        &self.event
    }

    /// Prepends a visual marker to the event message.
    pub fn decorate_event(&mut self, prefix: &str) {
        self.event = format!("{} {}", prefix, self.event);
    }

    /// Structured attributes, in insertion order.
    pub fn attributes(&self) -> &AttributeMap {
        &self.attributes
    }

    /// Mutable access to the attributes. Processors only.
    pub fn attributes_mut(&mut self) -> &mut AttributeMap {
        &mut self.attributes
    }

    /// Trace correlation id, if one was in scope.
    pub fn trace_id(&self) -> Option<&str> {
        self.trace_id.as_deref()
    }

    /// Span correlation id, if one was in scope.
    pub fn span_id(&self) -> Option<&str> {
        self.span_id.as_deref()
    }

    /// Installs trace correlation ids. Processors only.
    pub fn set_trace_context(&mut self, trace_id: Option<String>, span_id: Option<String>) {
        self.trace_id = trace_id;
        self.span_id = span_id;
    }

    /// The captured error, when the record describes a failure.
    pub fn error(&self) -> Option<&ErrorInfo> {
        self.error.as_ref()
    }

    /// Attaches a captured error.
    pub fn set_error(&mut self, error: ErrorInfo) {
        self.error = Some(error);
    }
}

/// A snapshot of an error attached to a log record.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ErrorInfo {
    /// The error's Rust type name.
    pub type_name: String,
    /// The error's display message.
    pub message: String,
    /// Messages of the `source()` chain, outermost first.
    pub cause_chain: Vec<String>,
    /// Captured stack, when available.
    pub stack: Option<String>,
}

impl ErrorInfo {
    /// Captures an error's type, message, and cause chain.
    pub fn from_error<E: Error + ?Sized>(error: &E) -> Self {
        let mut cause_chain = Vec::new();
        let mut source = error.source();
        while let Some(cause) = source {
            cause_chain.push(cause.to_string());
            source = cause.source();
        }
        ErrorInfo {
            type_name: std::any::type_name::<E>().to_owned(),
            message: error.to_string(),
            cause_chain,
            stack: None,
        }
    }

    /// Attaches a captured stack rendering.
    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    /// Serializes the error to a [`Value`] map.
    pub fn to_value(&self) -> Value {
        let mut entries = vec![
            ("type".to_owned(), Value::Str(self.type_name.clone())),
            ("message".to_owned(), Value::Str(self.message.clone())),
        ];
        if !self.cause_chain.is_empty() {
            entries.push((
                "cause_chain".to_owned(),
                Value::List(
                    self.cause_chain
                        .iter()
                        .map(|c| Value::Str(c.clone()))
                        .collect(),
                ),
            ));
        }
        if let Some(stack) = &self.stack {
            entries.push(("stack".to_owned(), Value::Str(stack.clone())));
        }
        Value::Map(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attrs;
    use std::fmt;

    #[derive(Debug)]
    struct Outer(Inner);
    #[derive(Debug)]
    struct Inner;

    impl fmt::Display for Outer {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("request failed")
        }
    }
    impl fmt::Display for Inner {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("connection reset")
        }
    }
    impl Error for Inner {}
    impl Error for Outer {
        fn source(&self) -> Option<&(dyn Error + 'static)> {
            Some(&self.0)
        }
    }

    #[test]
    fn sequence_is_monotonic() {
        let a = LogRecord::new("app", Level::Info, "first", AttributeMap::new());
        let b = LogRecord::new("app", Level::Info, "second", AttributeMap::new());
        assert!(b.sequence() > a.sequence());
    }

    #[test]
    fn timestamp_has_microsecond_precision() {
        let record = LogRecord::new("app", Level::Info, "tick", AttributeMap::new());
        let rendered = record.timestamp_rfc3339();
        // 2026-01-02T03:04:05.123456Z
        let fractional = rendered.split('.').nth(1).expect("fractional part");
        assert_eq!(fractional.trim_end_matches('Z').len(), 6);
    }

    #[test]
    fn error_info_captures_cause_chain() {
        let info = ErrorInfo::from_error(&Outer(Inner));
        assert_eq!(info.message, "request failed");
        assert_eq!(info.cause_chain, vec!["connection reset".to_owned()]);
        assert!(info.type_name.contains("Outer"));
    }

    #[test]
    fn decorate_event_prepends_marker() {
        let mut record = LogRecord::new("app", Level::Info, "listening", attrs! {});
        record.decorate_event("[net]");
        assert_eq!(record.event(), "[net] listening");
    }
}
