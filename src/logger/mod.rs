//! Logger handles.
//!
//! A [`Logger`] is a cheap, cloneable handle: a dotted name plus a
//! reference to the shared pipeline. Handles are created through
//! [`get_logger`] (or [`Hub::logger`]), cached weakly by name, and never
//! mutated after creation. Each logging method builds one record and runs
//! it through the pipeline synchronously.
//!
//! While the foundation is bootstrapping — or when bootstrap failed — a
//! handle falls back to writing `key=value` lines straight to stderr, so
//! logging always makes progress.
//!
//! [`Hub::logger`]: crate::hub::Hub::logger

mod fallback;

pub(crate) use self::fallback::fallback_write;

use crate::hub;
use crate::pipeline::Pipeline;
use foundation_core::{AttributeMap, ErrorInfo, Level, LogRecord};
use std::error::Error as StdError;
use std::sync::Arc;

/// Returns the logger for `name`, bootstrapping the foundation on first
/// use.
pub fn get_logger(name: &str) -> Logger {
    hub::hub().logger(name)
}

pub(crate) enum LoggerKind {
    Pipeline(Arc<Pipeline>),
    Fallback,
}

pub(crate) struct LoggerInner {
    name: String,
    kind: LoggerKind,
}

/// A named handle onto the logging pipeline.
#[derive(Clone)]
pub struct Logger {
    inner: Arc<LoggerInner>,
}

impl Logger {
    pub(crate) fn from_inner(inner: Arc<LoggerInner>) -> Self {
        Logger { inner }
    }

    pub(crate) fn new_pipeline(name: &str, pipeline: Arc<Pipeline>) -> Arc<LoggerInner> {
        Arc::new(LoggerInner {
            name: name.to_owned(),
            kind: LoggerKind::Pipeline(pipeline),
        })
    }

    /// The minimal stderr logger used during bootstrap and as the
    /// degraded mode after a failed bootstrap.
    pub(crate) fn fallback(name: &str) -> Self {
        Logger {
            inner: Arc::new(LoggerInner {
                name: name.to_owned(),
                kind: LoggerKind::Fallback,
            }),
        }
    }

    /// The logger's dotted name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// True if this handle is the stderr fallback.
    pub fn is_fallback(&self) -> bool {
        matches!(self.inner.kind, LoggerKind::Fallback)
    }

    /// Emits at TRACE.
    pub fn trace(&self, event: &str, attributes: AttributeMap) {
        self.log(Level::Trace, event, attributes);
    }

    /// Emits at DEBUG.
    pub fn debug(&self, event: &str, attributes: AttributeMap) {
        self.log(Level::Debug, event, attributes);
    }

    /// Emits at INFO.
    pub fn info(&self, event: &str, attributes: AttributeMap) {
        self.log(Level::Info, event, attributes);
    }

    /// Emits at WARNING.
    pub fn warn(&self, event: &str, attributes: AttributeMap) {
        self.log(Level::Warning, event, attributes);
    }

    /// Emits at ERROR.
    pub fn error(&self, event: &str, attributes: AttributeMap) {
        self.log(Level::Error, event, attributes);
    }

    /// Emits at CRITICAL.
    pub fn critical(&self, event: &str, attributes: AttributeMap) {
        self.log(Level::Critical, event, attributes);
    }

    /// Emits one record at `level`.
    pub fn log(&self, level: Level, event: &str, attributes: AttributeMap) {
        self.emit(level, event, attributes, None);
    }

    /// Emits at ERROR with a captured error chain.
    pub fn error_with<E: StdError + ?Sized>(
        &self,
        event: &str,
        attributes: AttributeMap,
        error: &E,
    ) {
        self.emit(
            Level::Error,
            event,
            attributes,
            Some(ErrorInfo::from_error(error)),
        );
    }

    /// Emits at `level` with a captured error chain.
    pub fn log_with_error<E: StdError + ?Sized>(
        &self,
        level: Level,
        event: &str,
        attributes: AttributeMap,
        error: &E,
    ) {
        self.emit(level, event, attributes, Some(ErrorInfo::from_error(error)));
    }

    fn emit(
        &self,
        level: Level,
        event: &str,
        attributes: AttributeMap,
        error: Option<ErrorInfo>,
    ) {
        match &self.inner.kind {
            LoggerKind::Pipeline(pipeline) => {
                let mut record = LogRecord::new(&self.inner.name, level, event, attributes);
                if let Some(error) = error {
                    record.set_error(error);
                }
                pipeline.dispatch(record);
            }
            LoggerKind::Fallback => {
                fallback_write(&self.inner.name, level, event, &attributes, error.as_ref());
            }
        }
    }
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger")
            .field("name", &self.inner.name)
            .field("fallback", &self.is_fallback())
            .finish()
    }
}
