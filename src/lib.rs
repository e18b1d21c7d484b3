//! Foundation is an application-infrastructure toolkit built around four
//! tightly coupled subsystems:
//!
//! - **the structured-logging pipeline** — an ordered processor chain
//!   that merges scoped context, enriches records with service metadata,
//!   filters by per-module levels, rate-limits, decorates, redacts, and
//!   renders to console, file, and OTLP sinks;
//! - **the Hub** — the process-wide coordinator owning the component and
//!   command registries, the event bus, the DI container, and the lazily
//!   bootstrapped logger;
//! - **the resilience runtime** — retry with pluggable backoff, circuit
//!   breakers, and fallback chains, composable around any callable
//!   (re-exported from [`foundation_resilience`]);
//! - **the configuration loader** — layered, typed, env-driven
//!   configuration with converters, validators, and per-field source
//!   tracking.
//!
//! # Getting a logger
//!
//! ```no_run
//! use foundation::{attrs, get_logger};
//!
//! let logger = get_logger("app.db");
//! logger.info("query finished", attrs! { "table" => "users", "rows" => 42 });
//! ```
//!
//! The first logging call bootstraps the foundation from the environment
//! (`PROVIDE_LOG_LEVEL`, `PROVIDE_LOG_MODULE_LEVELS`,
//! `PROVIDE_LOG_FORMATTER`, the `OTEL_*` family); call
//! [`init_foundation`] directly to surface configuration errors instead.
//!
//! # Scoped context
//!
//! ```
//! use foundation::{attrs, context};
//!
//! let _scope = context::push_context(attrs! { "request_id" => "r-42" });
//! // every record on this thread now carries request_id=r-42
//! ```
//!
//! # Resilience
//!
//! ```
//! use foundation::resilience::{Retry, RetryPolicy, Backoff};
//! use std::time::Duration;
//!
//! let retry = Retry::new(
//!     RetryPolicy::new()
//!         .max_attempts(3)
//!         .base_delay(Duration::from_millis(100))
//!         .backoff(Backoff::Exponential),
//! );
//! # let _ = &retry;
//! ```

pub mod cli;
pub mod config;
pub mod console;
pub mod context;
pub mod di;
pub mod fmt;
pub mod hub;
pub mod logger;
pub mod pipeline;
pub mod sinks;

pub use crate::cli::{exit_code, CommandInfo, CommandTree, RegisteredCommand};
pub use crate::config::{ConfigLoader, ConfigSchema, Source, TelemetryConfig};
pub use crate::console::{perr, pin, pout, OutputOptions};
pub use crate::di::{Container, Dependency, Injectable, Overrides, Resolver};
pub use crate::fmt::LogFormat;
pub use crate::hub::{get_logger, hub, init_foundation, Hub};
pub use crate::logger::Logger;

pub use foundation_core::{
    attrs, AttributeMap, Dimension, ErrorInfo, ErrorKind, EventBus, FoundationError, Level,
    LogRecord, ParseLevelError, Registry, Result, Sink, Value,
};

/// The resilience runtime, re-exported.
pub mod resilience {
    pub use foundation_resilience::{
        full_jitter, Backoff, CancellationToken, CircuitBreaker, CircuitError, CircuitState,
        Clock, FallbackChain, HttpOutcome, ManualClock, Retry, RetryError, RetryPolicy,
        Retryable, Sleeper, SystemClock, ThreadSleeper,
    };
}

/// The file sink, re-exported.
#[cfg(feature = "file")]
pub mod file {
    pub use foundation_appender::{FileSink, NonBlocking, NonBlockingBuilder, Rotation, WorkerGuard};
}

/// The OTLP export sink, re-exported.
#[cfg(feature = "otlp")]
pub mod otlp {
    pub use foundation_otlp::{
        build_endpoint, export_breaker, reset_export_breaker, severity_number, severity_text,
        ExportBatch, ExportError, OtlpConfig, OtlpLogRecord, OtlpSink, OtlpTransport,
    };
}
