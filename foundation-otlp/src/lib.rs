//! OTLP log export for the Foundation logging pipeline.
//!
//! This crate owns the parts of OTLP export that belong to the core:
//!
//! - the severity mapping from internal [`Level`]s to OTLP severity
//!   numbers ([`severity_number`]);
//! - resource-attribute construction (`service.name` is required;
//!   `service.version` and `deployment.environment` ride along when
//!   configured);
//! - idempotent endpoint construction ([`build_endpoint`] appends
//!   `/v1/logs` only when absent);
//! - batching, per-batch timeouts, and delivery guarded by a process-wide
//!   circuit breaker (threshold 5, 60 s recovery).
//!
//! The wire protocol itself is delegated to an [`OtlpTransport`]
//! implementation supplied by the embedding application.
//!
//! [`Level`]: foundation_core::Level

#[macro_use]
extern crate lazy_static;

mod config;
mod severity;
mod sink;
mod transport;

pub use self::config::{build_endpoint, OtlpConfig};
pub use self::severity::{severity_number, severity_text};
pub use self::sink::OtlpSink;
pub use self::transport::{ExportBatch, ExportError, OtlpLogRecord, OtlpTransport};

use foundation_resilience::CircuitBreaker;
use std::sync::Arc;
use std::time::Duration;

lazy_static! {
    static ref EXPORT_BREAKER: Arc<CircuitBreaker> = Arc::new(CircuitBreaker::new(
        "otlp-export",
        5,
        Duration::from_secs(60),
        1,
    ));
}

/// The process-wide breaker guarding every OTLP export.
pub fn export_breaker() -> Arc<CircuitBreaker> {
    EXPORT_BREAKER.clone()
}

/// Forces the global export breaker back to CLOSED. Test scope only.
pub fn reset_export_breaker() {
    EXPORT_BREAKER.reset();
}
