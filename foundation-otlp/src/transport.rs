//! The export contract.
//!
//! The wire protocol is an external collaborator: this crate assembles
//! batches, maps severities, and guards delivery, while an
//! [`OtlpTransport`] implementation owns serialization and HTTP/gRPC.

use foundation_core::Value;
use std::time::Duration;

/// One log record in OTLP shape.
#[derive(Debug, Clone, PartialEq)]
pub struct OtlpLogRecord {
    /// Wall time in nanoseconds since the Unix epoch.
    pub time_unix_nano: u64,
    /// Severity per the OTLP log data model.
    pub severity_number: i32,
    /// The severity's string form.
    pub severity_text: &'static str,
    /// The event message.
    pub body: String,
    /// The emitting logger's dotted name, exported as the scope.
    pub scope: String,
    /// Structured attributes in insertion order.
    pub attributes: Vec<(String, Value)>,
    /// Trace correlation id, when one was in scope.
    pub trace_id: Option<String>,
    /// Span correlation id, when one was in scope.
    pub span_id: Option<String>,
}

/// A batch of records sharing one resource.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportBatch {
    /// Resource attributes (`service.name` et al.).
    pub resource: Vec<(String, Value)>,
    /// The records to deliver.
    pub records: Vec<OtlpLogRecord>,
}

/// Why an export failed.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// The batch did not complete within its deadline.
    #[error("otlp export timed out after {0:?}")]
    Timeout(Duration),
    /// The collector was unreachable or the connection failed.
    #[error("otlp transport failed: {0}")]
    Transport(String),
    /// The collector rejected the batch.
    #[error("otlp collector returned status {0}")]
    Status(u16),
}

/// Delivers assembled batches to a collector.
///
/// Implementations are called from the sink's worker thread, never from the
/// logging caller. `timeout` is the per-batch deadline; exceeding it must
/// surface [`ExportError::Timeout`], which counts as a failure toward the
/// export circuit breaker.
pub trait OtlpTransport: Send + Sync + 'static {
    /// Delivers one batch.
    fn export(&self, batch: &ExportBatch, timeout: Duration) -> Result<(), ExportError>;

    /// Releases any connections. Called once at shutdown.
    fn shutdown(&self) {}
}

impl OtlpTransport for Box<dyn OtlpTransport> {
    fn export(&self, batch: &ExportBatch, timeout: Duration) -> Result<(), ExportError> {
        (**self).export(batch, timeout)
    }

    fn shutdown(&self) {
        (**self).shutdown()
    }
}
