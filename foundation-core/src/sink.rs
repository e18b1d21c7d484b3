//! The sink contract.

use crate::record::LogRecord;

/// A terminal consumer of log records.
///
/// Sinks receive both the immutable record and the bytes produced by the
/// pipeline's renderer, so byte-oriented sinks (console, file) can write
/// without re-rendering while structured sinks (OTLP) read the record
/// directly.
///
/// Sink implementations must be safe to call from many threads, must not
/// panic, and must swallow their own I/O failures — a sink error never
/// reaches the code that emitted the record, and never re-enters the
/// logger.
pub trait Sink: Send + Sync + 'static {
    /// A short name identifying the sink in diagnostics.
    fn name(&self) -> &str;

    /// Consumes one record.
    ///
    /// Called after all processors ran; `rendered` is the pipeline's
    /// formatted output for this record, without a trailing newline.
    fn emit(&self, record: &LogRecord, rendered: &[u8]);

    /// Flushes any buffered records. Best effort.
    fn flush(&self) {}

    /// Flushes and releases resources. Called once at shutdown.
    fn close(&self) {
        self.flush();
    }
}
