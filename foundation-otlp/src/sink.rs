//! The OTLP sink.
//!
//! Records are converted to OTLP shape on the caller's thread, queued onto
//! a bounded channel, and batched on a dedicated worker. The worker flushes
//! when the buffer reaches the configured batch size or the flush interval
//! elapses, whichever comes first; every delivery runs under the export
//! circuit breaker. While the circuit is open the sink drops records
//! silently, after announcing the outage once per open transition.

use crate::config::OtlpConfig;
use crate::severity::{severity_number, severity_text};
use crate::transport::{ExportBatch, OtlpLogRecord, OtlpTransport};
use crate::export_breaker;
use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use foundation_core::{LogRecord, Result, Sink, Value};
use foundation_resilience::{CircuitBreaker, CircuitError, CircuitState};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

enum Msg {
    Record(Box<OtlpLogRecord>),
    Flush,
    Shutdown,
}

/// A [`Sink`] that exports records to an OTLP collector.
pub struct OtlpSink {
    sender: Sender<Msg>,
    worker: Mutex<Option<JoinHandle<()>>>,
    dropped: Arc<AtomicU64>,
    queue_warned: AtomicBool,
}

impl OtlpSink {
    /// Builds a sink exporting through `transport`, guarded by the global
    /// export breaker.
    pub fn new(config: OtlpConfig, transport: impl OtlpTransport) -> Result<Self> {
        Self::with_breaker(config, transport, export_breaker())
    }

    /// Builds a sink guarded by a caller-supplied breaker. Tests use this
    /// to avoid sharing the global breaker's state.
    pub fn with_breaker(
        config: OtlpConfig,
        transport: impl OtlpTransport,
        breaker: Arc<CircuitBreaker>,
    ) -> Result<Self> {
        let resource = config.resource_attributes()?;
        let (sender, receiver) = bounded(config.queue_limit.max(1));
        let dropped = Arc::new(AtomicU64::new(0));
        let worker = Worker {
            receiver,
            transport: Box::new(transport),
            breaker,
            resource,
            batch_size: config.batch_size.max(1),
            flush_interval: config.flush_interval,
            export_timeout: config.export_timeout,
            buffer: Vec::new(),
            announced_open: false,
        };
        let handle = std::thread::Builder::new()
            .name("foundation-otlp".to_owned())
            .spawn(move || worker.run())
            .map_err(|err| {
                foundation_core::FoundationError::internal("failed to spawn otlp worker")
                    .with_cause(err)
            })?;
        Ok(OtlpSink {
            sender,
            worker: Mutex::new(Some(handle)),
            dropped,
            queue_warned: AtomicBool::new(false),
        })
    }

    /// How many records were dropped because the queue was full.
    pub fn dropped_records(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    fn convert(record: &LogRecord) -> OtlpLogRecord {
        let time_unix_nano = record
            .timestamp()
            .timestamp_nanos_opt()
            .map(|n| n.max(0) as u64)
            .unwrap_or(0);
        OtlpLogRecord {
            time_unix_nano,
            severity_number: severity_number(record.level()),
            severity_text: severity_text(record.level()),
            body: record.event().to_owned(),
            scope: record.logger().to_owned(),
            attributes: record
                .attributes()
                .iter()
                .map(|(k, v)| (k.to_owned(), v.clone()))
                .collect(),
            trace_id: record.trace_id().map(str::to_owned),
            span_id: record.span_id().map(str::to_owned),
        }
    }
}

impl Sink for OtlpSink {
    fn name(&self) -> &str {
        "otlp"
    }

    fn emit(&self, record: &LogRecord, _rendered: &[u8]) {
        let msg = Msg::Record(Box::new(Self::convert(record)));
        if self.sender.try_send(msg).is_err() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            if !self.queue_warned.swap(true, Ordering::Relaxed) {
                eprintln!("otlp export queue full; newest records are being dropped");
            }
        }
    }

    fn flush(&self) {
        let _ = self.sender.try_send(Msg::Flush);
    }

    fn close(&self) {
        // A final flush is implied: the worker drains the queue and
        // exports the remaining buffer before exiting.
        let _ = self
            .sender
            .send_timeout(Msg::Shutdown, Duration::from_millis(500));
        if let Some(handle) = self.worker.lock().take() {
            let _ = handle.join();
        }
    }
}

struct Worker {
    receiver: crossbeam_channel::Receiver<Msg>,
    transport: Box<dyn OtlpTransport>,
    breaker: Arc<CircuitBreaker>,
    resource: Vec<(String, Value)>,
    batch_size: usize,
    flush_interval: Duration,
    export_timeout: Duration,
    buffer: Vec<OtlpLogRecord>,
    announced_open: bool,
}

impl Worker {
    fn run(mut self) {
        loop {
            match self.receiver.recv_timeout(self.flush_interval) {
                Ok(Msg::Record(record)) => {
                    self.buffer.push(*record);
                    if self.buffer.len() >= self.batch_size {
                        self.flush_buffer();
                    }
                }
                Ok(Msg::Flush) | Err(RecvTimeoutError::Timeout) => self.flush_buffer(),
                Ok(Msg::Shutdown) | Err(RecvTimeoutError::Disconnected) => {
                    self.drain();
                    self.flush_buffer();
                    self.transport.shutdown();
                    return;
                }
            }
        }
    }

    fn drain(&mut self) {
        while let Ok(msg) = self.receiver.try_recv() {
            if let Msg::Record(record) = msg {
                self.buffer.push(*record);
            }
        }
    }

    fn flush_buffer(&mut self) {
        if self.buffer.is_empty() {
            return;
        }
        let batch = ExportBatch {
            resource: self.resource.clone(),
            records: std::mem::take(&mut self.buffer),
        };
        let timeout = self.export_timeout;
        let transport = &*self.transport;
        let result = self
            .breaker
            .call(|| transport.export(&batch, timeout));
        match result {
            Ok(()) => {
                // Delivery succeeded, so the circuit is closed again; the
                // next open transition deserves a fresh announcement.
                self.announced_open = false;
            }
            Err(CircuitError::Open { retry_after, .. }) => {
                self.announce_open(retry_after);
            }
            Err(CircuitError::Inner(_)) => {
                if self.breaker.state() == CircuitState::Open {
                    self.announce_open(Duration::from_secs(0));
                }
            }
        }
    }

    fn announce_open(&mut self, retry_after: Duration) {
        if self.announced_open {
            return;
        }
        self.announced_open = true;
        let recovery = if retry_after.is_zero() {
            export_recovery_timeout()
        } else {
            retry_after
        };
        eprintln!(
            "otlp export suspended: circuit open (recovery in {}s)",
            recovery.as_secs()
        );
    }
}

/// The recovery window used by the global export breaker.
pub(crate) fn export_recovery_timeout() -> Duration {
    Duration::from_secs(60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::ExportError;
    use foundation_core::{attrs, Level};

    #[derive(Clone, Default)]
    struct CapturingTransport {
        batches: Arc<Mutex<Vec<ExportBatch>>>,
    }

    impl OtlpTransport for CapturingTransport {
        fn export(&self, batch: &ExportBatch, _timeout: Duration) -> Result<(), ExportError> {
            self.batches.lock().push(batch.clone());
            Ok(())
        }
    }

    #[derive(Clone, Default)]
    struct FailingTransport {
        calls: Arc<AtomicU64>,
    }

    impl OtlpTransport for FailingTransport {
        fn export(&self, _batch: &ExportBatch, _timeout: Duration) -> Result<(), ExportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(ExportError::Transport("collector unreachable".to_owned()))
        }
    }

    fn test_config() -> OtlpConfig {
        let mut config = OtlpConfig::new("https://otel.example.com", "test-service");
        config.batch_size = 2;
        // Long enough that tests only observe size- and shutdown-driven
        // flushes.
        config.flush_interval = Duration::from_secs(5);
        config.queue_limit = 64;
        config
    }

    fn test_breaker() -> Arc<CircuitBreaker> {
        Arc::new(CircuitBreaker::new(
            "otlp-test",
            5,
            Duration::from_secs(60),
            1,
        ))
    }

    fn record(event: &str) -> LogRecord {
        LogRecord::new(
            "app.http",
            Level::Info,
            event,
            attrs! { "path" => "/health" },
        )
    }

    #[test]
    fn records_export_with_resource_attributes() {
        let transport = CapturingTransport::default();
        let batches = transport.batches.clone();
        let sink = OtlpSink::with_breaker(test_config(), transport, test_breaker()).unwrap();
        sink.emit(&record("one"), b"");
        sink.emit(&record("two"), b"");
        sink.close();

        let batches = batches.lock();
        assert_eq!(batches.len(), 1);
        let batch = &batches[0];
        assert_eq!(
            batch.resource[0],
            (
                "service.name".to_owned(),
                Value::Str("test-service".to_owned())
            )
        );
        assert_eq!(batch.records.len(), 2);
        assert_eq!(batch.records[0].body, "one");
        assert_eq!(batch.records[0].severity_number, 9);
        assert_eq!(batch.records[0].scope, "app.http");
    }

    #[test]
    fn close_flushes_a_partial_batch() {
        let transport = CapturingTransport::default();
        let batches = transport.batches.clone();
        let mut config = test_config();
        config.batch_size = 100;
        let sink = OtlpSink::with_breaker(config, transport, test_breaker()).unwrap();
        sink.emit(&record("lonely"), b"");
        sink.close();
        assert_eq!(batches.lock().len(), 1);
    }

    #[test]
    fn open_circuit_stops_reaching_the_transport() {
        let transport = FailingTransport::default();
        let calls = transport.calls.clone();
        let breaker = Arc::new(CircuitBreaker::new(
            "otlp-open-test",
            2,
            Duration::from_secs(600),
            1,
        ));
        let mut config = test_config();
        config.batch_size = 1;
        let sink = OtlpSink::with_breaker(config, transport, breaker.clone()).unwrap();

        for n in 0..5 {
            sink.emit(&record(&format!("r{}", n)), b"");
        }
        sink.close();

        // Two failures open the circuit; later batches are dropped without
        // touching the transport.
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(breaker.state(), CircuitState::Open);
    }
}
