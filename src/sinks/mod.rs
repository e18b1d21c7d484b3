//! Built-in sinks: console output and a capturing sink for tests.
//!
//! The file and OTLP sinks live in their own crates
//! (`foundation-appender`, `foundation-otlp`) and are re-exported from the
//! crate root when the corresponding feature is enabled.

use foundation_core::{LogRecord, Sink};
use parking_lot::Mutex;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Which standard stream a [`ConsoleSink`] writes to.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ConsoleStream {
    /// Standard output.
    Stdout,
    /// Standard error (the default for log output).
    Stderr,
}

impl ConsoleStream {
    /// Whether this stream is attached to a terminal.
    pub fn is_tty(self) -> bool {
        match self {
            ConsoleStream::Stdout => atty::is(atty::Stream::Stdout),
            ConsoleStream::Stderr => atty::is(atty::Stream::Stderr),
        }
    }
}

enum ConsoleWriter {
    Stdout,
    Stderr,
    Custom(Box<dyn Write + Send>),
}

/// Writes rendered records to stderr (or stdout), one line per record.
///
/// A single mutex serializes writers so concurrent records never
/// interleave within a line; each record is issued as one `write_all`.
pub struct ConsoleSink {
    writer: Mutex<ConsoleWriter>,
    write_warned: AtomicBool,
}

impl ConsoleSink {
    /// The default console sink, writing to stderr.
    pub fn stderr() -> Self {
        ConsoleSink {
            writer: Mutex::new(ConsoleWriter::Stderr),
            write_warned: AtomicBool::new(false),
        }
    }

    /// A console sink writing to stdout.
    pub fn stdout() -> Self {
        ConsoleSink {
            writer: Mutex::new(ConsoleWriter::Stdout),
            write_warned: AtomicBool::new(false),
        }
    }

    /// A sink for the given stream.
    pub fn for_stream(stream: ConsoleStream) -> Self {
        match stream {
            ConsoleStream::Stdout => Self::stdout(),
            ConsoleStream::Stderr => Self::stderr(),
        }
    }

    /// A console sink writing somewhere else. Used by tests.
    pub fn with_writer(writer: impl Write + Send + 'static) -> Self {
        ConsoleSink {
            writer: Mutex::new(ConsoleWriter::Custom(Box::new(writer))),
            write_warned: AtomicBool::new(false),
        }
    }

    fn write_line(&self, line: &[u8]) -> io::Result<()> {
        let mut writer = self.writer.lock();
        match &mut *writer {
            ConsoleWriter::Stdout => {
                let stdout = io::stdout();
                let mut handle = stdout.lock();
                handle.write_all(line)?;
                handle.flush()
            }
            ConsoleWriter::Stderr => {
                let stderr = io::stderr();
                let mut handle = stderr.lock();
                handle.write_all(line)?;
                handle.flush()
            }
            ConsoleWriter::Custom(custom) => {
                custom.write_all(line)?;
                custom.flush()
            }
        }
    }
}

impl Sink for ConsoleSink {
    fn name(&self) -> &str {
        "console"
    }

    fn emit(&self, _record: &LogRecord, rendered: &[u8]) {
        let mut line = Vec::with_capacity(rendered.len() + 1);
        line.extend_from_slice(rendered);
        line.push(b'\n');
        if let Err(err) = self.write_line(&line) {
            if !self.write_warned.swap(true, Ordering::Relaxed) {
                eprintln!("console sink write failed: {}", err);
            }
        }
    }
}

/// A sink that captures records in memory. Test scope only.
#[derive(Default)]
pub struct CaptureSink {
    records: Mutex<Vec<LogRecord>>,
    rendered: Mutex<Vec<String>>,
}

impl CaptureSink {
    /// An empty capture sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything captured so far, in arrival order.
    pub fn records(&self) -> Vec<LogRecord> {
        self.records.lock().clone()
    }

    /// The rendered lines, in arrival order.
    pub fn rendered(&self) -> Vec<String> {
        self.rendered.lock().clone()
    }

    /// Drops everything captured.
    pub fn clear(&self) {
        self.records.lock().clear();
        self.rendered.lock().clear();
    }
}

impl Sink for CaptureSink {
    fn name(&self) -> &str {
        "capture"
    }

    fn emit(&self, record: &LogRecord, rendered: &[u8]) {
        self.records.lock().push(record.clone());
        self.rendered
            .lock()
            .push(String::from_utf8_lossy(rendered).into_owned());
    }
}

/// A capture sink shared across a test and the pipeline it feeds.
pub type SharedCaptureSink = Arc<CaptureSink>;

#[cfg(test)]
mod tests {
    use super::*;
    use foundation_core::{attrs, Level};
    use parking_lot::Mutex as PlMutex;

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<PlMutex<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn console_sink_appends_newlines() {
        let buffer = SharedBuffer::default();
        let inner = buffer.0.clone();
        let sink = ConsoleSink::with_writer(buffer);
        let record = LogRecord::new("app", Level::Info, "x", attrs! {});
        sink.emit(&record, b"line one");
        sink.emit(&record, b"line two");
        assert_eq!(&*inner.lock(), b"line one\nline two\n");
    }

    #[test]
    fn capture_sink_keeps_records_in_order() {
        let sink = CaptureSink::new();
        for event in ["a", "b", "c"] {
            let record = LogRecord::new("app", Level::Info, event, attrs! {});
            sink.emit(&record, event.as_bytes());
        }
        let events: Vec<_> = sink.records().iter().map(|r| r.event().to_owned()).collect();
        assert_eq!(events, vec!["a", "b", "c"]);
        assert_eq!(sink.rendered(), vec!["a", "b", "c"]);
    }
}
