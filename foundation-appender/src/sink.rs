//! The file sink.

use crate::non_blocking::{NonBlocking, NonBlockingBuilder, WorkerGuard};
use crate::rolling::{Rotation, RollingAppender};
use foundation_core::{LogRecord, Sink};
use parking_lot::Mutex;
use std::io::{self, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

enum Mode {
    Blocking(Mutex<RollingAppender>),
    NonBlocking {
        writer: NonBlocking,
        guard: Mutex<Option<WorkerGuard>>,
    },
}

/// A [`Sink`] that appends rendered records to a (possibly rotating) file.
///
/// Each record is assembled in memory — rendered bytes plus the trailing
/// newline — and issued as a single write, so concurrent records never
/// interleave within a line. In non-blocking mode the assembled record is
/// queued to the worker thread instead.
pub struct FileSink {
    mode: Mode,
    write_warned: AtomicBool,
}

impl FileSink {
    /// A blocking sink writing at `path` under `rotation`.
    pub fn new(path: impl AsRef<Path>, rotation: Rotation) -> io::Result<Self> {
        let appender = RollingAppender::new(path, rotation)?;
        Ok(FileSink {
            mode: Mode::Blocking(Mutex::new(appender)),
            write_warned: AtomicBool::new(false),
        })
    }

    /// A sink whose file I/O happens on a dedicated worker thread.
    ///
    /// `queue_limit` bounds in-flight records; beyond it the newest are
    /// dropped (see [`NonBlocking`]).
    pub fn non_blocking(
        path: impl AsRef<Path>,
        rotation: Rotation,
        queue_limit: usize,
    ) -> io::Result<Self> {
        let appender = RollingAppender::new(path, rotation)?;
        let (writer, guard) = NonBlockingBuilder::default()
            .buffered_records_limit(queue_limit)
            .finish(appender);
        Ok(FileSink {
            mode: Mode::NonBlocking {
                writer,
                guard: Mutex::new(Some(guard)),
            },
            write_warned: AtomicBool::new(false),
        })
    }

    fn assemble(rendered: &[u8]) -> Vec<u8> {
        let mut line = Vec::with_capacity(rendered.len() + 1);
        line.extend_from_slice(rendered);
        line.push(b'\n');
        line
    }
}

impl Sink for FileSink {
    fn name(&self) -> &str {
        "file"
    }

    fn emit(&self, _record: &LogRecord, rendered: &[u8]) {
        let line = Self::assemble(rendered);
        match &self.mode {
            Mode::Blocking(appender) => {
                if let Err(err) = appender.lock().write_all(&line) {
                    if !self.write_warned.swap(true, Ordering::Relaxed) {
                        eprintln!("file sink write failed: {}", err);
                    }
                }
            }
            Mode::NonBlocking { writer, .. } => writer.enqueue(line),
        }
    }

    fn flush(&self) {
        if let Mode::Blocking(appender) = &self.mode {
            if let Err(err) = appender.lock().flush() {
                if !self.write_warned.swap(true, Ordering::Relaxed) {
                    eprintln!("file sink flush failed: {}", err);
                }
            }
        }
        // Non-blocking flushes happen on the worker after each drained
        // batch; there is nothing to force from the caller side.
    }

    fn close(&self) {
        match &self.mode {
            Mode::Blocking(_) => self.flush(),
            Mode::NonBlocking { guard, .. } => {
                // Dropping the guard delivers the shutdown message and
                // joins the worker, flushing everything still queued.
                drop(guard.lock().take());
            }
        }
    }
}
