//! File output for the Foundation logging pipeline.
//!
//! Two building blocks and the sink that combines them:
//!
//! - [`RollingAppender`] — a blocking writer that appends to a single file
//!   and rotates it out to timestamp-suffixed siblings by size or clock
//!   period;
//! - [`NonBlocking`] — a bounded-queue, dedicated-worker-thread writer
//!   wrapper that keeps file I/O off the logging caller's thread, dropping
//!   the newest records (with a counter and a one-shot warning) when the
//!   queue is full;
//! - [`FileSink`] — the [`foundation_core::Sink`] implementation the
//!   pipeline dispatches to, in either blocking or non-blocking mode.
//!
//! ```no_run
//! use foundation_appender::{FileSink, Rotation};
//!
//! let sink = FileSink::new("/var/log/app/app.log", Rotation::DAILY)?;
//! # Ok::<(), std::io::Error>(())
//! ```

mod non_blocking;
mod rolling;
mod sink;
mod worker;

pub use self::non_blocking::{
    NonBlocking, NonBlockingBuilder, WorkerGuard, DEFAULT_BUFFERED_RECORDS_LIMIT,
};
pub use self::rolling::{RollingAppender, Rotation};
pub use self::sink::FileSink;

pub(crate) enum Msg {
    Record(Vec<u8>),
    Shutdown,
}
