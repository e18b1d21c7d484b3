use crate::Msg;
use crossbeam_channel::Receiver;
use std::io::Write;
use std::{iter, thread};

/// Drains the record channel onto the wrapped writer.
///
/// The worker blocks until a message arrives, then consumes everything
/// already queued behind it in one burst, so a spike of records costs a
/// single flush. Write failures are reported on stderr once and the
/// offending record is dropped; the worker itself keeps running so later
/// records still have a chance once the writer recovers.
pub(crate) struct Worker<T: Write + Send + 'static> {
    writer: T,
    receiver: Receiver<Msg>,
}

impl<T: Write + Send + 'static> Worker<T> {
    pub(crate) fn new(receiver: Receiver<Msg>, writer: T) -> Worker<T> {
        Self { writer, receiver }
    }

    /// Runs until a shutdown message arrives or every sender is gone,
    /// then flushes one final time.
    pub(crate) fn run(mut self) {
        let mut io_warned = false;
        while let Ok(first) = self.receiver.recv() {
            let mut shutting_down = false;
            let mut wrote = false;
            for msg in iter::once(first).chain(self.receiver.try_iter()) {
                match msg {
                    Msg::Record(record) => match self.writer.write_all(&record) {
                        Ok(()) => wrote = true,
                        Err(err) => {
                            if !io_warned {
                                io_warned = true;
                                eprintln!("log writer failed: {}", err);
                            }
                        }
                    },
                    // Records queued before the shutdown were already
                    // drained out of the channel ahead of it.
                    Msg::Shutdown => {
                        shutting_down = true;
                        break;
                    }
                }
            }
            if wrote {
                if let Err(err) = self.writer.flush() {
                    if !io_warned {
                        io_warned = true;
                        eprintln!("log writer failed: {}", err);
                    }
                }
            }
            if shutting_down {
                break;
            }
        }
        if let Err(err) = self.writer.flush() {
            eprintln!("failed to flush log writer during shutdown: {}", err);
        }
    }

    /// Moves the worker onto its own named thread.
    pub(crate) fn spawn(self, name: String) -> thread::JoinHandle<()> {
        thread::Builder::new()
            .name(name)
            .spawn(move || self.run())
            .expect("failed to spawn foundation-appender worker thread")
    }
}
