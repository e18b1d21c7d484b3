//! The processor chain.
//!
//! A [`Pipeline`] owns an ordered list of [`Processor`]s, a renderer, and
//! the registered sinks. The chain is fixed when the pipeline is built;
//! records flow through synchronously on the caller's thread, each
//! processor mutating the record in place or dropping it. After the last
//! processor the record is rendered once and fanned out to every sink in
//! registration order.
//!
//! A panic anywhere in the chain is caught and reported as one plain line
//! on stderr; it never propagates to the logging caller and never
//! re-enters the logger.

mod event_sets;
mod module_filter;
mod processors;
mod rate_limit;
mod redact;

pub use self::event_sets::{EventMapping, EventSet, EventSetProcessor, EventSetRegistry};
pub use self::module_filter::{ModuleFilter, ModuleLevels};
pub use self::processors::{ContextMergeProcessor, EnrichmentProcessor, TraceContextProcessor};
pub use self::rate_limit::{RateLimitPolicy, RateLimitProcessor, SamplingProcessor};
pub use self::redact::{RedactionPolicy, RedactionProcessor};

use crate::fmt::Renderer;
use foundation_core::{LogRecord, Sink};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// What a processor decided about a record.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Hand the record to the next processor.
    Continue,
    /// Discard the record; downstream processors and sinks are skipped.
    Drop,
}

/// One stage of the chain.
pub trait Processor: Send + Sync + 'static {
    /// A short name used in diagnostics.
    fn name(&self) -> &'static str;

    /// Transforms the record in place, or drops it.
    fn process(&self, record: &mut LogRecord) -> Outcome;
}

/// The finalized chain: processors, renderer, sinks.
pub struct Pipeline {
    processors: Vec<Box<dyn Processor>>,
    renderer: Renderer,
    sinks: Vec<Arc<dyn Sink>>,
}

impl Pipeline {
    /// Starts an empty pipeline with the given renderer.
    pub fn builder(renderer: Renderer) -> PipelineBuilder {
        PipelineBuilder {
            processors: Vec::new(),
            renderer,
            sinks: Vec::new(),
        }
    }

    /// Runs one record through the chain and the sinks.
    ///
    /// Returns after every processor ran and every sink accepted the
    /// record; sinks may buffer, so this does not imply a flush.
    pub fn dispatch(&self, record: LogRecord) {
        let result = panic::catch_unwind(AssertUnwindSafe(|| self.dispatch_inner(record)));
        if result.is_err() {
            eprintln!("log pipeline failure; one record was lost");
        }
    }

    fn dispatch_inner(&self, mut record: LogRecord) {
        for processor in &self.processors {
            if processor.process(&mut record) == Outcome::Drop {
                return;
            }
        }
        let rendered = self.renderer.render(&record);
        for sink in &self.sinks {
            sink.emit(&record, &rendered);
        }
    }

    /// Flushes every sink, in registration order.
    pub fn flush(&self) {
        for sink in &self.sinks {
            sink.flush();
        }
    }

    /// Closes every sink. Called when the foundation shuts down.
    pub fn close(&self) {
        for sink in &self.sinks {
            sink.close();
        }
    }

    /// The names of the chain's processors, in order.
    pub fn processor_names(&self) -> Vec<&'static str> {
        self.processors.iter().map(|p| p.name()).collect()
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("processors", &self.processor_names())
            .field("sinks", &self.sinks.iter().map(|s| s.name()).collect::<Vec<_>>())
            .finish()
    }
}

/// Assembles a [`Pipeline`]. The chain is fixed once `build` is called.
pub struct PipelineBuilder {
    processors: Vec<Box<dyn Processor>>,
    renderer: Renderer,
    sinks: Vec<Arc<dyn Sink>>,
}

impl PipelineBuilder {
    /// Appends a processor to the chain.
    pub fn processor(mut self, processor: impl Processor) -> Self {
        self.processors.push(Box::new(processor));
        self
    }

    /// Registers a sink; sinks receive records in registration order.
    pub fn sink(mut self, sink: Arc<dyn Sink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Finalizes the chain.
    pub fn build(self) -> Pipeline {
        Pipeline {
            processors: self.processors,
            renderer: self.renderer,
            sinks: self.sinks,
        }
    }
}
