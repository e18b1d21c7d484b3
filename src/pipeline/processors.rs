//! The enrichment processors: context merge, service metadata, trace
//! correlation.

use super::{Outcome, Processor};
use crate::context;
use foundation_core::{AttributeMap, LogRecord};

/// Copies the thread's scoped context map into each record.
///
/// Attributes passed at the call site win over context entries with the
/// same key.
#[derive(Debug, Default)]
pub struct ContextMergeProcessor;

impl ContextMergeProcessor {
    /// A context-merge processor.
    pub fn new() -> Self {
        ContextMergeProcessor
    }
}

impl Processor for ContextMergeProcessor {
    fn name(&self) -> &'static str {
        "context_merge"
    }

    fn process(&self, record: &mut LogRecord) -> Outcome {
        let context = context::current_context();
        if !context.is_empty() {
            let attributes = record.attributes_mut();
            for (key, value) in context.iter() {
                attributes.insert_if_absent(key, value.clone());
            }
        }
        Outcome::Continue
    }
}

/// Adds service metadata to every record.
///
/// The metadata is computed once at pipeline construction — service
/// identity does not change while the process runs.
#[derive(Debug)]
pub struct EnrichmentProcessor {
    metadata: AttributeMap,
}

impl EnrichmentProcessor {
    /// Builds the cached metadata map. `None` fields are omitted.
    pub fn new(
        service_name: Option<&str>,
        service_version: Option<&str>,
        environment: Option<&str>,
    ) -> Self {
        let mut metadata = AttributeMap::new();
        if let Some(name) = service_name {
            metadata.insert("service", name);
        }
        if let Some(version) = service_version {
            metadata.insert("version", version);
        }
        if let Some(environment) = environment {
            metadata.insert("env", environment);
        }
        if let Ok(hostname) = std::env::var("HOSTNAME") {
            if !hostname.is_empty() {
                metadata.insert("hostname", hostname);
            }
        }
        metadata.insert("pid", u64::from(std::process::id()));
        EnrichmentProcessor { metadata }
    }
}

impl Processor for EnrichmentProcessor {
    fn name(&self) -> &'static str {
        "enrichment"
    }

    fn process(&self, record: &mut LogRecord) -> Outcome {
        let attributes = record.attributes_mut();
        for (key, value) in self.metadata.iter() {
            attributes.insert_if_absent(key, value.clone());
        }
        Outcome::Continue
    }
}

/// Injects the thread's trace context into records that lack one.
#[derive(Debug, Default)]
pub struct TraceContextProcessor;

impl TraceContextProcessor {
    /// A trace-context processor.
    pub fn new() -> Self {
        TraceContextProcessor
    }
}

impl Processor for TraceContextProcessor {
    fn name(&self) -> &'static str {
        "trace_context"
    }

    fn process(&self, record: &mut LogRecord) -> Outcome {
        if record.trace_id().is_none() {
            if let Some(trace) = context::current_trace() {
                record.set_trace_context(Some(trace.trace_id), trace.span_id);
            }
        }
        Outcome::Continue
    }
}
