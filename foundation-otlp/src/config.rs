//! Export configuration: resource attributes and endpoint construction.

use foundation_core::{FoundationError, Result, Value};
use std::time::Duration;

/// Configuration for the OTLP sink.
#[derive(Debug, Clone)]
pub struct OtlpConfig {
    /// Base endpoint, e.g. `https://collector.example.com:4318`. The
    /// `/v1/logs` signal path is appended when absent.
    pub endpoint: String,
    /// Headers sent with every export (`authorization` et al.).
    pub headers: Vec<(String, String)>,
    /// `service.name` — required.
    pub service_name: String,
    /// `service.version`.
    pub service_version: Option<String>,
    /// `deployment.environment`.
    pub environment: Option<String>,
    /// Flush once this many records are buffered.
    pub batch_size: usize,
    /// Flush at least this often while records are buffered.
    pub flush_interval: Duration,
    /// Per-batch delivery deadline.
    pub export_timeout: Duration,
    /// Bound on records queued to the worker.
    pub queue_limit: usize,
}

impl OtlpConfig {
    /// A config with the default batching parameters.
    pub fn new(endpoint: impl Into<String>, service_name: impl Into<String>) -> Self {
        OtlpConfig {
            endpoint: endpoint.into(),
            headers: Vec::new(),
            service_name: service_name.into(),
            service_version: None,
            environment: None,
            batch_size: 512,
            flush_interval: Duration::from_secs(5),
            export_timeout: Duration::from_secs(10),
            queue_limit: 2048,
        }
    }

    /// Validates the config and builds the resource attribute list.
    ///
    /// `service.name` must be non-empty; the optional attributes are
    /// included only when present.
    pub fn resource_attributes(&self) -> Result<Vec<(String, Value)>> {
        if self.service_name.trim().is_empty() {
            return Err(FoundationError::configuration(
                "otlp export requires a service name",
            )
            .with_context("config.field", "service_name"));
        }
        let mut attributes = vec![(
            "service.name".to_owned(),
            Value::Str(self.service_name.clone()),
        )];
        if let Some(version) = &self.service_version {
            attributes.push(("service.version".to_owned(), Value::Str(version.clone())));
        }
        if let Some(environment) = &self.environment {
            attributes.push((
                "deployment.environment".to_owned(),
                Value::Str(environment.clone()),
            ));
        }
        Ok(attributes)
    }

    /// The full logs endpoint, with the signal path appended when absent.
    pub fn logs_endpoint(&self) -> String {
        build_endpoint(&self.endpoint, "logs")
    }
}

/// Appends `/v1/{signal}` to a base URL unless it is already there.
///
/// Idempotent: feeding the output back in returns it unchanged.
pub fn build_endpoint(base: &str, signal: &str) -> String {
    let trimmed = base.trim_end_matches('/');
    let suffix = format!("/v1/{}", signal);
    if trimmed.ends_with(&suffix) {
        trimmed.to_owned()
    } else {
        format!("{}{}", trimmed, suffix)
    }
}
