//! The error taxonomy.
//!
//! Every error produced by this workspace carries a [`ErrorKind`], a stable
//! machine-readable code, a human message, an ordered context map with
//! dot-namespaced keys (`http.status`, `aws.region`), and an optional cause.
//! Context attaches by consuming and returning the same instance, so chained
//! construction reads naturally and no context is ever shared between
//! instances.

use crate::value::Value;
use std::error::Error as StdError;
use std::fmt;

/// Classifies an error for propagation and retry decisions.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A configuration field was missing, malformed, or unresolvable.
    Configuration,
    /// User input violated a validation predicate.
    Validation,
    /// A referenced resource does not exist.
    NotFound,
    /// A resource with the same identity already exists.
    AlreadyExists,
    /// An operation was attempted in an invalid state.
    InvalidState,
    /// A network-level failure.
    Network,
    /// An operation exceeded its deadline.
    Timeout,
    /// The remote side asked us to slow down.
    RateLimited,
    /// Authentication or authorization failed.
    Auth,
    /// A concurrency contract was violated (lock contention, DI cycle).
    Concurrency,
    /// The operation was cancelled before completion.
    Cancelled,
    /// An internal invariant was violated.
    Internal,
}

impl ErrorKind {
    /// The default stable code for this kind.
    pub fn default_code(self) -> &'static str {
        match self {
            ErrorKind::Configuration => "FND_CONFIG",
            ErrorKind::Validation => "FND_VALIDATION",
            ErrorKind::NotFound => "FND_NOT_FOUND",
            ErrorKind::AlreadyExists => "FND_ALREADY_EXISTS",
            ErrorKind::InvalidState => "FND_INVALID_STATE",
            ErrorKind::Network => "FND_NETWORK",
            ErrorKind::Timeout => "FND_TIMEOUT",
            ErrorKind::RateLimited => "FND_RATE_LIMITED",
            ErrorKind::Auth => "FND_AUTH",
            ErrorKind::Concurrency => "FND_CONCURRENCY",
            ErrorKind::Cancelled => "FND_CANCELLED",
            ErrorKind::Internal => "FND_INTERNAL",
        }
    }

    /// Whether errors of this kind are retryable by default.
    ///
    /// Infrastructure failures are worth retrying; authentication and user
    /// errors are not.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            ErrorKind::Network | ErrorKind::Timeout | ErrorKind::RateLimited
        )
    }

    fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Configuration => "configuration",
            ErrorKind::Validation => "validation",
            ErrorKind::NotFound => "not_found",
            ErrorKind::AlreadyExists => "already_exists",
            ErrorKind::InvalidState => "invalid_state",
            ErrorKind::Network => "network",
            ErrorKind::Timeout => "timeout",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::Auth => "auth",
            ErrorKind::Concurrency => "concurrency",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// The workspace-wide error type.
#[derive(Debug, thiserror::Error)]
#[error("[{code}] {message}")]
pub struct FoundationError {
    kind: ErrorKind,
    code: String,
    message: String,
    context: Vec<(String, Value)>,
    #[source]
    cause: Option<Box<dyn StdError + Send + Sync + 'static>>,
}

impl FoundationError {
    /// Creates an error of the given kind with the kind's default code.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        FoundationError {
            kind,
            code: kind.default_code().to_owned(),
            message: message.into(),
            context: Vec::new(),
            cause: None,
        }
    }

    /// A configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, message)
    }

    /// A validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    /// A not-found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    /// An already-exists error.
    pub fn already_exists(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AlreadyExists, message)
    }

    /// An invalid-state error.
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidState, message)
    }

    /// A network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Network, message)
    }

    /// A timeout error.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message)
    }

    /// An authentication/authorization error.
    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Auth, message)
    }

    /// A concurrency-contract error.
    pub fn concurrency(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Concurrency, message)
    }

    /// A cancellation error.
    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Cancelled, message)
    }

    /// An internal invariant violation.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    /// Overrides the stable code.
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = code.into();
        self
    }

    /// Attaches a dot-namespaced context entry, returning the same instance.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let key = key.into();
        let value = value.into();
        if let Some(existing) = self.context.iter_mut().find(|(k, _)| *k == key) {
            existing.1 = value;
        } else {
            self.context.push((key, value));
        }
        self
    }

    /// Attaches an underlying cause.
    pub fn with_cause(mut self, cause: impl StdError + Send + Sync + 'static) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// The error's kind.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// The stable machine-readable code.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// The human message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Looks up a context entry.
    pub fn context(&self, key: &str) -> Option<&Value> {
        self.context
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// Iterates context entries in attachment order.
    pub fn context_entries(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.context.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Whether this error is worth retrying, by kind.
    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }

    /// Serializes to a structured [`Value`].
    ///
    /// Lossless except for stack frames of the cause chain, which collapse
    /// to their display messages.
    pub fn to_value(&self) -> Value {
        let mut entries = vec![
            ("kind".to_owned(), Value::Str(self.kind.as_str().to_owned())),
            ("code".to_owned(), Value::Str(self.code.clone())),
            ("message".to_owned(), Value::Str(self.message.clone())),
        ];
        if !self.context.is_empty() {
            entries.push(("context".to_owned(), Value::Map(self.context.clone())));
        }
        let mut causes = Vec::new();
        let mut source = StdError::source(self);
        while let Some(cause) = source {
            causes.push(Value::Str(cause.to_string()));
            source = cause.source();
        }
        if !causes.is_empty() {
            entries.push(("cause_chain".to_owned(), Value::List(causes)));
        }
        Value::Map(entries)
    }
}

/// Shorthand result alias used across the workspace.
pub type Result<T, E = FoundationError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("socket closed")]
    struct SocketClosed;

    #[test]
    fn context_attaches_to_the_same_instance() {
        let err = FoundationError::network("request failed")
            .with_context("http.status", 503)
            .with_context("http.method", "GET");
        assert_eq!(err.context("http.status"), Some(&Value::Int(503)));
        assert_eq!(
            err.context("http.method").and_then(|v| v.as_str()),
            Some("GET")
        );
    }

    #[test]
    fn context_is_not_shared_between_instances() {
        let a = FoundationError::network("one").with_context("n", 1);
        let b = FoundationError::network("two");
        assert!(a.context("n").is_some());
        assert!(b.context("n").is_none());
    }

    #[test]
    fn retryability_follows_kind() {
        assert!(FoundationError::network("x").is_retryable());
        assert!(FoundationError::timeout("x").is_retryable());
        assert!(!FoundationError::auth("x").is_retryable());
        assert!(!FoundationError::validation("x").is_retryable());
    }

    #[test]
    fn serializes_with_cause_chain() {
        let err = FoundationError::network("request failed")
            .with_context("http.status", 503)
            .with_cause(SocketClosed);
        match err.to_value() {
            Value::Map(entries) => {
                let keys: Vec<_> = entries.iter().map(|(k, _)| k.as_str()).collect();
                assert_eq!(keys, vec!["kind", "code", "message", "context", "cause_chain"]);
            }
            other => panic!("expected map, got {:?}", other),
        }
    }

    #[test]
    fn display_includes_code_and_message() {
        let err = FoundationError::not_found("no such component").with_code("REG_404");
        assert_eq!(err.to_string(), "[REG_404] no such component");
    }
}
