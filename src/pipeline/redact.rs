//! Secret scrubbing.

use super::{Outcome, Processor};
use foundation_core::{LogRecord, Value};
use regex::Regex;
use std::collections::HashSet;

const REPLACEMENT: &str = "[REDACTED]";

/// Which attribute names and value shapes count as secrets.
#[derive(Debug, Clone)]
pub struct RedactionPolicy {
    // Lowercased exact names.
    field_names: HashSet<String>,
    patterns: Vec<Regex>,
}

impl RedactionPolicy {
    /// An empty policy that redacts nothing.
    pub fn empty() -> Self {
        RedactionPolicy {
            field_names: HashSet::new(),
            patterns: Vec::new(),
        }
    }

    /// The default deny-list: common credential field names plus bearer
    /// tokens embedded in string values.
    pub fn standard() -> Self {
        let mut policy = Self::empty();
        for name in [
            "password",
            "passwd",
            "secret",
            "token",
            "api_key",
            "apikey",
            "authorization",
            "private_key",
        ] {
            policy = policy.field_name(name);
        }
        policy.pattern(r"(?i)bearer\s+[a-z0-9._~+/=-]+")
    }

    /// Adds an attribute name (case-insensitive) whose value is replaced
    /// wholesale.
    pub fn field_name(mut self, name: impl AsRef<str>) -> Self {
        self.field_names.insert(name.as_ref().to_ascii_lowercase());
        self
    }

    /// Adds a regex whose matches are replaced inside string values.
    ///
    /// # Panics
    ///
    /// Panics on an invalid pattern; redaction policies are built from
    /// literals at configuration time.
    pub fn pattern(mut self, pattern: &str) -> Self {
        self.patterns
            .push(Regex::new(pattern).expect("invalid redaction pattern"));
        self
    }

    fn scrub_value(&self, value: &mut Value) {
        match value {
            Value::Str(s) => {
                for pattern in &self.patterns {
                    if pattern.is_match(s) {
                        *s = pattern.replace_all(s, REPLACEMENT).into_owned();
                    }
                }
            }
            Value::List(items) => {
                for item in items {
                    self.scrub_value(item);
                }
            }
            Value::Map(entries) => {
                for (key, nested) in entries {
                    if self.field_names.contains(&key.to_ascii_lowercase()) {
                        *nested = Value::Str(REPLACEMENT.to_owned());
                    } else {
                        self.scrub_value(nested);
                    }
                }
            }
            _ => {}
        }
    }

    /// Scrubs one record's attributes in place.
    pub fn scrub(&self, record: &mut LogRecord) {
        let attributes = record.attributes_mut();
        let keys: Vec<String> = attributes.iter().map(|(k, _)| k.to_owned()).collect();
        for key in keys {
            if self.field_names.contains(&key.to_ascii_lowercase()) {
                attributes.insert(key, Value::Str(REPLACEMENT.to_owned()));
            } else if let Some(value) = attributes.get_mut(&key) {
                self.scrub_value(value);
            }
        }
    }
}

/// The processor applying a [`RedactionPolicy`].
#[derive(Debug)]
pub struct RedactionProcessor {
    policy: RedactionPolicy,
}

impl RedactionProcessor {
    /// A processor applying `policy`.
    pub fn new(policy: RedactionPolicy) -> Self {
        RedactionProcessor { policy }
    }
}

impl Processor for RedactionProcessor {
    fn name(&self) -> &'static str {
        "redaction"
    }

    fn process(&self, record: &mut LogRecord) -> Outcome {
        self.policy.scrub(record);
        Outcome::Continue
    }
}
