//! Event-set decoration.
//!
//! An event set is a named collection of visual markers keyed by a
//! `(domain, action, status)` attribute tuple or by a logger-name prefix.
//! When enabled, the matching marker is prepended to the event message —
//! `[→]`, `🔍`, whatever the set defines. When disabled the processor is a
//! silent no-op, so callers never branch on whether decoration is active.

use super::{Outcome, Processor};
use foundation_core::{LogRecord, Value};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// One decoration rule inside an event set.
#[derive(Debug, Clone, Default)]
pub struct EventMapping {
    /// Matches the record's `domain` attribute, when set.
    pub domain: Option<String>,
    /// Matches the record's `action` attribute, when set.
    pub action: Option<String>,
    /// Matches the record's `status` attribute, when set.
    pub status: Option<String>,
    /// Matches a dotted logger-name prefix, when set.
    pub logger_prefix: Option<String>,
    /// The marker prepended to matching events.
    pub marker: String,
}

impl EventMapping {
    /// A rule matching on the attribute tuple.
    pub fn for_tuple(
        domain: impl Into<String>,
        action: Option<&str>,
        status: Option<&str>,
        marker: impl Into<String>,
    ) -> Self {
        EventMapping {
            domain: Some(domain.into()),
            action: action.map(str::to_owned),
            status: status.map(str::to_owned),
            logger_prefix: None,
            marker: marker.into(),
        }
    }

    /// A rule matching on a logger-name prefix.
    pub fn for_logger_prefix(prefix: impl Into<String>, marker: impl Into<String>) -> Self {
        EventMapping {
            domain: None,
            action: None,
            status: None,
            logger_prefix: Some(prefix.into()),
            marker: marker.into(),
        }
    }

    fn matches(&self, record: &LogRecord) -> bool {
        let attr = |key: &str| -> Option<&str> {
            record.attributes().get(key).and_then(Value::as_str)
        };
        if let Some(prefix) = &self.logger_prefix {
            if !record.logger().starts_with(prefix.as_str()) {
                return false;
            }
        }
        if let Some(domain) = &self.domain {
            if attr("domain") != Some(domain.as_str()) {
                return false;
            }
        }
        if let Some(action) = &self.action {
            if attr("action") != Some(action.as_str()) {
                return false;
            }
        }
        if let Some(status) = &self.status {
            if attr("status") != Some(status.as_str()) {
                return false;
            }
        }
        // A mapping with no constraints at all never matches.
        self.logger_prefix.is_some()
            || self.domain.is_some()
            || self.action.is_some()
            || self.status.is_some()
    }
}

/// A named, ordered collection of [`EventMapping`]s.
#[derive(Debug, Clone)]
pub struct EventSet {
    /// The set's registry name.
    pub name: String,
    /// Rules, consulted in order; the first match wins.
    pub mappings: Vec<EventMapping>,
}

impl EventSet {
    /// The built-in HTTP set.
    pub fn http() -> Self {
        EventSet {
            name: "http".to_owned(),
            mappings: vec![
                EventMapping::for_tuple("http", Some("request"), None, "🔸"),
                EventMapping::for_tuple("http", Some("response"), Some("error"), "🔴"),
                EventMapping::for_tuple("http", Some("response"), None, "🔹"),
                EventMapping::for_tuple("http", None, None, "🌐"),
            ],
        }
    }

    /// The built-in database set.
    pub fn db() -> Self {
        EventSet {
            name: "db".to_owned(),
            mappings: vec![
                EventMapping::for_tuple("db", Some("query"), None, "🔍"),
                EventMapping::for_tuple("db", Some("commit"), None, "💾"),
                EventMapping::for_tuple("db", None, Some("error"), "🔴"),
                EventMapping::for_tuple("db", None, None, "🗄️"),
            ],
        }
    }

    /// The built-in task set.
    pub fn task() -> Self {
        EventSet {
            name: "task".to_owned(),
            mappings: vec![
                EventMapping::for_tuple("task", Some("start"), None, "▶️"),
                EventMapping::for_tuple("task", Some("finish"), Some("error"), "🔴"),
                EventMapping::for_tuple("task", Some("finish"), None, "✅"),
                EventMapping::for_tuple("task", None, None, "⚙️"),
            ],
        }
    }
}

/// The registered event sets, consulted in registration order.
#[derive(Default)]
pub struct EventSetRegistry {
    sets: RwLock<Vec<Arc<EventSet>>>,
    enabled: AtomicBool,
}

impl EventSetRegistry {
    /// An empty, disabled registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a set; later sets are consulted after earlier ones.
    pub fn register(&self, set: EventSet) {
        self.sets.write().push(Arc::new(set));
    }

    /// Enables or disables decoration globally.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    /// Whether decoration is active.
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// The first matching marker for `record`, if any.
    pub fn marker_for(&self, record: &LogRecord) -> Option<String> {
        let sets = self.sets.read();
        for set in sets.iter() {
            for mapping in &set.mappings {
                if mapping.matches(record) {
                    return Some(mapping.marker.clone());
                }
            }
        }
        None
    }

    /// Drops every set and disables decoration. Test scope only.
    pub fn reset(&self) {
        self.sets.write().clear();
        self.enabled.store(false, Ordering::Relaxed);
    }
}

impl std::fmt::Debug for EventSetRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSetRegistry")
            .field("sets", &self.sets.read().len())
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

/// The processor applying event-set markers.
pub struct EventSetProcessor {
    registry: Arc<EventSetRegistry>,
}

impl EventSetProcessor {
    /// A processor reading from `registry`.
    pub fn new(registry: Arc<EventSetRegistry>) -> Self {
        EventSetProcessor { registry }
    }
}

impl Processor for EventSetProcessor {
    fn name(&self) -> &'static str {
        "event_sets"
    }

    fn process(&self, record: &mut LogRecord) -> Outcome {
        if self.registry.is_enabled() {
            if let Some(marker) = self.registry.marker_for(record) {
                record.decorate_event(&marker);
            }
        }
        Outcome::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use foundation_core::{attrs, Level};

    fn registry() -> Arc<EventSetRegistry> {
        let registry = Arc::new(EventSetRegistry::new());
        registry.register(EventSet::http());
        registry.register(EventSet::db());
        registry.set_enabled(true);
        registry
    }

    #[test]
    fn tuple_selection_picks_the_first_match() {
        let processor = EventSetProcessor::new(registry());
        let mut record = LogRecord::new(
            "app.web",
            Level::Info,
            "handled",
            attrs! { "domain" => "http", "action" => "response", "status" => "error" },
        );
        processor.process(&mut record);
        assert!(record.event().starts_with("🔴 "));
    }

    #[test]
    fn domain_only_falls_back_to_the_general_marker() {
        let processor = EventSetProcessor::new(registry());
        let mut record = LogRecord::new(
            "app.web",
            Level::Info,
            "connected",
            attrs! { "domain" => "http" },
        );
        processor.process(&mut record);
        assert!(record.event().starts_with("🌐 "));
    }

    #[test]
    fn logger_prefix_selection() {
        let registry = Arc::new(EventSetRegistry::new());
        registry.register(EventSet {
            name: "net".to_owned(),
            mappings: vec![EventMapping::for_logger_prefix("app.net", "[net]")],
        });
        registry.set_enabled(true);
        let processor = EventSetProcessor::new(registry);
        let mut record = LogRecord::new("app.net.conn", Level::Info, "opened", attrs! {});
        processor.process(&mut record);
        assert_eq!(record.event(), "[net] opened");
    }

    #[test]
    fn disabled_registry_is_a_silent_no_op() {
        let registry = registry();
        registry.set_enabled(false);
        let processor = EventSetProcessor::new(registry);
        let mut record = LogRecord::new(
            "app.web",
            Level::Info,
            "handled",
            attrs! { "domain" => "http" },
        );
        processor.process(&mut record);
        assert_eq!(record.event(), "handled");
    }

    #[test]
    fn unrelated_records_are_untouched() {
        let processor = EventSetProcessor::new(registry());
        let mut record = LogRecord::new("app.other", Level::Info, "plain", attrs! {});
        processor.process(&mut record);
        assert_eq!(record.event(), "plain");
    }
}
