//! An in-process, synchronous event bus.
//!
//! The bus exists to break the cycle between the registry and the logger:
//! registry mutations publish events here, and the Hub subscribes a handler
//! that turns them into log records. The registry itself never imports the
//! logger.
//!
//! Handlers run on the emitting thread, in registration order. A panicking
//! handler is isolated and reported on stderr — never through the logger,
//! which could recurse.

use crate::attributes::AttributeMap;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// Well-known topics published by the workspace itself.
pub mod topics {
    /// A component was added to a registry.
    pub const COMPONENT_REGISTERED: &str = "component.registered";
    /// A component was removed from a registry.
    pub const COMPONENT_REMOVED: &str = "component.removed";
    /// A command was added to a registry.
    pub const COMMAND_REGISTERED: &str = "command.registered";
    /// A command was removed from a registry.
    pub const COMMAND_REMOVED: &str = "command.removed";
}

/// A published event: a topic plus structured fields.
#[derive(Debug, Clone)]
pub struct BusEvent {
    /// The topic this event was published under.
    pub topic: String,
    /// Structured payload fields.
    pub fields: AttributeMap,
}

type Handler = dyn Fn(&BusEvent) + Send + Sync + 'static;

/// A synchronous publish/subscribe bus.
#[derive(Default)]
pub struct EventBus {
    subscribers: RwLock<HashMap<String, Vec<Arc<Handler>>>>,
}

impl EventBus {
    /// Returns an empty bus.
    pub fn new() -> Self {
        EventBus {
            subscribers: RwLock::new(HashMap::new()),
        }
    }

    /// Registers a handler for `topic`. Handlers for the same topic are
    /// invoked in registration order.
    pub fn subscribe(
        &self,
        topic: impl Into<String>,
        handler: impl Fn(&BusEvent) + Send + Sync + 'static,
    ) {
        self.subscribers
            .write()
            .entry(topic.into())
            .or_default()
            .push(Arc::new(handler));
    }

    /// Publishes `fields` under `topic`, invoking subscribed handlers on the
    /// calling thread.
    pub fn emit(&self, topic: &str, fields: AttributeMap) {
        // Snapshot the handler list so no lock is held while user code runs.
        let handlers: Vec<Arc<Handler>> = match self.subscribers.read().get(topic) {
            Some(handlers) => handlers.clone(),
            None => return,
        };
        let event = BusEvent {
            topic: topic.to_owned(),
            fields,
        };
        for handler in handlers {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| handler(&event))) {
                let what = payload
                    .downcast_ref::<&str>()
                    .map(|s| (*s).to_owned())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "non-string panic payload".to_owned());
                eprintln!("event handler for {:?} panicked: {}", topic, what);
            }
        }
    }

    /// Number of handlers subscribed to `topic`.
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.subscribers
            .read()
            .get(topic)
            .map(|h| h.len())
            .unwrap_or(0)
    }

    /// Drops all subscriptions. Test scope only.
    pub fn reset(&self) {
        self.subscribers.write().clear();
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let subscribers = self.subscribers.read();
        f.debug_struct("EventBus")
            .field("topics", &subscribers.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attrs;
    use parking_lot::Mutex;

    #[test]
    fn handlers_run_in_registration_order() {
        let bus = EventBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for tag in ["first", "second", "third"] {
            let order = order.clone();
            bus.subscribe("t", move |_| order.lock().push(tag));
        }
        bus.emit("t", attrs! {});
        assert_eq!(*order.lock(), vec!["first", "second", "third"]);
    }

    #[test]
    fn panicking_handler_does_not_poison_the_bus() {
        let bus = EventBus::new();
        let reached = Arc::new(Mutex::new(false));
        bus.subscribe("t", |_| panic!("boom"));
        {
            let reached = reached.clone();
            bus.subscribe("t", move |_| *reached.lock() = true);
        }
        bus.emit("t", attrs! {});
        assert!(*reached.lock());
        // The bus stays usable afterwards.
        bus.emit("t", attrs! {});
    }

    #[test]
    fn emit_without_subscribers_is_a_no_op() {
        let bus = EventBus::new();
        bus.emit("nobody.home", attrs! { "k" => 1 });
    }

    #[test]
    fn events_carry_fields() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(None));
        {
            let seen = seen.clone();
            bus.subscribe(topics::COMPONENT_REGISTERED, move |event| {
                *seen.lock() = event.fields.get("name").and_then(|v| v.as_str().map(String::from));
            });
        }
        bus.emit(topics::COMPONENT_REGISTERED, attrs! { "name" => "csv" });
        assert_eq!(seen.lock().as_deref(), Some("csv"));
    }
}
