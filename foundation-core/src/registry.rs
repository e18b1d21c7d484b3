//! A multi-dimensional, thread-safe name registry.
//!
//! A [`Registry`] stores `(dimension, name) → (value, metadata)` with
//! optional aliases. A dimension is a logical namespace — `component`,
//! `command`, `eventset` — so one registry can serve several catalogs
//! without the names colliding.
//!
//! All mutation goes through a single writer lock; lookups take the reader
//! lock; [`Registry::list_dimension`] returns a snapshot so the lock is
//! never held while the caller processes entries. Mutations publish
//! `<dimension>.registered` / `<dimension>.removed` events on the attached
//! [`EventBus`] — the registry never logs directly.

use crate::attributes::AttributeMap;
use crate::attrs;
use crate::bus::EventBus;
use crate::error::{FoundationError, Result};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A logical namespace within a registry.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Dimension(&'static str);

impl Dimension {
    /// The dimension holding pluggable components.
    pub const COMPONENT: Dimension = Dimension("component");
    /// The dimension holding CLI commands.
    pub const COMMAND: Dimension = Dimension("command");
    /// The dimension holding event-set decorations.
    pub const EVENT_SET: Dimension = Dimension("eventset");

    /// A caller-defined dimension.
    pub const fn new(name: &'static str) -> Self {
        Dimension(name)
    }

    /// The dimension's name.
    pub fn as_str(self) -> &'static str {
        self.0
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.0)
    }
}

#[derive(Debug, Clone)]
struct Entry<T> {
    value: T,
    aliases: Vec<String>,
    metadata: AttributeMap,
}

#[derive(Debug, Default)]
struct Inner<T> {
    entries: HashMap<(Dimension, String), Entry<T>>,
    // Alias → canonical name, resolved once at registration time.
    aliases: HashMap<(Dimension, String), String>,
}

/// A thread-safe `(dimension, name) → value` store with aliases and
/// metadata.
pub struct Registry<T> {
    inner: RwLock<Inner<T>>,
    bus: Option<Arc<EventBus>>,
}

impl<T: Clone> Registry<T> {
    /// A registry that publishes no events.
    pub fn new() -> Self {
        Registry {
            inner: RwLock::new(Inner {
                entries: HashMap::new(),
                aliases: HashMap::new(),
            }),
            bus: None,
        }
    }

    /// A registry that publishes mutation events on `bus`.
    pub fn with_bus(bus: Arc<EventBus>) -> Self {
        Registry {
            inner: RwLock::new(Inner {
                entries: HashMap::new(),
                aliases: HashMap::new(),
            }),
            bus: Some(bus),
        }
    }

    /// Registers `value` under `(dimension, name)`.
    ///
    /// Returns an `AlreadyExists` error if the canonical name or any alias
    /// is taken; the original entry is left unchanged.
    pub fn register(
        &self,
        dimension: Dimension,
        name: impl Into<String>,
        value: T,
        aliases: Vec<String>,
        metadata: AttributeMap,
    ) -> Result<()> {
        let name = name.into();
        {
            let mut inner = self.inner.write();
            if inner.entries.contains_key(&(dimension, name.clone())) {
                return Err(FoundationError::already_exists(format!(
                    "{} {:?} is already registered",
                    dimension, name
                ))
                .with_context("registry.dimension", dimension.as_str())
                .with_context("registry.name", name.as_str()));
            }
            for alias in &aliases {
                let taken = inner.aliases.contains_key(&(dimension, alias.clone()))
                    || inner.entries.contains_key(&(dimension, alias.clone()));
                if taken {
                    return Err(FoundationError::already_exists(format!(
                        "alias {:?} already resolves within {}",
                        alias, dimension
                    ))
                    .with_context("registry.dimension", dimension.as_str())
                    .with_context("registry.alias", alias.as_str()));
                }
            }
            for alias in &aliases {
                inner
                    .aliases
                    .insert((dimension, alias.clone()), name.clone());
            }
            inner.entries.insert(
                (dimension, name.clone()),
                Entry {
                    value,
                    aliases,
                    metadata,
                },
            );
        }
        // Publish after the write lock is released; the bus owns its own
        // lock and we never hold two at once.
        if let Some(bus) = &self.bus {
            bus.emit(
                &format!("{}.registered", dimension),
                attrs! {
                    "dimension" => dimension.as_str(),
                    "name" => name,
                },
            );
        }
        Ok(())
    }

    /// Looks up a value by canonical name or alias.
    pub fn get(&self, dimension: Dimension, name: &str) -> Option<T> {
        let inner = self.inner.read();
        let canonical = Self::canonicalize(&inner, dimension, name);
        inner
            .entries
            .get(&(dimension, canonical))
            .map(|entry| entry.value.clone())
    }

    /// True if `(dimension, name)` resolves to an entry.
    pub fn has(&self, dimension: Dimension, name: &str) -> bool {
        let inner = self.inner.read();
        let canonical = Self::canonicalize(&inner, dimension, name);
        inner.entries.contains_key(&(dimension, canonical))
    }

    /// Returns an entry's metadata.
    pub fn get_metadata(&self, dimension: Dimension, name: &str) -> Option<AttributeMap> {
        let inner = self.inner.read();
        let canonical = Self::canonicalize(&inner, dimension, name);
        inner
            .entries
            .get(&(dimension, canonical))
            .map(|entry| entry.metadata.clone())
    }

    /// Removes an entry (and its aliases) by canonical name or alias.
    ///
    /// Returns the removed value, or `None` if nothing resolved.
    pub fn remove(&self, dimension: Dimension, name: &str) -> Option<T> {
        let removed = {
            let mut inner = self.inner.write();
            let canonical = Self::canonicalize(&inner, dimension, name);
            let entry = inner.entries.remove(&(dimension, canonical.clone()))?;
            for alias in &entry.aliases {
                inner.aliases.remove(&(dimension, alias.clone()));
            }
            (canonical, entry.value)
        };
        if let Some(bus) = &self.bus {
            bus.emit(
                &format!("{}.removed", dimension),
                attrs! {
                    "dimension" => dimension.as_str(),
                    "name" => removed.0,
                },
            );
        }
        Some(removed.1)
    }

    /// Returns a snapshot of `(name, value)` pairs in a dimension.
    pub fn list_dimension(&self, dimension: Dimension) -> Vec<(String, T)> {
        let inner = self.inner.read();
        let mut entries: Vec<(String, T)> = inner
            .entries
            .iter()
            .filter(|((dim, _), _)| *dim == dimension)
            .map(|((_, name), entry)| (name.clone(), entry.value.clone()))
            .collect();
        entries.sort_by(|(a, _), (b, _)| a.cmp(b));
        entries
    }

    /// Number of entries in a dimension.
    pub fn len(&self, dimension: Dimension) -> usize {
        self.inner
            .read()
            .entries
            .keys()
            .filter(|(dim, _)| *dim == dimension)
            .count()
    }

    /// Drops every entry and alias. Test scope only.
    pub fn reset(&self) {
        let mut inner = self.inner.write();
        inner.entries.clear();
        inner.aliases.clear();
    }

    fn canonicalize(inner: &Inner<T>, dimension: Dimension, name: &str) -> String {
        inner
            .aliases
            .get(&(dimension, name.to_owned()))
            .cloned()
            .unwrap_or_else(|| name.to_owned())
    }
}

impl<T: Clone> Default for Registry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Registry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("Registry")
            .field("entries", &inner.entries.len())
            .field("aliases", &inner.aliases.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::topics;
    use crate::error::ErrorKind;
    use parking_lot::Mutex;

    #[test]
    fn register_then_get() {
        let registry = Registry::new();
        registry
            .register(Dimension::COMPONENT, "csv", 1u32, vec![], attrs! {})
            .unwrap();
        assert_eq!(registry.get(Dimension::COMPONENT, "csv"), Some(1));
        assert!(registry.has(Dimension::COMPONENT, "csv"));
        assert_eq!(registry.get(Dimension::COMPONENT, "json"), None);
    }

    #[test]
    fn duplicate_registration_preserves_original() {
        let registry = Registry::new();
        registry
            .register(Dimension::COMPONENT, "csv", 1u32, vec![], attrs! {})
            .unwrap();
        let err = registry
            .register(Dimension::COMPONENT, "csv", 2u32, vec![], attrs! {})
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
        assert_eq!(registry.get(Dimension::COMPONENT, "csv"), Some(1));
    }

    #[test]
    fn aliases_resolve_to_canonical() {
        let registry = Registry::new();
        registry
            .register(
                Dimension::COMPONENT,
                "csv",
                7u32,
                vec!["csv_reader".to_owned()],
                attrs! {},
            )
            .unwrap();
        assert_eq!(registry.get(Dimension::COMPONENT, "csv_reader"), Some(7));
        assert!(registry.has(Dimension::COMPONENT, "csv_reader"));
        // Removing via the alias removes the canonical entry too.
        assert_eq!(registry.remove(Dimension::COMPONENT, "csv_reader"), Some(7));
        assert!(!registry.has(Dimension::COMPONENT, "csv"));
    }

    #[test]
    fn dimensions_are_isolated() {
        let registry = Registry::new();
        registry
            .register(Dimension::COMPONENT, "x", 1u32, vec![], attrs! {})
            .unwrap();
        registry
            .register(Dimension::COMMAND, "x", 2u32, vec![], attrs! {})
            .unwrap();
        assert_eq!(registry.get(Dimension::COMPONENT, "x"), Some(1));
        assert_eq!(registry.get(Dimension::COMMAND, "x"), Some(2));
    }

    #[test]
    fn list_dimension_returns_sorted_snapshot() {
        let registry = Registry::new();
        for (name, value) in [("b", 2u32), ("a", 1), ("c", 3)] {
            registry
                .register(Dimension::COMPONENT, name, value, vec![], attrs! {})
                .unwrap();
        }
        let listed = registry.list_dimension(Dimension::COMPONENT);
        assert_eq!(
            listed,
            vec![
                ("a".to_owned(), 1),
                ("b".to_owned(), 2),
                ("c".to_owned(), 3)
            ]
        );
    }

    #[test]
    fn registration_publishes_on_the_bus() {
        let bus = Arc::new(EventBus::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        {
            let seen = seen.clone();
            bus.subscribe(topics::COMPONENT_REGISTERED, move |event| {
                seen.lock().push(
                    event
                        .fields
                        .get("name")
                        .and_then(|v| v.as_str().map(String::from))
                        .unwrap_or_default(),
                );
            });
        }
        let registry = Registry::with_bus(bus);
        registry
            .register(Dimension::COMPONENT, "csv", 1u32, vec![], attrs! {})
            .unwrap();
        assert_eq!(*seen.lock(), vec!["csv".to_owned()]);
    }

    #[test]
    fn metadata_is_preserved() {
        let registry = Registry::new();
        registry
            .register(
                Dimension::COMPONENT,
                "csv",
                1u32,
                vec![],
                attrs! { "version" => "1.2" },
            )
            .unwrap();
        let metadata = registry.get_metadata(Dimension::COMPONENT, "csv").unwrap();
        assert_eq!(
            metadata.get("version").and_then(|v| v.as_str()),
            Some("1.2")
        );
    }
}
