//! The typed-configuration registry owned by the Hub.

use super::loader::Resolved;
use super::Source;
use parking_lot::RwLock;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

struct RegisteredConfig {
    value: Arc<dyn Any + Send + Sync>,
    sources: HashMap<String, Source>,
}

/// Holds one registered instance per configuration type, together with the
/// per-field source map captured at load time.
#[derive(Default)]
pub struct ConfigRegistry {
    entries: RwLock<HashMap<TypeId, RegisteredConfig>>,
}

impl ConfigRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) the instance of `T`.
    pub fn register<T: Send + Sync + 'static>(&self, value: T, resolved: &Resolved) {
        self.entries.write().insert(
            TypeId::of::<T>(),
            RegisteredConfig {
                value: Arc::new(value),
                sources: resolved.sources(),
            },
        );
    }

    /// The registered instance of `T`, if any.
    pub fn get<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        let entries = self.entries.read();
        let entry = entries.get(&TypeId::of::<T>())?;
        entry.value.clone().downcast::<T>().ok()
    }

    /// True if an instance of `T` is registered.
    pub fn has<T: Send + Sync + 'static>(&self) -> bool {
        self.entries.read().contains_key(&TypeId::of::<T>())
    }

    /// Where `field` of `T`'s configuration came from.
    pub fn source_of<T: Send + Sync + 'static>(&self, field: &str) -> Option<Source> {
        let entries = self.entries.read();
        entries
            .get(&TypeId::of::<T>())?
            .sources
            .get(field)
            .copied()
    }

    /// Drops every registered configuration. Test scope only.
    pub fn reset(&self) {
        self.entries.write().clear();
    }
}

impl std::fmt::Debug for ConfigRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigRegistry")
            .field("registered", &self.entries.read().len())
            .finish()
    }
}
