//! Dependency injection.
//!
//! The [`Container`] maps a type (optionally a type-and-name pair) to a
//! single shared instance. Types that want to be *constructed* from the
//! container implement [`Injectable`]: they declare their dependency list
//! and build themselves from a [`Resolver`]. Rust has no constructor
//! reflection, so the declaration is explicit — the observable behavior
//! matches introspection-based containers: each declared dependency is
//! looked up by type, an override by parameter name wins over the
//! container, a missing dependency fails naming the parameter and type,
//! and cycles are detected per resolve.
//!
//! Registration is additive and resolution never mutates the container,
//! so resolves can run concurrently with registrations.

use foundation_core::{FoundationError, Result};
use parking_lot::RwLock;
use std::any::{type_name, Any, TypeId};
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

/// Declares one constructor dependency, for diagnostics and cycle
/// detection.
#[derive(Debug, Clone)]
pub struct Dependency {
    /// The constructor parameter's name.
    pub param: &'static str,
    /// The dependency's type name.
    pub type_name: &'static str,
    type_id: TypeId,
}

impl Dependency {
    /// Declares that parameter `param` wants an instance of `T`.
    pub fn of<T: Send + Sync + 'static>(param: &'static str) -> Self {
        Dependency {
            param,
            type_name: type_name::<T>(),
            type_id: TypeId::of::<T>(),
        }
    }
}

/// A type the container can construct.
pub trait Injectable: Sized + Send + Sync + 'static {
    /// The constructor's declared dependencies, in parameter order.
    fn dependencies() -> Vec<Dependency>;

    /// Builds the value, pulling each dependency from `resolver`.
    fn construct(resolver: &Resolver<'_>) -> Result<Self>;
}

/// Per-call overrides, keyed by parameter name.
#[derive(Default)]
pub struct Overrides {
    entries: HashMap<&'static str, Arc<dyn Any + Send + Sync>>,
}

impl Overrides {
    /// No overrides.
    pub fn none() -> Self {
        Self::default()
    }

    /// Overrides parameter `param` with `value`.
    pub fn with<T: Send + Sync + 'static>(mut self, param: &'static str, value: T) -> Self {
        self.entries.insert(param, Arc::new(value));
        self
    }

    fn get<T: Send + Sync + 'static>(&self, param: &str) -> Option<Arc<T>> {
        self.entries
            .get(param)
            .and_then(|any| any.clone().downcast::<T>().ok())
    }
}

/// The type-indexed instance store.
#[derive(Default)]
pub struct Container {
    entries: RwLock<HashMap<(TypeId, Option<String>), Arc<dyn Any + Send + Sync>>>,
}

impl Container {
    /// An empty container.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the instance of `T`. A later registration replaces an
    /// earlier one for the same type.
    pub fn register<T: Send + Sync + 'static>(&self, instance: T) {
        self.entries
            .write()
            .insert((TypeId::of::<T>(), None), Arc::new(instance));
    }

    /// Registers a named instance of `T`, kept separate from the unnamed
    /// one.
    pub fn register_named<T: Send + Sync + 'static>(&self, name: impl Into<String>, instance: T) {
        self.entries
            .write()
            .insert((TypeId::of::<T>(), Some(name.into())), Arc::new(instance));
    }

    /// The registered instance of `T`, if any.
    pub fn get<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.entries
            .read()
            .get(&(TypeId::of::<T>(), None))
            .and_then(|any| any.clone().downcast::<T>().ok())
    }

    /// The named instance of `T`, if any.
    pub fn get_named<T: Send + Sync + 'static>(&self, name: &str) -> Option<Arc<T>> {
        self.entries
            .read()
            .get(&(TypeId::of::<T>(), Some(name.to_owned())))
            .and_then(|any| any.clone().downcast::<T>().ok())
    }

    /// True if an unnamed instance of `T` is registered.
    pub fn has<T: Send + Sync + 'static>(&self) -> bool {
        self.entries
            .read()
            .contains_key(&(TypeId::of::<T>(), None))
    }

    /// Constructs a `T`, resolving its declared dependencies.
    pub fn resolve<T: Injectable>(&self) -> Result<T> {
        self.resolve_with(&Overrides::none())
    }

    /// Constructs a `T` with per-parameter overrides.
    pub fn resolve_with<T: Injectable>(&self, overrides: &Overrides) -> Result<T> {
        let resolver = Resolver {
            container: self,
            overrides,
            visiting: RefCell::new(vec![(TypeId::of::<T>(), type_name::<T>())]),
        };
        T::construct(&resolver)
    }

    /// Drops every registration. Test scope only.
    pub fn reset(&self) {
        self.entries.write().clear();
    }
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container")
            .field("registrations", &self.entries.read().len())
            .finish()
    }
}

/// Hands an [`Injectable`]'s constructor its dependencies.
pub struct Resolver<'a> {
    container: &'a Container,
    overrides: &'a Overrides,
    // The resolve path, for cycle detection and error messages.
    visiting: RefCell<Vec<(TypeId, &'static str)>>,
}

impl<'a> Resolver<'a> {
    /// Resolves the dependency declared as `param`: an override when one
    /// was given, else the container's instance of `T`.
    pub fn dependency<T: Send + Sync + 'static>(&self, param: &'static str) -> Result<Arc<T>> {
        if let Some(value) = self.overrides.get::<T>(param) {
            return Ok(value);
        }
        self.container.get::<T>().ok_or_else(|| {
            FoundationError::not_found(format!(
                "no instance of {} registered for parameter {:?}",
                type_name::<T>(),
                param
            ))
            .with_context("di.param", param)
            .with_context("di.type", type_name::<T>())
        })
    }

    /// Resolves an optional dependency: `None` when neither an override
    /// nor a registration exists.
    pub fn optional<T: Send + Sync + 'static>(&self, param: &'static str) -> Option<Arc<T>> {
        self.overrides
            .get::<T>(param)
            .or_else(|| self.container.get::<T>())
    }

    /// Constructs a nested [`Injectable`] dependency, detecting cycles
    /// along the resolve path.
    pub fn construct<T: Injectable>(&self) -> Result<T> {
        let id = TypeId::of::<T>();
        {
            let mut visiting = self.visiting.borrow_mut();
            if visiting.iter().any(|(seen, _)| *seen == id) {
                let path: Vec<&str> = visiting
                    .iter()
                    .map(|(_, name)| *name)
                    .chain(std::iter::once(type_name::<T>()))
                    .collect();
                return Err(FoundationError::concurrency(format!(
                    "dependency cycle: {}",
                    path.join(" -> ")
                ))
                .with_code("DI_CYCLE")
                .with_context("di.type", type_name::<T>()));
            }
            visiting.push((id, type_name::<T>()));
        }
        let result = T::construct(self);
        self.visiting.borrow_mut().pop();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use foundation_core::ErrorKind;

    #[derive(Debug, PartialEq)]
    struct Database {
        dsn: &'static str,
    }

    #[derive(Debug, PartialEq)]
    struct AuditLog {
        tag: &'static str,
    }

    #[derive(Debug)]
    struct UserService {
        db: Arc<Database>,
        audit: Arc<AuditLog>,
    }

    impl Injectable for UserService {
        fn dependencies() -> Vec<Dependency> {
            vec![
                Dependency::of::<Database>("db"),
                Dependency::of::<AuditLog>("audit"),
            ]
        }
        fn construct(resolver: &Resolver<'_>) -> Result<Self> {
            Ok(UserService {
                db: resolver.dependency("db")?,
                audit: resolver.dependency("audit")?,
            })
        }
    }

    #[test]
    fn resolves_registered_instances() {
        let container = Container::new();
        container.register(Database { dsn: "postgres://a" });
        container.register(AuditLog { tag: "main" });

        let service = container.resolve::<UserService>().unwrap();
        assert_eq!(service.db.dsn, "postgres://a");
        assert_eq!(service.audit.tag, "main");

        // The very same instance, not a copy.
        let db = container.get::<Database>().unwrap();
        assert!(Arc::ptr_eq(&service.db, &db));
    }

    #[test]
    fn overrides_win_by_parameter_name() {
        let container = Container::new();
        container.register(Database { dsn: "postgres://a" });
        container.register(AuditLog { tag: "main" });

        let overrides = Overrides::none().with("audit", AuditLog { tag: "shadow" });
        let service = container.resolve_with::<UserService>(&overrides).unwrap();
        assert_eq!(service.audit.tag, "shadow");
        assert_eq!(service.db.dsn, "postgres://a");
    }

    #[test]
    fn missing_dependency_names_parameter_and_type() {
        let container = Container::new();
        container.register(Database { dsn: "postgres://a" });
        let err = container.resolve::<UserService>().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(
            err.context("di.param").and_then(|v| v.as_str()),
            Some("audit")
        );
        assert!(err
            .context("di.type")
            .and_then(|v| v.as_str())
            .unwrap()
            .contains("AuditLog"));
    }

    #[test]
    fn named_registrations_are_distinct() {
        let container = Container::new();
        container.register(Database { dsn: "postgres://main" });
        container.register_named("replica", Database { dsn: "postgres://replica" });
        assert_eq!(container.get::<Database>().unwrap().dsn, "postgres://main");
        assert_eq!(
            container.get_named::<Database>("replica").unwrap().dsn,
            "postgres://replica"
        );
        assert!(container.get_named::<Database>("missing").is_none());
    }

    #[test]
    fn cycles_are_detected() {
        #[derive(Debug)]
        struct A;
        struct B;
        impl Injectable for A {
            fn dependencies() -> Vec<Dependency> {
                vec![Dependency::of::<B>("b")]
            }
            fn construct(resolver: &Resolver<'_>) -> Result<Self> {
                let _b: B = resolver.construct()?;
                Ok(A)
            }
        }
        impl Injectable for B {
            fn dependencies() -> Vec<Dependency> {
                vec![Dependency::of::<A>("a")]
            }
            fn construct(resolver: &Resolver<'_>) -> Result<Self> {
                let _a: A = resolver.construct()?;
                Ok(B)
            }
        }

        let container = Container::new();
        let err = container.resolve::<A>().unwrap_err();
        assert_eq!(err.code(), "DI_CYCLE");
        assert!(err.to_string().contains("dependency cycle"));
    }

    #[test]
    fn resolution_does_not_mutate_the_container() {
        let container = Container::new();
        container.register(Database { dsn: "postgres://a" });
        let _ = container.resolve::<UserService>();
        assert!(container.has::<Database>());
        assert!(!container.has::<UserService>());
    }
}
