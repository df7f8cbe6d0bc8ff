//! # Services Module
//!
//! The boundary to the dependency-resolution container. The engine only needs
//! three things from it:
//!
//! - [`Resolver::resolve_any`] - an instance for a type, or nothing
//! - [`ServiceProvider::create_scope`] - called once per exchange before routing
//! - [`ServiceScope::dispose`] - called once after the pipeline completes
//!
//! [`ServiceRegistry`] is a small container implementing that boundary with
//! singleton, scoped and transient lifetimes. Applications with their own
//! container implement the traits directly instead.
//!
//! ```rust
//! use brrtdispatch::services::{ResolverExt, ServiceProvider, ServiceRegistry};
//!
//! struct Clock;
//! let registry = ServiceRegistry::builder().add_singleton(Clock).build();
//! let scope = registry.create_scope();
//! assert!(scope.resolver().resolve::<Clock>().is_some());
//! ```

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::ConstructionError;

/// A type-erased shared instance.
pub type Instance = Arc<dyn Any + Send + Sync>;

/// Resolves instances by type.
pub trait Resolver: Send + Sync {
    fn resolve_any(&self, type_id: TypeId) -> Option<Instance>;
}

/// Typed helpers over any [`Resolver`].
pub trait ResolverExt: Resolver {
    fn resolve<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.resolve_any(TypeId::of::<T>())?.downcast::<T>().ok()
    }

    /// Resolve `T` or explain why not. Used from `Controller::construct`.
    ///
    /// # Errors
    ///
    /// [`ConstructionError::Unresolved`] when nothing is registered for `T`.
    fn require<T: Any + Send + Sync>(&self) -> Result<Arc<T>, ConstructionError> {
        let instance = self
            .resolve_any(TypeId::of::<T>())
            .ok_or(ConstructionError::Unresolved {
                type_name: type_name::<T>(),
            })?;
        instance
            .downcast::<T>()
            .map_err(|_| ConstructionError::TypeMismatch {
                type_name: type_name::<T>(),
            })
    }
}

impl<R: Resolver + ?Sized> ResolverExt for R {}

/// Request-scoped resolver. Owned by exactly one exchange.
pub trait ServiceScope: Send + Sync {
    fn resolver(&self) -> &dyn Resolver;

    /// Release scoped instances. Called once, after the pipeline completes.
    fn dispose(&self) {}
}

/// Root container: resolves singletons and hands out per-exchange scopes.
pub trait ServiceProvider: Resolver {
    fn create_scope(&self) -> Arc<dyn ServiceScope>;
}

/// A scope that resolves nothing. Installed on contexts that have not been
/// given a real scope.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyScope;

impl Resolver for EmptyScope {
    fn resolve_any(&self, _type_id: TypeId) -> Option<Instance> {
        None
    }
}

impl ServiceScope for EmptyScope {
    fn resolver(&self) -> &dyn Resolver {
        self
    }
}

type Factory = Arc<dyn Fn(&dyn Resolver) -> Result<Instance, ConstructionError> + Send + Sync>;

#[derive(Clone)]
struct Registration {
    type_name: &'static str,
    factory: Factory,
}

#[derive(Default)]
struct RegistryInner {
    singletons: HashMap<TypeId, Instance>,
    scoped: HashMap<TypeId, Registration>,
    transient: HashMap<TypeId, Registration>,
}

impl RegistryInner {
    fn build(&self, registration: &Registration, resolver: &dyn Resolver) -> Option<Instance> {
        match (registration.factory)(resolver) {
            Ok(instance) => Some(instance),
            Err(e) => {
                warn!(
                    service = registration.type_name,
                    error = %e,
                    "Service factory failed"
                );
                None
            }
        }
    }
}

/// Default container with singleton, scoped and transient registrations.
#[derive(Clone, Default)]
pub struct ServiceRegistry {
    inner: Arc<RegistryInner>,
}

impl ServiceRegistry {
    #[must_use]
    pub fn builder() -> ServiceRegistryBuilder {
        ServiceRegistryBuilder::default()
    }

    /// A registry with no services.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }
}

impl Resolver for ServiceRegistry {
    /// Singletons and transients only; scoped services need a scope.
    fn resolve_any(&self, type_id: TypeId) -> Option<Instance> {
        if let Some(instance) = self.inner.singletons.get(&type_id) {
            return Some(Arc::clone(instance));
        }
        let registration = self.inner.transient.get(&type_id)?;
        self.inner.build(registration, self)
    }
}

impl ServiceProvider for ServiceRegistry {
    fn create_scope(&self) -> Arc<dyn ServiceScope> {
        Arc::new(RegistryScope {
            inner: Arc::clone(&self.inner),
            instances: Mutex::new(HashMap::new()),
        })
    }
}

struct RegistryScope {
    inner: Arc<RegistryInner>,
    instances: Mutex<HashMap<TypeId, Instance>>,
}

impl Resolver for RegistryScope {
    fn resolve_any(&self, type_id: TypeId) -> Option<Instance> {
        if let Some(instance) = self.inner.singletons.get(&type_id) {
            return Some(Arc::clone(instance));
        }
        if let Some(registration) = self.inner.scoped.get(&type_id) {
            if let Some(instance) = self.instances.lock().get(&type_id) {
                return Some(Arc::clone(instance));
            }
            // Built outside the lock: factories may resolve other scoped services.
            let built = self.inner.build(registration, self)?;
            let mut instances = self.instances.lock();
            return Some(Arc::clone(instances.entry(type_id).or_insert(built)));
        }
        let registration = self.inner.transient.get(&type_id)?;
        self.inner.build(registration, self)
    }
}

impl ServiceScope for RegistryScope {
    fn resolver(&self) -> &dyn Resolver {
        self
    }

    fn dispose(&self) {
        let released = std::mem::take(&mut *self.instances.lock());
        debug!(released = released.len(), "Service scope disposed");
    }
}

/// Collects registrations, then freezes them into a [`ServiceRegistry`].
#[derive(Default)]
pub struct ServiceRegistryBuilder {
    inner: RegistryInner,
}

impl ServiceRegistryBuilder {
    /// One shared instance for the life of the process.
    #[must_use]
    pub fn add_singleton<T: Any + Send + Sync>(mut self, value: T) -> Self {
        self.inner.singletons.insert(TypeId::of::<T>(), Arc::new(value));
        self
    }

    /// One instance per exchange, built on first resolve.
    #[must_use]
    pub fn add_scoped<T, F>(mut self, factory: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&dyn Resolver) -> Result<T, ConstructionError> + Send + Sync + 'static,
    {
        self.inner
            .scoped
            .insert(TypeId::of::<T>(), registration::<T, F>(factory));
        self
    }

    /// A new instance on every resolve.
    #[must_use]
    pub fn add_transient<T, F>(mut self, factory: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&dyn Resolver) -> Result<T, ConstructionError> + Send + Sync + 'static,
    {
        self.inner
            .transient
            .insert(TypeId::of::<T>(), registration::<T, F>(factory));
        self
    }

    #[must_use]
    pub fn build(self) -> ServiceRegistry {
        ServiceRegistry {
            inner: Arc::new(self.inner),
        }
    }
}

fn registration<T, F>(factory: F) -> Registration
where
    T: Any + Send + Sync,
    F: Fn(&dyn Resolver) -> Result<T, ConstructionError> + Send + Sync + 'static,
{
    Registration {
        type_name: type_name::<T>(),
        factory: Arc::new(move |resolver| factory(resolver).map(|v| Arc::new(v) as Instance)),
    }
}
