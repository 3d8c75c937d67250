//! Service descriptors: what a registration produces and how long it lives.

use std::fmt;
use std::sync::Arc;

use crate::constructor::{Implementation, Injectable};
use crate::error::DiResult;
use crate::key::{key_of_trait, key_of_type, Key};
use crate::lifetime::Lifetime;
use crate::provider::ResolverContext;
use crate::registration::AnyArc;

/// Type-erased factory stored in a descriptor.
pub(crate) type FactoryFn = Arc<dyn Fn(&ResolverContext<'_>) -> DiResult<AnyArc> + Send + Sync>;

/// Constraint an open generic registration applies to the type arguments.
pub(crate) type Constraint = Arc<dyn Fn(&[Key]) -> bool + Send + Sync>;

/// How a descriptor produces its instance.
#[derive(Clone)]
pub(crate) enum ServiceSource {
    Implementation(Implementation),
    Factory(FactoryFn),
    Instance(AnyArc),
}

/// Which production strategy a descriptor uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorKind {
    /// Built by the container from declared constructors.
    Implementation,
    /// Built by a user factory.
    Factory,
    /// A fixed, pre-built value.
    Instance,
}

/// Service descriptor: one registration of a service type.
///
/// Several descriptors may share a key. Single resolution uses the last one,
/// enumerable resolution uses all of them in registration order.
///
/// # Examples
///
/// ```rust
/// use callsite_di::{DescriptorKind, Lifetime, ServiceCollection};
/// use std::sync::Arc;
///
/// struct Database { url: String }
/// struct Repository { name: String }
///
/// trait Logger: Send + Sync {}
/// struct ConsoleLogger;
/// impl Logger for ConsoleLogger {}
///
/// let mut services = ServiceCollection::new();
/// services.add_singleton(Database { url: "postgres://localhost".to_string() });
/// services.add_scoped_factory::<Repository, _>(|_| Ok(Repository { name: "UserRepo".to_string() }));
/// services.add_singleton_trait(Arc::new(ConsoleLogger) as Arc<dyn Logger>);
///
/// let descriptors = services.descriptors();
///
/// let db = descriptors.iter().find(|d| d.type_name().contains("Database")).unwrap();
/// assert_eq!(db.lifetime, Lifetime::Singleton);
/// assert_eq!(db.kind(), DescriptorKind::Instance);
///
/// let repo = descriptors.iter().find(|d| d.type_name().contains("Repository")).unwrap();
/// assert_eq!(repo.lifetime, Lifetime::Scoped);
/// assert_eq!(repo.kind(), DescriptorKind::Factory);
///
/// assert!(descriptors.iter().any(|d| d.is_trait()));
/// ```
#[derive(Clone)]
pub struct ServiceDescriptor {
    /// The service key
    pub key: Key,
    /// Service lifetime
    pub lifetime: Lifetime,
    pub(crate) source: ServiceSource,
}

impl ServiceDescriptor {
    /// Fixed singleton value of a concrete type.
    pub fn instance<T: Send + Sync + 'static>(value: T) -> Self {
        Self {
            key: key_of_type::<T>(),
            lifetime: Lifetime::Singleton,
            source: ServiceSource::Instance(Arc::new(value)),
        }
    }

    /// Fixed singleton trait object.
    pub fn trait_instance<T: ?Sized + Send + Sync + 'static>(value: Arc<T>) -> Self {
        Self {
            key: key_of_trait::<T>(),
            lifetime: Lifetime::Singleton,
            source: ServiceSource::Instance(Arc::new(value)),
        }
    }

    /// Concrete type produced by a factory.
    pub fn factory<T, F>(lifetime: Lifetime, factory: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&ResolverContext<'_>) -> DiResult<T> + Send + Sync + 'static,
    {
        Self {
            key: key_of_type::<T>(),
            lifetime,
            source: ServiceSource::Factory(Arc::new(move |ctx: &ResolverContext<'_>| {
                factory(ctx).map(|value| Arc::new(value) as AnyArc)
            })),
        }
    }

    /// Trait object produced by a factory.
    pub fn trait_factory<T, F>(lifetime: Lifetime, factory: F) -> Self
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&ResolverContext<'_>) -> DiResult<Arc<T>> + Send + Sync + 'static,
    {
        Self {
            key: key_of_trait::<T>(),
            lifetime,
            source: ServiceSource::Factory(Arc::new(move |ctx: &ResolverContext<'_>| {
                factory(ctx).map(|value| Arc::new(value) as AnyArc)
            })),
        }
    }

    /// Concrete type built from its declared constructors.
    pub fn implementation<T: Injectable>(lifetime: Lifetime) -> Self {
        Self {
            key: key_of_type::<T>(),
            lifetime,
            source: ServiceSource::Implementation(Implementation::of::<T>()),
        }
    }

    /// Trait object served by an implementation type built from its constructors.
    ///
    /// `cast` performs the unsizing coercion, usually `|it| it as Arc<dyn Trait>`.
    pub fn trait_implementation<T, I, F>(lifetime: Lifetime, cast: F) -> Self
    where
        T: ?Sized + Send + Sync + 'static,
        I: Injectable,
        F: Fn(Arc<I>) -> Arc<T> + Send + Sync + 'static,
    {
        Self {
            key: key_of_trait::<T>(),
            lifetime,
            source: ServiceSource::Implementation(Implementation::of::<I>().upcast(cast)),
        }
    }

    /// Service type or trait name.
    pub fn type_name(&self) -> &'static str {
        self.key.display_name()
    }

    /// Whether the service is a trait object.
    pub fn is_trait(&self) -> bool {
        self.key.is_trait()
    }

    /// Production strategy.
    pub fn kind(&self) -> DescriptorKind {
        match self.source {
            ServiceSource::Implementation(_) => DescriptorKind::Implementation,
            ServiceSource::Factory(_) => DescriptorKind::Factory,
            ServiceSource::Instance(_) => DescriptorKind::Instance,
        }
    }

    /// Implementation type, when the descriptor builds one from constructors.
    pub fn implementation_type_name(&self) -> Option<&'static str> {
        match &self.source {
            ServiceSource::Implementation(implementation) => Some(implementation.type_name()),
            _ => None,
        }
    }

    pub(crate) fn implementation_type(&self) -> Option<std::any::TypeId> {
        match &self.source {
            ServiceSource::Implementation(implementation) => Some(implementation.type_id()),
            _ => None,
        }
    }
}

impl fmt::Debug for ServiceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceDescriptor")
            .field("key", &self.key)
            .field("lifetime", &self.lifetime)
            .field("kind", &self.kind())
            .field("implementation", &self.implementation_type_name())
            .finish()
    }
}

/// Open generic registration: a definition name, a lifetime and an optional
/// constraint over the type arguments of the closed request.
pub(crate) struct OpenGenericDescriptor {
    pub(crate) definition: &'static str,
    pub(crate) lifetime: Lifetime,
    pub(crate) constraint: Option<Constraint>,
}

impl OpenGenericDescriptor {
    pub(crate) fn accepts(&self, arguments: &[Key]) -> bool {
        self.constraint
            .as_ref()
            .map_or(true, |constraint| constraint(arguments))
    }
}
