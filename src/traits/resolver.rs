//! Untyped and typed resolution traits.

use std::any::Any;
use std::sync::Arc;

use crate::error::{DiError, DiResult};
use crate::key::{key_of_generic, key_of_trait, key_of_type, GenericService, Key};
use crate::registration::{downcast_service, downcast_trait};
use crate::traits::{AsyncDispose, Dispose, Release};

/// Object-safe resolution over erased values.
///
/// Implemented by the provider, scopes and factory contexts; [`Resolver`]
/// adds the typed methods on top.
pub trait ResolverCore: Send + Sync {
    /// Resolves the last registration for `key`, `Ok(None)` when nothing is registered.
    ///
    /// Trait services come back as `Arc<Arc<dyn Trait>>` inside the erased value.
    fn try_resolve_any(&self, key: &Key) -> DiResult<Option<Arc<dyn Any + Send + Sync>>>;

    /// Resolves every registration for `key` in registration order.
    ///
    /// An unregistered key yields an empty vector, not an error.
    fn resolve_all(&self, key: &Key) -> DiResult<Vec<Arc<dyn Any + Send + Sync>>>;

    /// Hands a release hook to the scope this resolver produces instances for.
    ///
    /// Fails with [`DiError::ScopeDisposed`] when that scope is already torn
    /// down; the hook is run immediately in that case.
    fn track(&self, service: &'static str, release: Release) -> DiResult<()>;

    /// Resolves the last registration for `key`.
    ///
    /// # Returns
    ///
    /// * `Ok(AnyArc)` - The resolved service wrapped in `Arc<dyn Any>`
    /// * `Err(DiError::NotFound)` - Nothing is registered for `key`
    /// * `Err(DiError)` - Any structural or runtime resolution error
    fn resolve_any(&self, key: &Key) -> DiResult<Arc<dyn Any + Send + Sync>> {
        self.try_resolve_any(key)?
            .ok_or(DiError::NotFound(key.display_name()))
    }
}

/// Typed resolution, available on every [`ResolverCore`].
///
/// `ServiceProvider`, `Scope` and the `ResolverContext` passed to factories
/// all resolve through the same call sites, so code written against
/// `impl Resolver` works with any of them.
///
/// # Examples
///
/// ```
/// use callsite_di::{DiResult, Resolver, ServiceCollection};
///
/// struct Port(u16);
///
/// fn describe(resolver: &impl Resolver) -> DiResult<String> {
///     let port = resolver.get::<Port>()?;
///     let label = resolver.try_get::<String>()?;
///     Ok(format!("{}:{}", label.as_deref().map_or("anonymous", |l| l.as_str()), port.0))
/// }
///
/// let mut services = ServiceCollection::new();
/// services.add_singleton(Port(8080));
/// let provider = services.build();
///
/// assert_eq!(describe(&provider).unwrap(), "anonymous:8080");
/// assert_eq!(describe(&provider.create_scope()).unwrap(), "anonymous:8080");
/// ```
pub trait Resolver: ResolverCore {
    /// Resolves a concrete service type.
    ///
    /// Fails with [`DiError::NotFound`] when nothing is registered, or with the
    /// structural error cached for the service's call site.
    fn get<T: Send + Sync + 'static>(&self) -> DiResult<Arc<T>> {
        downcast_service::<T>(self.resolve_any(&key_of_type::<T>())?)
    }

    /// Resolves a concrete service type, `None` when it is not registered.
    ///
    /// Only absence maps to `None`; every other failure is still an error.
    fn try_get<T: Send + Sync + 'static>(&self) -> DiResult<Option<Arc<T>>> {
        self.try_resolve_any(&key_of_type::<T>())?
            .map(downcast_service::<T>)
            .transpose()
    }

    /// Resolves a `dyn Trait` service: the last registration wins.
    ///
    /// # Examples
    ///
    /// ```
    /// use callsite_di::{ServiceCollection, Resolver};
    /// use std::sync::Arc;
    ///
    /// trait Clock: Send + Sync {
    ///     fn now(&self) -> u64;
    /// }
    ///
    /// struct SystemClock;
    /// impl Clock for SystemClock {
    ///     fn now(&self) -> u64 { 1 }
    /// }
    ///
    /// struct FrozenClock(u64);
    /// impl Clock for FrozenClock {
    ///     fn now(&self) -> u64 { self.0 }
    /// }
    ///
    /// let mut services = ServiceCollection::new();
    /// services.add_singleton_trait::<dyn Clock>(Arc::new(SystemClock));
    /// services.add_singleton_trait::<dyn Clock>(Arc::new(FrozenClock(1_700_000_000)));
    ///
    /// let clock = services.build().get_trait::<dyn Clock>().unwrap();
    /// assert_eq!(clock.now(), 1_700_000_000);
    /// ```
    fn get_trait<T: ?Sized + Send + Sync + 'static>(&self) -> DiResult<Arc<T>> {
        downcast_trait::<T>(self.resolve_any(&key_of_trait::<T>())?)
    }

    fn try_get_trait<T: ?Sized + Send + Sync + 'static>(&self) -> DiResult<Option<Arc<T>>> {
        self.try_resolve_any(&key_of_trait::<T>())?
            .map(downcast_trait::<T>)
            .transpose()
    }

    /// Resolves every registration of a concrete type, in registration order.
    fn get_all<T: Send + Sync + 'static>(&self) -> DiResult<Vec<Arc<T>>> {
        self.resolve_all(&key_of_type::<T>())?
            .into_iter()
            .map(downcast_service::<T>)
            .collect()
    }

    /// Resolves every registration of a trait, in registration order.
    ///
    /// Cached registrations hand out the same instance as single resolution;
    /// transient ones are created afresh for each call.
    ///
    /// # Examples
    ///
    /// ```
    /// use callsite_di::{Lifetime, ServiceCollection, Resolver};
    /// use std::sync::Arc;
    ///
    /// trait Middleware: Send + Sync {
    ///     fn stage(&self) -> u8;
    /// }
    ///
    /// struct Auth;
    /// impl Middleware for Auth {
    ///     fn stage(&self) -> u8 { 1 }
    /// }
    ///
    /// struct Compress;
    /// impl Middleware for Compress {
    ///     fn stage(&self) -> u8 { 2 }
    /// }
    ///
    /// let mut services = ServiceCollection::new();
    /// services.add_singleton_trait::<dyn Middleware>(Arc::new(Auth));
    /// services.add_trait_factory::<dyn Middleware, _>(Lifetime::Transient, |_| {
    ///     Ok(Arc::new(Compress) as Arc<dyn Middleware>)
    /// });
    ///
    /// let pipeline = services.build().get_all_trait::<dyn Middleware>().unwrap();
    /// let stages: Vec<u8> = pipeline.iter().map(|m| m.stage()).collect();
    /// assert_eq!(stages, [1, 2]);
    /// ```
    fn get_all_trait<T: ?Sized + Send + Sync + 'static>(&self) -> DiResult<Vec<Arc<T>>> {
        self.resolve_all(&key_of_trait::<T>())?
            .into_iter()
            .map(downcast_trait::<T>)
            .collect()
    }

    /// Resolves a closed generic type, served by an open-generic registration
    /// when no explicit closed registration is more recent.
    fn get_generic<T: GenericService>(&self) -> DiResult<Arc<T>> {
        downcast_service::<T>(self.resolve_any(&key_of_generic::<T>())?)
    }

    fn try_get_generic<T: GenericService>(&self) -> DiResult<Option<Arc<T>>> {
        self.try_resolve_any(&key_of_generic::<T>())?
            .map(downcast_service::<T>)
            .transpose()
    }

    /// Every candidate for a closed generic type, explicit and open alike,
    /// in registration order.
    fn get_all_generic<T: GenericService>(&self) -> DiResult<Vec<Arc<T>>> {
        self.resolve_all(&key_of_generic::<T>())?
            .into_iter()
            .map(downcast_service::<T>)
            .collect()
    }

    /// Resolves a concrete service type, panicking on failure.
    ///
    /// # Panics
    ///
    /// Panics if the service cannot be resolved (not found, captive,
    /// circular dependency, disposed scope, etc.).
    fn get_required<T: Send + Sync + 'static>(&self) -> Arc<T> {
        self.get::<T>()
            .unwrap_or_else(|e| panic!("Failed to resolve {}: {}", std::any::type_name::<T>(), e))
    }

    /// Resolves a trait implementation, panicking on failure.
    fn get_required_trait<T: ?Sized + Send + Sync + 'static>(&self) -> Arc<T> {
        self.get_trait::<T>()
            .unwrap_or_else(|e| panic!("Failed to resolve trait {}: {}", std::any::type_name::<T>(), e))
    }

    /// Registers an extra instance for synchronous disposal.
    ///
    /// Called from factories; the hook runs when the scope that owns the
    /// instance being produced is torn down (the root for singletons), in
    /// reverse order with every other tracked instance.
    ///
    /// # Examples
    ///
    /// ```
    /// use callsite_di::{Dispose, DisposeResult, ServiceCollection, Resolver};
    /// use std::sync::Arc;
    ///
    /// struct Connection;
    ///
    /// impl Dispose for Connection {
    ///     fn dispose(&self) -> DisposeResult {
    ///         println!("closing connection");
    ///         Ok(())
    ///     }
    /// }
    ///
    /// struct Session { connection: Arc<Connection> }
    ///
    /// let mut services = ServiceCollection::new();
    /// services.add_scoped_factory::<Session, _>(|resolver| {
    ///     let connection = Arc::new(Connection);
    ///     resolver.register_disposer(connection.clone())?;
    ///     Ok(Session { connection })
    /// });
    ///
    /// let provider = services.build();
    /// let scope = provider.create_scope();
    /// let _session = scope.get::<Session>().unwrap();
    /// scope.dispose().unwrap(); // prints "closing connection"
    /// ```
    fn register_disposer<T: Dispose>(&self, service: Arc<T>) -> DiResult<()> {
        self.track(std::any::type_name::<T>(), Release::sync(service))
    }

    /// Registers an extra instance for asynchronous disposal.
    ///
    /// Only [`dispose_async`](crate::Scope::dispose_async) awaits these hooks.
    fn register_async_disposer<T: AsyncDispose>(&self, service: Arc<T>) -> DiResult<()> {
        self.track(std::any::type_name::<T>(), Release::asynchronous(service))
    }
}

impl<R: ResolverCore + ?Sized> Resolver for R {}
