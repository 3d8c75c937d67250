//! The root provider and the scope types that share its resolution path.

use std::any::Any;
use std::sync::Arc;
use std::time::Instant;

use crate::call_site::Request;
use crate::engine::{AccessorState, Engine};
use crate::error::{DiError, DiResult};
use crate::internal::{Frame, StackGuard};
use crate::key::Key;
use crate::observer::Observers;
use crate::options::ProviderOptions;
use crate::registration::{downcast_items, AnyArc, Registry};
use crate::traits::{Release, ResolverCore};

mod context;
mod scope;

pub use context::ResolverContext;
pub use scope::{Scope, ScopeFactory};
pub(crate) use scope::{ScopeRef, ScopeState};

/// The root scope.
///
/// The provider caches singletons, tracks their release hooks and creates
/// child scopes. Each requested service is turned into a call site once,
/// validated once, and then served by a cached accessor that is compiled
/// after a few calls.
///
/// Cloning is cheap and every clone refers to the same root. The provider is
/// `Send + Sync`.
///
/// # Examples
///
/// ```
/// use callsite_di::{Resolver, ServiceCollection};
/// use std::sync::Arc;
///
/// struct Pool { size: usize }
///
/// let mut services = ServiceCollection::new();
/// services.add_singleton_factory::<Pool, _>(|_| Ok(Pool { size: 8 }));
/// let provider = services.build();
///
/// let worker = provider.clone();
/// let from_thread = std::thread::spawn(move || worker.get::<Pool>().unwrap())
///     .join()
///     .unwrap();
/// assert!(Arc::ptr_eq(&from_thread, &provider.get::<Pool>().unwrap()));
/// assert_eq!(from_thread.size, 8);
/// ```
#[derive(Clone)]
pub struct ServiceProvider {
    inner: Arc<ProviderInner>,
}

struct ProviderInner {
    engine: Engine,
    options: ProviderOptions,
    observers: Arc<Observers>,
    root: Arc<ScopeState>,
}

impl ServiceProvider {
    pub(crate) fn new(registry: Registry, options: ProviderOptions, observers: Observers) -> Self {
        let observers = Arc::new(observers);
        let engine = Engine::new(Arc::new(registry), &options, Arc::clone(&observers));
        let root = Arc::new(ScopeState::new(true, Arc::clone(&observers)));
        Self {
            inner: Arc::new(ProviderInner {
                engine,
                options,
                observers,
                root,
            }),
        }
    }

    pub(crate) fn root_state(&self) -> &Arc<ScopeState> {
        &self.inner.root
    }

    pub(crate) fn registry(&self) -> &Registry {
        self.inner.engine.registry()
    }

    /// Realizes `request` without producing an instance.
    pub(crate) fn prepare(&self, request: &Request) -> DiResult<()> {
        self.inner.engine.realize(request).map(|_| ())
    }

    fn root_ref(&self) -> ScopeRef<'_> {
        ScopeRef {
            provider: self,
            state: &self.inner.root,
        }
    }

    /// Resolution path shared by the root, every scope and every factory context.
    pub(crate) fn resolve(&self, state: &Arc<ScopeState>, request: Request) -> DiResult<Option<AnyArc>> {
        let key = request.key();
        let name = key.display_name();
        if state.is_disposed() {
            return Err(DiError::ScopeDisposed(name));
        }

        let _guard = if self.inner.options.call_chain_diagnostics {
            Some(StackGuard::enter(Frame::Request(key.type_id(), request.is_all()), name)?)
        } else {
            None
        };

        tracing::trace!(service = name, enumerable = request.is_all(), "resolving");
        let started = self.inner.observers.has_observers().then(Instant::now);

        let result = self.produce(state, &request);
        if let Some(started) = started {
            match &result {
                Ok(Some(_)) => self.inner.observers.resolved(key, started.elapsed()),
                Ok(None) => {}
                Err(error) => self.inner.observers.resolution_failed(key, error),
            }
        }
        result
    }

    fn produce(&self, state: &Arc<ScopeState>, request: &Request) -> DiResult<Option<AnyArc>> {
        let Some(realized) = self.inner.engine.realize(request)? else {
            return Ok(None);
        };
        if state.is_root() {
            if let Some(scoped) = realized.scoped {
                return Err(DiError::ScopedFromRoot {
                    service: realized.key.display_name(),
                    scoped,
                });
            }
        }
        let scope = ScopeRef {
            provider: self,
            state,
        };
        realized.invoke(&self.inner.engine, scope).map(Some)
    }

    /// Creates a child scope.
    ///
    /// Each scope caches its own Scoped instances and tracks the release hooks
    /// of what it creates. Singletons still come from the root.
    ///
    /// # Examples
    ///
    /// ```
    /// use callsite_di::{Resolver, ServiceCollection};
    /// use std::sync::Arc;
    ///
    /// struct UnitOfWork;
    ///
    /// let mut services = ServiceCollection::new();
    /// services.add_scoped_factory::<UnitOfWork, _>(|_| Ok(UnitOfWork));
    /// let provider = services.build();
    ///
    /// let (first, second) = (provider.create_scope(), provider.create_scope());
    /// let a = first.get::<UnitOfWork>().unwrap();
    /// assert!(Arc::ptr_eq(&a, &first.get::<UnitOfWork>().unwrap()));
    /// assert!(!Arc::ptr_eq(&a, &second.get::<UnitOfWork>().unwrap()));
    /// ```
    pub fn create_scope(&self) -> Scope {
        tracing::debug!("scope created");
        let state = Arc::new(ScopeState::new(false, Arc::clone(&self.inner.observers)));
        Scope::new(self.clone(), state)
    }

    /// Handle to the root scope.
    pub fn root_scope(&self) -> Scope {
        self.root_ref().handle()
    }

    /// Options this provider was built with.
    ///
    /// ```
    /// use callsite_di::{CompilationMode, ServiceCollection};
    ///
    /// let provider = ServiceCollection::new().build();
    /// assert_eq!(provider.options().compilation, CompilationMode::Background);
    /// ```
    pub fn options(&self) -> &ProviderOptions {
        &self.inner.options
    }

    /// Accessor currently serving single resolutions of `key`, `None` before
    /// the first successful realization.
    pub fn accessor_state(&self, key: &Key) -> Option<AccessorState> {
        self.inner.engine.accessor_state(key)
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.root.is_disposed()
    }

    /// Tears down the root: releases singletons newest-first.
    ///
    /// Scopes created from this provider keep their own Scoped instances but
    /// can no longer produce singletons.
    pub fn dispose(&self) -> DiResult<()> {
        self.inner.root.dispose()
    }

    /// Asynchronous root teardown, awaiting [`AsyncDispose`](crate::AsyncDispose) singletons.
    pub async fn dispose_async(&self) -> DiResult<()> {
        self.inner.root.dispose_async().await
    }
}

impl ResolverCore for ServiceProvider {
    fn try_resolve_any(&self, key: &Key) -> DiResult<Option<Arc<dyn Any + Send + Sync>>> {
        self.resolve(&self.inner.root, Request::Single(key.clone()))
    }

    fn resolve_all(&self, key: &Key) -> DiResult<Vec<Arc<dyn Any + Send + Sync>>> {
        match self.resolve(&self.inner.root, Request::All(key.clone()))? {
            Some(items) => downcast_items(items),
            None => Ok(Vec::new()),
        }
    }

    fn track(&self, service: &'static str, release: Release) -> DiResult<()> {
        self.inner.root.track(service, release)
    }
}

impl std::fmt::Debug for ServiceProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceProvider")
            .field("registrations", &self.registry().len())
            .field("options", &self.inner.options)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
