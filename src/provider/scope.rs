//! Scopes: per-scope instance caches and disposal tracking.

use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ahash::AHashMap;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;

use super::ServiceProvider;
use crate::call_site::{CacheKey, Request};
use crate::error::{DiError, DiResult};
use crate::internal::{release_async, release_sync, DisposeBag, Tracked};
use crate::key::Key;
use crate::observer::Observers;
use crate::registration::{downcast_items, AnyArc};
use crate::traits::{Release, ResolverCore};

/// State shared by every handle to one scope (the root included).
///
/// Cached instances live in per-slot cells so each Singleton or Scoped
/// service is produced at most once per owning scope. The map lock is held
/// only to find or create a cell, never while constructing.
pub(crate) struct ScopeState {
    instances: Mutex<AHashMap<CacheKey, Arc<OnceCell<AnyArc>>>>,
    disposables: Mutex<DisposeBag>,
    disposed: AtomicBool,
    root: bool,
    observers: Arc<Observers>,
}

impl ScopeState {
    pub(crate) fn new(root: bool, observers: Arc<Observers>) -> Self {
        Self {
            instances: Mutex::new(AHashMap::new()),
            disposables: Mutex::new(DisposeBag::default()),
            disposed: AtomicBool::new(false),
            root,
            observers,
        }
    }

    pub(crate) fn is_root(&self) -> bool {
        self.root
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Cell caching the instance for `key` in this scope. Fails once the
    /// scope is disposed; checked under the map lock so no cell is added
    /// after teardown took the map.
    pub(crate) fn slot(&self, service: &'static str, key: &CacheKey) -> DiResult<Arc<OnceCell<AnyArc>>> {
        let mut instances = self.instances.lock();
        if self.is_disposed() {
            return Err(DiError::ScopeDisposed(service));
        }
        if let Some(cell) = instances.get(key) {
            return Ok(cell.clone());
        }
        let cell = Arc::new(OnceCell::new());
        instances.insert(key.clone(), cell.clone());
        Ok(cell)
    }

    /// Records a release hook; a torn-down scope releases it immediately instead.
    pub(crate) fn track(&self, service: &'static str, release: Release) -> DiResult<()> {
        let rejected = match self.disposables.lock().push(Tracked { service, release }) {
            Ok(()) => return Ok(()),
            Err(rejected) => rejected,
        };
        if let Err(error) = release_sync(vec![rejected]) {
            tracing::warn!(service, %error, "release of late instance failed");
        }
        Err(DiError::ScopeDisposed(service))
    }

    fn begin_teardown(&self) -> Option<Vec<Tracked>> {
        self.disposed.store(true, Ordering::Release);
        self.disposables.lock().drain()
    }

    fn finish_teardown(&self, released: usize) {
        // Dropped outside the lock: cached instances may own scope handles
        let instances = std::mem::take(&mut *self.instances.lock());
        drop(instances);
        tracing::debug!(root = self.root, released, "scope disposed");
        if self.observers.has_observers() {
            self.observers.scope_disposed(self.root, released);
        }
    }

    pub(crate) fn dispose(&self) -> DiResult<()> {
        let Some(entries) = self.begin_teardown() else {
            return Ok(());
        };
        let released = entries.len();
        let result = release_sync(entries);
        self.finish_teardown(released);
        result
    }

    pub(crate) async fn dispose_async(&self) -> DiResult<()> {
        let Some(entries) = self.begin_teardown() else {
            return Ok(());
        };
        let released = entries.len();
        let result = release_async(entries).await;
        self.finish_teardown(released);
        result
    }
}

impl Drop for ScopeState {
    fn drop(&mut self) {
        if !self.is_disposed() {
            if let Err(error) = self.dispose() {
                tracing::warn!(root = self.root, %error, "scope teardown on drop failed");
            }
        }
    }
}

/// Borrowed view of one scope used while producing instances.
#[derive(Clone, Copy)]
pub(crate) struct ScopeRef<'a> {
    pub(crate) provider: &'a ServiceProvider,
    pub(crate) state: &'a Arc<ScopeState>,
}

impl<'a> ScopeRef<'a> {
    pub(crate) fn root(self) -> ScopeRef<'a> {
        ScopeRef {
            provider: self.provider,
            state: self.provider.root_state(),
        }
    }

    /// Owned handle to this scope.
    pub(crate) fn handle(self) -> Scope {
        Scope {
            provider: self.provider.clone(),
            state: Arc::clone(self.state),
        }
    }

    pub(crate) fn scope_factory(self) -> ScopeFactory {
        ScopeFactory {
            provider: self.provider.clone(),
        }
    }

    pub(crate) fn resolve(self, request: Request) -> DiResult<Option<AnyArc>> {
        self.provider.resolve(self.state, request)
    }

    pub(crate) fn resolve_all(self, key: &Key) -> DiResult<Vec<AnyArc>> {
        match self.resolve(Request::All(key.clone()))? {
            Some(items) => downcast_items(items),
            None => Ok(Vec::new()),
        }
    }
}

/// Scoped resolver with its own cache for Scoped services and its own
/// disposal list.
///
/// Singletons still come from (and are released by) the root. Cloning a
/// `Scope` clones the handle, not the scope. Requesting the `Scope` type
/// itself from a resolver yields a handle to the requesting scope.
///
/// # Examples
///
/// ```
/// use callsite_di::{ServiceCollection, Resolver};
/// use std::sync::Arc;
///
/// struct RequestId(u32);
///
/// let mut collection = ServiceCollection::new();
/// collection.add_scoped_factory::<RequestId, _>(|_| Ok(RequestId(1)));
///
/// let provider = collection.build();
/// let scope = provider.create_scope();
///
/// let a = scope.get_required::<RequestId>();
/// let b = scope.get_required::<RequestId>();
/// assert!(Arc::ptr_eq(&a, &b));
///
/// let other = provider.create_scope();
/// assert!(!Arc::ptr_eq(&a, &other.get_required::<RequestId>()));
/// ```
#[derive(Clone)]
pub struct Scope {
    pub(crate) provider: ServiceProvider,
    pub(crate) state: Arc<ScopeState>,
}

impl Scope {
    pub(crate) fn new(provider: ServiceProvider, state: Arc<ScopeState>) -> Self {
        Self { provider, state }
    }

    fn view(&self) -> ScopeRef<'_> {
        ScopeRef {
            provider: &self.provider,
            state: &self.state,
        }
    }

    /// Root provider this scope belongs to.
    pub fn provider(&self) -> &ServiceProvider {
        &self.provider
    }

    /// New sibling scope of the same root.
    pub fn create_scope(&self) -> Scope {
        self.provider.create_scope()
    }

    /// Whether this handle refers to the root scope.
    pub fn is_root(&self) -> bool {
        self.state.is_root()
    }

    pub fn is_disposed(&self) -> bool {
        self.state.is_disposed()
    }

    /// Tears the scope down, releasing tracked instances newest-first.
    ///
    /// Idempotent: later calls return `Ok(())`. Every release runs even when
    /// some fail; failures come back together as [`DiError::Disposal`].
    /// Afterwards every resolution through this scope fails with
    /// [`DiError::ScopeDisposed`].
    pub fn dispose(&self) -> DiResult<()> {
        self.state.dispose()
    }

    /// Like [`dispose`](Self::dispose), awaiting [`AsyncDispose`](crate::AsyncDispose)
    /// instances in their place in the release order.
    pub async fn dispose_async(&self) -> DiResult<()> {
        self.state.dispose_async().await
    }

    /// Runs `f` against this scope, then tears the scope down.
    ///
    /// An error from `f` wins over a disposal error.
    ///
    /// # Examples
    ///
    /// ```
    /// use callsite_di::{DiResult, Resolver, ServiceCollection};
    ///
    /// let mut services = ServiceCollection::new();
    /// services.add_scoped_factory::<String, _>(|_| Ok("request".to_string()));
    /// let provider = services.build();
    ///
    /// let scope = provider.create_scope();
    /// let length = scope.using(|s| -> DiResult<usize> { Ok(s.get::<String>()?.len()) }).unwrap();
    /// assert_eq!(length, 7);
    /// assert!(scope.is_disposed());
    /// ```
    pub fn using<R, F>(&self, f: F) -> DiResult<R>
    where
        F: FnOnce(&Scope) -> DiResult<R>,
    {
        let result = f(self);
        let disposed = self.dispose();
        let value = result?;
        disposed.map(|()| value)
    }
}

impl ResolverCore for Scope {
    fn try_resolve_any(&self, key: &Key) -> DiResult<Option<Arc<dyn Any + Send + Sync>>> {
        self.view().resolve(Request::Single(key.clone()))
    }

    fn resolve_all(&self, key: &Key) -> DiResult<Vec<Arc<dyn Any + Send + Sync>>> {
        self.view().resolve_all(key)
    }

    fn track(&self, service: &'static str, release: Release) -> DiResult<()> {
        self.state.track(service, release)
    }
}

impl std::fmt::Debug for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scope")
            .field("root", &self.state.is_root())
            .field("disposed", &self.state.is_disposed())
            .finish()
    }
}

/// Scope-creation capability, resolvable as the `ScopeFactory` service.
///
/// # Examples
///
/// ```
/// use callsite_di::{Resolver, ScopeFactory, ServiceCollection};
///
/// let provider = ServiceCollection::new().build();
/// let factory = provider.get::<ScopeFactory>().unwrap();
/// let scope = factory.create_scope();
/// assert!(!scope.is_root());
/// ```
#[derive(Clone)]
pub struct ScopeFactory {
    provider: ServiceProvider,
}

impl ScopeFactory {
    pub fn create_scope(&self) -> Scope {
        self.provider.create_scope()
    }
}
