//! Realized accessors: the cached, executable form of each requested service.
//!
//! Every request is realized once per provider: its call site is built,
//! validated and wrapped in an interpreting accessor. After a configurable
//! number of calls the accessor is compiled into a closure chain and swapped
//! in atomically. Callers always see one complete accessor or the other.

mod compiler;
mod interpreter;

use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use dashmap::DashMap;

use crate::call_site::{CallSite, CallSiteFactory, Request};
use crate::error::{DiError, DiResult};
use crate::key::Key;
use crate::observer::Observers;
use crate::options::{CompilationMode, ProviderOptions};
use crate::provider::ScopeRef;
use crate::registration::{AnyArc, Registry};
use crate::validation;

pub(crate) use compiler::Compiled;

const INTERPRETED: u8 = 0;
const COMPILING: u8 = 1;
const COMPILED: u8 = 2;

/// Which accessor currently serves a service.
///
/// # Examples
///
/// ```rust
/// use callsite_di::{AccessorState, CompilationMode, ProviderOptions, Resolver, ServiceCollection, key_of_type};
///
/// let mut services = ServiceCollection::new();
/// services.add_transient_factory::<u32, _>(|_| Ok(7));
/// let provider = services
///     .build_with(ProviderOptions::default().compilation(CompilationMode::Inline))
///     .unwrap();
///
/// let key = key_of_type::<u32>();
/// assert_eq!(provider.accessor_state(&key), None);
/// provider.get::<u32>().unwrap();
/// assert_eq!(provider.accessor_state(&key), Some(AccessorState::Interpreted));
/// provider.get::<u32>().unwrap();
/// assert_eq!(provider.accessor_state(&key), Some(AccessorState::Compiled));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessorState {
    Interpreted,
    Compiling,
    Compiled,
}

enum Accessor {
    Interpreted,
    Compiled(Compiled),
}

/// Realized accessor for one request.
pub(crate) struct RealizedService {
    pub(crate) key: Key,
    /// First Scoped service in the plan, when scopes are validated
    pub(crate) scoped: Option<&'static str>,
    site: Arc<CallSite>,
    accessor: ArcSwap<Accessor>,
    calls: AtomicU32,
    state: AtomicU8,
}

impl RealizedService {
    fn new(key: Key, site: Arc<CallSite>, scoped: Option<&'static str>) -> Self {
        Self {
            key,
            scoped,
            site,
            accessor: ArcSwap::from_pointee(Accessor::Interpreted),
            calls: AtomicU32::new(0),
            state: AtomicU8::new(INTERPRETED),
        }
    }

    pub(crate) fn state(&self) -> AccessorState {
        match self.state.load(Ordering::Acquire) {
            INTERPRETED => AccessorState::Interpreted,
            COMPILING => AccessorState::Compiling,
            _ => AccessorState::Compiled,
        }
    }

    /// Produces an instance for `scope` with whichever accessor is installed.
    pub(crate) fn invoke(self: &Arc<Self>, engine: &Engine, scope: ScopeRef<'_>) -> DiResult<AnyArc> {
        if engine.compilation != CompilationMode::Disabled
            && self.state.load(Ordering::Acquire) == INTERPRETED
        {
            let calls = self.calls.fetch_add(1, Ordering::Relaxed).saturating_add(1);
            if calls >= engine.compile_threshold {
                self.promote(engine);
            }
        }

        let accessor = self.accessor.load();
        match &**accessor {
            Accessor::Interpreted => interpreter::interpret(&self.site, scope),
            Accessor::Compiled(compiled) => compiled(scope),
        }
    }

    /// Interpreted -> Compiling, once. The swap to Compiled happens when the
    /// compiled form is ready.
    fn promote(self: &Arc<Self>, engine: &Engine) {
        if self
            .state
            .compare_exchange(INTERPRETED, COMPILING, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        match engine.compilation {
            CompilationMode::Inline => self.install(compiler::compile(&self.site), &engine.observers),
            CompilationMode::Background => {
                let service = Arc::clone(self);
                let observers = Arc::clone(&engine.observers);
                rayon::spawn(move || {
                    let compiled = compiler::compile(&service.site);
                    service.install(compiled, &observers);
                });
            }
            CompilationMode::Disabled => {}
        }
    }

    fn install(&self, compiled: Compiled, observers: &Observers) {
        self.accessor.store(Arc::new(Accessor::Compiled(compiled)));
        self.state.store(COMPILED, Ordering::Release);
        tracing::debug!(service = self.key.display_name(), "accessor compiled");
        if observers.has_observers() {
            observers.accessor_compiled(&self.key);
        }
    }
}

#[derive(Clone)]
enum Realization {
    Realized(Arc<RealizedService>),
    Missing,
    Failed(DiError),
}

impl Realization {
    fn into_result(self) -> DiResult<Option<Arc<RealizedService>>> {
        match self {
            Realization::Realized(service) => Ok(Some(service)),
            Realization::Missing => Ok(None),
            Realization::Failed(error) => Err(error),
        }
    }
}

/// Realization cache key: the request plus whether its key carries a
/// closed generic shape. Keys compare by `TypeId` alone, and the two forms
/// of one type may see different candidates.
type RequestForm = (Request, bool);

fn form(request: &Request) -> RequestForm {
    (request.clone(), request.key().generic().is_some())
}

/// Per-provider cache of realized accessors, keyed by request.
///
/// Build failures are cached like successes: a structural error is reported
/// to every caller of the same request and never retried.
pub(crate) struct Engine {
    sites: CallSiteFactory,
    services: DashMap<RequestForm, Realization>,
    validate_scopes: bool,
    compilation: CompilationMode,
    compile_threshold: u32,
    observers: Arc<Observers>,
}

impl Engine {
    pub(crate) fn new(registry: Arc<Registry>, options: &ProviderOptions, observers: Arc<Observers>) -> Self {
        Self {
            sites: CallSiteFactory::new(registry),
            services: DashMap::new(),
            validate_scopes: options.validate_scopes,
            compilation: options.compilation,
            compile_threshold: options.compile_threshold.max(1),
            observers,
        }
    }

    pub(crate) fn registry(&self) -> &Registry {
        self.sites.registry()
    }

    /// Realized accessor for `request`, building it on first use.
    pub(crate) fn realize(&self, request: &Request) -> DiResult<Option<Arc<RealizedService>>> {
        let identity = form(request);
        if let Some(realization) = self.services.get(&identity) {
            return realization.value().clone().into_result();
        }

        // Built outside the map lock; racing builders keep the first result
        let realization = self.build(request);
        self.services
            .entry(identity)
            .or_insert(realization)
            .clone()
            .into_result()
    }

    fn build(&self, request: &Request) -> Realization {
        let key = request.key();
        let site = match self.sites.build(request) {
            Ok(Some(site)) => site,
            Ok(None) => return Realization::Missing,
            Err(error) => {
                tracing::debug!(service = key.display_name(), %error, "call site build failed");
                return Realization::Failed(error);
            }
        };

        let scoped = if self.validate_scopes {
            match validation::validate(&site) {
                Ok(scoped) => scoped,
                Err(error) => {
                    tracing::debug!(service = key.display_name(), %error, "call site rejected");
                    return Realization::Failed(error);
                }
            }
        } else {
            None
        };

        tracing::debug!(
            service = key.display_name(),
            enumerable = request.is_all(),
            "call site built"
        );
        if self.observers.has_observers() {
            self.observers.call_site_built(key, request.is_all());
        }
        Realization::Realized(Arc::new(RealizedService::new(key.clone(), site, scoped)))
    }

    pub(crate) fn accessor_state(&self, key: &Key) -> Option<AccessorState> {
        match self.services.get(&form(&Request::Single(key.clone())))?.value() {
            Realization::Realized(service) => Some(service.state()),
            _ => None,
        }
    }
}
