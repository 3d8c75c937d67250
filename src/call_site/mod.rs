//! Call sites: the resolution plan for one requested service.
//!
//! A call site is an immutable node describing one step of object
//! construction. Children are shared through `Arc`, so the plan for a fixed
//! registry is a DAG in which the same `(service, registration)` is always
//! the same node.

mod builder;
mod chain;

use std::fmt;
use std::sync::Arc;

pub(crate) use builder::CallSiteFactory;

use crate::constructor::Activator;
use crate::descriptors::FactoryFn;
use crate::key::Key;
use crate::lifetime::Lifetime;
use crate::registration::AnyArc;

/// What a caller asked for: the last registration, or every registration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum Request {
    Single(Key),
    All(Key),
}

impl Request {
    pub(crate) fn key(&self) -> &Key {
        match self {
            Request::Single(key) | Request::All(key) => key,
        }
    }

    pub(crate) fn is_all(&self) -> bool {
        matches!(self, Request::All(_))
    }
}

/// Cache identity of one descriptor: its service key and the position of
/// its registration.
///
/// Single resolution uses the last candidate; enumerable resolution uses the
/// same candidate for its last item, so both share one instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct CacheKey {
    pub(crate) key: Key,
    pub(crate) registration: usize,
}

impl CacheKey {
    /// Identity of nodes that are not produced from a registration.
    pub(crate) fn synthetic(key: &Key) -> Self {
        Self {
            key: key.clone(),
            registration: usize::MAX,
        }
    }
}

/// Where a produced value is cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CacheLocation {
    /// Root scope (singletons)
    Root,
    /// Requesting scope (scoped services)
    Scope,
    /// Not cached; disposables are tracked by the requesting scope
    None,
}

#[derive(Debug, Clone)]
pub(crate) struct ResultCache {
    pub(crate) location: CacheLocation,
    pub(crate) key: CacheKey,
}

impl ResultCache {
    fn new(lifetime: Lifetime, key: CacheKey) -> Self {
        let location = match lifetime {
            Lifetime::Singleton => CacheLocation::Root,
            Lifetime::Scoped => CacheLocation::Scope,
            Lifetime::Transient => CacheLocation::None,
        };
        Self { location, key }
    }

    fn none(key: CacheKey) -> Self {
        Self {
            location: CacheLocation::None,
            key,
        }
    }
}

pub(crate) enum Argument {
    Service(Arc<CallSite>),
    /// Optional parameter with no registration
    Absent,
}

pub(crate) enum CallSiteKind {
    Constructor {
        implementation: &'static str,
        activate: Activator,
        arguments: Vec<Argument>,
    },
    Factory(FactoryFn),
    Constant(AnyArc),
    Enumerable(Vec<Arc<CallSite>>),
    /// The requesting scope itself
    ServiceProvider,
    ScopeFactory,
}

pub(crate) struct CallSite {
    pub(crate) service: &'static str,
    /// Lifetime of the registration, `None` for enumerables and built-ins
    pub(crate) lifetime: Option<Lifetime>,
    pub(crate) cache: ResultCache,
    pub(crate) kind: CallSiteKind,
}

impl CallSite {
    /// Direct children in argument order.
    pub(crate) fn children(&self) -> impl Iterator<Item = &Arc<CallSite>> {
        let no_arguments: &[Argument] = &[];
        let no_items: &[Arc<CallSite>] = &[];
        let (arguments, items) = match &self.kind {
            CallSiteKind::Constructor { arguments, .. } => (arguments.as_slice(), no_items),
            CallSiteKind::Enumerable(items) => (no_arguments, items.as_slice()),
            _ => (no_arguments, no_items),
        };
        arguments
            .iter()
            .filter_map(|argument| match argument {
                Argument::Service(site) => Some(site),
                Argument::Absent => None,
            })
            .chain(items.iter())
    }
}

impl fmt::Debug for CallSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match &self.kind {
            CallSiteKind::Constructor { implementation, .. } => *implementation,
            CallSiteKind::Factory(_) => "factory",
            CallSiteKind::Constant(_) => "constant",
            CallSiteKind::Enumerable(_) => "enumerable",
            CallSiteKind::ServiceProvider => "service provider",
            CallSiteKind::ScopeFactory => "scope factory",
        };
        f.debug_struct("CallSite")
            .field("service", &self.service)
            .field("kind", &kind)
            .field("lifetime", &self.lifetime)
            .field("cache", &self.cache)
            .field("children", &self.children().collect::<Vec<_>>())
            .finish()
    }
}
