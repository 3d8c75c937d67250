//! Tree-walking execution of call sites, plus the caching and tracking
//! helpers the compiled form shares.

use std::sync::Arc;

use crate::call_site::{Argument, CacheLocation, CallSite, CallSiteKind};
use crate::constructor::{Activated, Arguments};
use crate::descriptors::FactoryFn;
use crate::error::{DiError, DiResult};
use crate::internal::{Frame, StackGuard};
use crate::provider::{ResolverContext, ScopeRef};
use crate::registration::{AnyArc, AnyVec};

pub(crate) fn interpret(site: &CallSite, scope: ScopeRef<'_>) -> DiResult<AnyArc> {
    match site.cache.location {
        CacheLocation::None => {
            let produced = produce(site, scope)?;
            finish_uncached(site, scope, produced)
        }
        CacheLocation::Root | CacheLocation::Scope => {
            resolve_cached(site, scope, |owner| produce(site, owner))
        }
    }
}

fn produce(site: &CallSite, scope: ScopeRef<'_>) -> DiResult<Activated> {
    match &site.kind {
        CallSiteKind::Constructor {
            activate,
            arguments,
            ..
        } => {
            let values = arguments
                .iter()
                .map(|argument| match argument {
                    Argument::Service(child) => interpret(child, scope).map(Some),
                    Argument::Absent => Ok(None),
                })
                .collect::<DiResult<Vec<_>>>()?;
            activate(&mut Arguments::new(site.service, values))
        }
        CallSiteKind::Factory(factory) => invoke_factory(factory, scope),
        CallSiteKind::Constant(value) => Ok(plain(value.clone())),
        CallSiteKind::Enumerable(items) => {
            let values = items
                .iter()
                .map(|item| interpret(item, scope))
                .collect::<DiResult<AnyVec>>()?;
            Ok(plain(Arc::new(values)))
        }
        CallSiteKind::ServiceProvider => Ok(plain(Arc::new(scope.handle()))),
        CallSiteKind::ScopeFactory => Ok(plain(Arc::new(scope.scope_factory()))),
    }
}

pub(crate) fn plain(value: AnyArc) -> Activated {
    Activated {
        value,
        release: None,
    }
}

pub(crate) fn invoke_factory(factory: &FactoryFn, scope: ScopeRef<'_>) -> DiResult<Activated> {
    factory(&ResolverContext::new(scope)).map(plain)
}

/// Transient result: the requesting scope tracks its release hook.
pub(crate) fn finish_uncached(site: &CallSite, scope: ScopeRef<'_>, produced: Activated) -> DiResult<AnyArc> {
    if let Some(release) = produced.release {
        scope.state.track(site.service, release)?;
    }
    Ok(produced.value)
}

/// Singleton or scoped result: looked up in, and produced for, the scope
/// that owns the cache, exactly once per slot.
pub(crate) fn resolve_cached<'a, F>(site: &CallSite, scope: ScopeRef<'a>, produce: F) -> DiResult<AnyArc>
where
    F: FnOnce(ScopeRef<'a>) -> DiResult<Activated>,
{
    let owner = match site.cache.location {
        CacheLocation::Root => scope.root(),
        _ => scope,
    };
    if owner.state.is_disposed() {
        return Err(DiError::ScopeDisposed(site.service));
    }

    let cell = owner.state.slot(site.service, &site.cache.key)?;
    if let Some(value) = cell.get() {
        return Ok(value.clone());
    }

    // Reentrant initialization of the same slot on this thread would block forever
    let _guard = StackGuard::enter(Frame::Slot(Arc::as_ptr(&cell) as usize), site.service)?;
    cell.get_or_try_init(|| -> DiResult<AnyArc> {
        let produced = produce(owner)?;
        if let Some(release) = produced.release {
            owner.state.track(site.service, release)?;
        }
        Ok(produced.value)
    })
    .cloned()
}
