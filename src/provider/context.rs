//! The resolver handed to factories.

use std::any::Any;
use std::sync::Arc;

use super::ScopeRef;
use crate::call_site::Request;
use crate::error::DiResult;
use crate::key::Key;
use crate::traits::{Release, ResolverCore};

/// Resolver passed to factory closures.
///
/// Resolutions go through the scope the factory is producing for: the root
/// for singletons, the requesting scope for scoped and transient services.
/// Release hooks registered here are tracked by that same scope.
///
/// # Examples
///
/// ```
/// use callsite_di::{Resolver, ServiceCollection};
/// use std::sync::Arc;
///
/// struct Tenant(&'static str);
/// struct Greeter { tenant: Arc<Tenant> }
///
/// let mut services = ServiceCollection::new();
/// services.add_scoped_factory::<Tenant, _>(|_| Ok(Tenant("acme")));
/// services.add_transient_factory::<Greeter, _>(|ctx| {
///     // Transients resolve through the requesting scope
///     assert!(!ctx.is_root());
///     Ok(Greeter { tenant: ctx.get::<Tenant>()? })
/// });
///
/// let scope = services.build().create_scope();
/// assert_eq!(scope.get::<Greeter>().unwrap().tenant.0, "acme");
/// ```
pub struct ResolverContext<'a> {
    scope: ScopeRef<'a>,
}

impl<'a> ResolverContext<'a> {
    pub(crate) fn new(scope: ScopeRef<'a>) -> Self {
        Self { scope }
    }

    /// Whether the factory is producing for the root scope.
    pub fn is_root(&self) -> bool {
        self.scope.state.is_root()
    }
}

impl ResolverCore for ResolverContext<'_> {
    fn try_resolve_any(&self, key: &Key) -> DiResult<Option<Arc<dyn Any + Send + Sync>>> {
        self.scope.resolve(Request::Single(key.clone()))
    }

    fn resolve_all(&self, key: &Key) -> DiResult<Vec<Arc<dyn Any + Send + Sync>>> {
        self.scope.resolve_all(key)
    }

    fn track(&self, service: &'static str, release: Release) -> DiResult<()> {
        self.scope.state.track(service, release)
    }
}
