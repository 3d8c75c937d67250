//! Compiles a call-site tree into a chain of closures.
//!
//! The compiled form does the same work as the interpreter without matching
//! on node kinds at every step. Shared nodes compile once.

use std::sync::Arc;

use ahash::AHashMap;

use super::interpreter::{finish_uncached, invoke_factory, plain, resolve_cached};
use crate::call_site::{Argument, CacheLocation, CallSite, CallSiteKind};
use crate::constructor::{Activated, Arguments};
use crate::error::DiResult;
use crate::provider::ScopeRef;
use crate::registration::{AnyArc, AnyVec};

/// Compiled accessor.
pub(crate) type Compiled = Arc<dyn Fn(ScopeRef<'_>) -> DiResult<AnyArc> + Send + Sync>;

type Producer = Arc<dyn Fn(ScopeRef<'_>) -> DiResult<Activated> + Send + Sync>;

pub(crate) fn compile(site: &Arc<CallSite>) -> Compiled {
    Compiler::default().node(site)
}

#[derive(Default)]
struct Compiler {
    compiled: AHashMap<usize, Compiled>,
}

impl Compiler {
    fn node(&mut self, site: &Arc<CallSite>) -> Compiled {
        let id = Arc::as_ptr(site) as usize;
        if let Some(compiled) = self.compiled.get(&id) {
            return compiled.clone();
        }

        let producer = self.producer(site);
        let site = Arc::clone(site);
        let compiled: Compiled = match site.cache.location {
            CacheLocation::None => Arc::new(move |scope: ScopeRef<'_>| {
                let produced = producer(scope)?;
                finish_uncached(&site, scope, produced)
            }),
            CacheLocation::Root | CacheLocation::Scope => Arc::new(move |scope: ScopeRef<'_>| {
                resolve_cached(&site, scope, |owner| producer(owner))
            }),
        };
        self.compiled.insert(id, compiled.clone());
        compiled
    }

    fn producer(&mut self, site: &Arc<CallSite>) -> Producer {
        match &site.kind {
            CallSiteKind::Constructor {
                activate,
                arguments,
                ..
            } => {
                let arguments: Vec<Option<Compiled>> = arguments
                    .iter()
                    .map(|argument| match argument {
                        Argument::Service(child) => Some(self.node(child)),
                        Argument::Absent => None,
                    })
                    .collect();
                let activate = activate.clone();
                let service = site.service;
                Arc::new(move |scope: ScopeRef<'_>| {
                    let mut values = Vec::with_capacity(arguments.len());
                    for argument in &arguments {
                        values.push(match argument {
                            Some(compiled) => Some(compiled(scope)?),
                            None => None,
                        });
                    }
                    activate(&mut Arguments::new(service, values))
                })
            }
            CallSiteKind::Factory(factory) => {
                let factory = factory.clone();
                Arc::new(move |scope: ScopeRef<'_>| invoke_factory(&factory, scope))
            }
            CallSiteKind::Constant(value) => {
                let value = value.clone();
                Arc::new(move |_: ScopeRef<'_>| Ok(plain(value.clone())))
            }
            CallSiteKind::Enumerable(items) => {
                let items: Vec<Compiled> = items.iter().map(|item| self.node(item)).collect();
                Arc::new(move |scope: ScopeRef<'_>| {
                    let values = items
                        .iter()
                        .map(|item| item(scope))
                        .collect::<DiResult<AnyVec>>()?;
                    Ok(plain(Arc::new(values)))
                })
            }
            CallSiteKind::ServiceProvider => {
                Arc::new(|scope: ScopeRef<'_>| Ok(plain(Arc::new(scope.handle()))))
            }
            CallSiteKind::ScopeFactory => {
                Arc::new(|scope: ScopeRef<'_>| Ok(plain(Arc::new(scope.scope_factory()))))
            }
        }
    }
}
