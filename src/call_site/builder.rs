use std::sync::Arc;

use dashmap::DashMap;

use super::chain::CallSiteChain;
use super::{Argument, CacheKey, CallSite, CallSiteKind, Request, ResultCache};
use crate::constructor::{ConstructorInfo, Implementation, ParamKind};
use crate::descriptors::{ServiceDescriptor, ServiceSource};
use crate::error::{DiError, DiResult};
use crate::key::{key_of_type, Key};
use crate::provider::{Scope, ScopeFactory};
use crate::registration::{Candidate, Registry};

enum Eligibility {
    Eligible(Vec<Argument>),
    /// First required parameter without a registration
    Missing(&'static str),
}

/// Builds call sites from the registry and keeps every node it built.
///
/// Sites are cached per `(service, registration)` and per enumerable
/// request, so a plan built twice shares its nodes. Enumerables are cached
/// separately for plain and closed generic keys because the two forms can
/// see different candidates. Failed builds are not cached here;
/// callers cache the error for the requested service instead.
pub(crate) struct CallSiteFactory {
    registry: Arc<Registry>,
    sites: DashMap<CacheKey, Arc<CallSite>>,
    enumerables: DashMap<(Key, bool), Arc<CallSite>>,
}

impl CallSiteFactory {
    pub(crate) fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            sites: DashMap::new(),
            enumerables: DashMap::new(),
        }
    }

    pub(crate) fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Call site for `request`; `Ok(None)` when a single request has no registration.
    pub(crate) fn build(&self, request: &Request) -> DiResult<Option<Arc<CallSite>>> {
        let mut chain = CallSiteChain::default();
        self.create(request, &mut chain)
    }

    fn create(&self, request: &Request, chain: &mut CallSiteChain) -> DiResult<Option<Arc<CallSite>>> {
        match request {
            Request::Single(key) => self.create_single(key, chain),
            Request::All(key) => self.create_enumerable(key, chain).map(Some),
        }
    }

    fn create_single(&self, key: &Key, chain: &mut CallSiteChain) -> DiResult<Option<Arc<CallSite>>> {
        if let Some(site) = self.built_in(key) {
            return Ok(Some(site));
        }
        let candidates = self.registry.candidates(key);
        match candidates.last() {
            Some(candidate) => self.create_exact(candidate, key, chain).map(Some),
            None => Ok(None),
        }
    }

    fn create_enumerable(&self, key: &Key, chain: &mut CallSiteChain) -> DiResult<Arc<CallSite>> {
        let form = (key.clone(), key.generic().is_some());
        if let Some(site) = self.enumerables.get(&form) {
            return Ok(site.clone());
        }

        let items = self
            .registry
            .candidates(key)
            .iter()
            .map(|candidate| self.create_exact(candidate, key, chain))
            .collect::<DiResult<Vec<_>>>()?;

        let site = Arc::new(CallSite {
            service: key.display_name(),
            lifetime: None,
            cache: ResultCache::none(CacheKey::synthetic(key)),
            kind: CallSiteKind::Enumerable(items),
        });
        Ok(self.enumerables.entry(form).or_insert(site).clone())
    }

    fn built_in(&self, key: &Key) -> Option<Arc<CallSite>> {
        let kind = if *key == key_of_type::<Scope>() {
            CallSiteKind::ServiceProvider
        } else if *key == key_of_type::<ScopeFactory>() {
            CallSiteKind::ScopeFactory
        } else {
            return None;
        };
        let cache_key = CacheKey::synthetic(key);
        let site = self.sites.entry(cache_key.clone()).or_insert_with(|| {
            Arc::new(CallSite {
                service: key.display_name(),
                lifetime: None,
                cache: ResultCache::none(cache_key),
                kind,
            })
        });
        Some(site.clone())
    }

    fn create_exact(
        &self,
        candidate: &Candidate,
        key: &Key,
        chain: &mut CallSiteChain,
    ) -> DiResult<Arc<CallSite>> {
        let cache_key = CacheKey {
            key: key.clone(),
            registration: candidate.registration,
        };
        if let Some(site) = self.sites.get(&cache_key) {
            return Ok(site.clone());
        }

        chain.enter(key)?;
        let built = self.create_uncached(&candidate.descriptor, key, cache_key.clone(), chain);
        chain.exit();

        let site = Arc::new(built?);
        tracing::trace!(
            service = key.display_name(),
            registration = candidate.registration,
            "call site created"
        );
        Ok(self.sites.entry(cache_key).or_insert(site).clone())
    }

    fn create_uncached(
        &self,
        descriptor: &ServiceDescriptor,
        key: &Key,
        cache_key: CacheKey,
        chain: &mut CallSiteChain,
    ) -> DiResult<CallSite> {
        let (cache, kind) = match &descriptor.source {
            ServiceSource::Instance(value) => {
                (ResultCache::none(cache_key), CallSiteKind::Constant(value.clone()))
            }
            ServiceSource::Factory(factory) => (
                ResultCache::new(descriptor.lifetime, cache_key),
                CallSiteKind::Factory(factory.clone()),
            ),
            ServiceSource::Implementation(implementation) => (
                ResultCache::new(descriptor.lifetime, cache_key),
                self.constructor_site(implementation, chain)?,
            ),
        };

        Ok(CallSite {
            service: key.display_name(),
            lifetime: Some(descriptor.lifetime),
            cache,
            kind,
        })
    }

    /// Picks the greediest constructor whose required parameters all resolve.
    fn constructor_site(
        &self,
        implementation: &Implementation,
        chain: &mut CallSiteChain,
    ) -> DiResult<CallSiteKind> {
        if implementation.constructors.is_empty() {
            return Err(DiError::NoConstructor(implementation.type_name));
        }

        let mut ordered: Vec<&ConstructorInfo> = implementation.constructors.iter().collect();
        ordered.sort_by(|a, b| b.params.len().cmp(&a.params.len()));

        let mut best: Option<(&ConstructorInfo, Vec<Argument>)> = None;
        let mut missing = None;

        for constructor in ordered {
            let arity = constructor.params.len();
            if let Some((chosen, _)) = &best {
                if arity < chosen.params.len() {
                    break;
                }
            }

            match self.arguments(constructor, chain)? {
                Eligibility::Eligible(arguments) => {
                    if best.is_some() {
                        return Err(DiError::AmbiguousConstructor {
                            implementation: implementation.type_name,
                            arity,
                        });
                    }
                    best = Some((constructor, arguments));
                }
                Eligibility::Missing(service) => missing = Some(service),
            }
        }

        match best {
            Some((constructor, arguments)) => Ok(CallSiteKind::Constructor {
                implementation: implementation.type_name,
                activate: constructor.activate.clone(),
                arguments,
            }),
            None => Err(DiError::Unresolvable {
                service: missing.unwrap_or(implementation.type_name),
                required_by: implementation.type_name,
                chain: chain.names(),
            }),
        }
    }

    fn arguments(&self, constructor: &ConstructorInfo, chain: &mut CallSiteChain) -> DiResult<Eligibility> {
        let mut arguments = Vec::with_capacity(constructor.params.len());
        for param in &constructor.params {
            let argument = match param.kind {
                ParamKind::Required => match self.create_single(&param.key, chain)? {
                    Some(site) => Argument::Service(site),
                    None => return Ok(Eligibility::Missing(param.key.display_name())),
                },
                ParamKind::Optional => match self.create_single(&param.key, chain)? {
                    Some(site) => Argument::Service(site),
                    None => Argument::Absent,
                },
                ParamKind::All => Argument::Service(self.create_enumerable(&param.key, chain)?),
            };
            arguments.push(argument);
        }
        Ok(Eligibility::Eligible(arguments))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constructor::{Constructor, Injectable};
    use crate::lifetime::Lifetime;

    struct Leaf;
    impl Injectable for Leaf {
        fn constructors() -> Vec<Constructor<Self>> {
            vec![Constructor::new().build(|_| Ok(Leaf))]
        }
    }

    struct Root;
    impl Injectable for Root {
        fn constructors() -> Vec<Constructor<Self>> {
            vec![
                Constructor::new().build(|_| Ok(Root)),
                Constructor::new().param::<Leaf>().build(|_| Ok(Root)),
                Constructor::new().param::<Leaf>().param::<u64>().build(|_| Ok(Root)),
            ]
        }
    }

    fn factory(register: impl FnOnce(&mut Registry)) -> CallSiteFactory {
        let mut registry = Registry::new();
        register(&mut registry);
        CallSiteFactory::new(Arc::new(registry))
    }

    fn arity(site: &CallSite) -> usize {
        match &site.kind {
            CallSiteKind::Constructor { arguments, .. } => arguments.len(),
            _ => panic!("not a constructor site: {}", site.service),
        }
    }

    #[test]
    fn greediest_satisfiable_constructor_wins() {
        let sites = factory(|r| {
            r.insert(ServiceDescriptor::implementation::<Leaf>(Lifetime::Transient));
            r.insert(ServiceDescriptor::implementation::<Root>(Lifetime::Transient));
        });
        let site = sites.build(&Request::Single(key_of_type::<Root>())).unwrap().unwrap();
        assert_eq!(arity(&site), 1);
    }

    #[test]
    fn sites_are_shared_between_builds() {
        let sites = factory(|r| {
            r.insert(ServiceDescriptor::implementation::<Leaf>(Lifetime::Singleton));
            r.insert(ServiceDescriptor::implementation::<Root>(Lifetime::Transient));
        });
        let first = sites.build(&Request::Single(key_of_type::<Root>())).unwrap().unwrap();
        let second = sites.build(&Request::Single(key_of_type::<Root>())).unwrap().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        let leaf = sites.build(&Request::Single(key_of_type::<Leaf>())).unwrap().unwrap();
        assert!(Arc::ptr_eq(first.children().next().unwrap(), &leaf));
    }

    #[test]
    fn unregistered_single_is_none_and_enumerable_is_empty() {
        let sites = factory(|_| {});
        assert!(sites.build(&Request::Single(key_of_type::<Leaf>())).unwrap().is_none());
        let all = sites.build(&Request::All(key_of_type::<Leaf>())).unwrap().unwrap();
        assert_eq!(all.children().count(), 0);
    }

    #[test]
    fn enumerable_items_are_keyed_by_registration() {
        let sites = factory(|r| {
            r.insert(ServiceDescriptor::implementation::<Leaf>(Lifetime::Singleton));
            r.insert(ServiceDescriptor::implementation::<Root>(Lifetime::Transient));
            r.insert(ServiceDescriptor::implementation::<Leaf>(Lifetime::Singleton));
        });
        let all = sites.build(&Request::All(key_of_type::<Leaf>())).unwrap().unwrap();
        let registrations: Vec<usize> = all.children().map(|c| c.cache.key.registration).collect();
        assert_eq!(registrations, vec![0, 2]);
        let single = sites.build(&Request::Single(key_of_type::<Leaf>())).unwrap().unwrap();
        assert!(Arc::ptr_eq(all.children().last().unwrap(), &single));
    }
}
