//! Service registry holding every descriptor in registration order.

use std::any::Any;
use std::sync::Arc;

use ahash::AHashMap;
use dashmap::DashMap;
use smallvec::SmallVec;

use crate::descriptors::{OpenGenericDescriptor, ServiceDescriptor, ServiceSource};
use crate::error::{DiError, DiResult};
use crate::key::Key;

// Type-erased Arc for storage
pub(crate) type AnyArc = Arc<dyn Any + Send + Sync>;

/// Enumerable results are stored as one erased `Vec` of erased items.
pub(crate) type AnyVec = Vec<AnyArc>;

pub(crate) fn downcast_service<T: Send + Sync + 'static>(any: AnyArc) -> DiResult<Arc<T>> {
    any.downcast::<T>()
        .map_err(|_| DiError::TypeMismatch(std::any::type_name::<T>()))
}

// Trait objects live inside the erased slot as Arc<Arc<dyn Trait>>
pub(crate) fn downcast_trait<T: ?Sized + Send + Sync + 'static>(any: AnyArc) -> DiResult<Arc<T>> {
    any.downcast::<Arc<T>>()
        .map(|boxed| (*boxed).clone())
        .map_err(|_| DiError::TypeMismatch(std::any::type_name::<T>()))
}

fn items(any: AnyArc) -> DiResult<Arc<AnyVec>> {
    any.downcast::<AnyVec>()
        .map_err(|_| DiError::TypeMismatch("enumerable"))
}

pub(crate) fn downcast_items(any: AnyArc) -> DiResult<Vec<AnyArc>> {
    Ok(items(any)?.as_ref().clone())
}

pub(crate) fn downcast_all<T: Send + Sync + 'static>(any: AnyArc) -> DiResult<Vec<Arc<T>>> {
    items(any)?.iter().cloned().map(downcast_service::<T>).collect()
}

pub(crate) fn downcast_all_trait<T: ?Sized + Send + Sync + 'static>(any: AnyArc) -> DiResult<Vec<Arc<T>>> {
    items(any)?.iter().cloned().map(downcast_trait::<T>).collect()
}

enum Entry {
    Closed(Arc<ServiceDescriptor>),
    Open(Arc<OpenGenericDescriptor>),
}

/// One descriptor able to serve a key, with the position of the
/// registration it came from.
///
/// The position identifies the cached instance: it does not depend on which
/// other candidates a lookup sees, so single and enumerable resolution share
/// instances whatever form the key arrived in.
#[derive(Clone)]
pub(crate) struct Candidate {
    pub(crate) registration: usize,
    pub(crate) descriptor: Arc<ServiceDescriptor>,
}

/// Ordered multimap from service key to descriptors.
///
/// Mutable only through `ServiceCollection`; once moved into a provider it is
/// read-only apart from the cache of descriptors synthesized for closed
/// generic requests.
pub(crate) struct Registry {
    /// Every registration, position == registration order
    entries: Vec<Entry>,
    /// Closed registrations by service key
    index: AHashMap<Key, SmallVec<[usize; 2]>>,
    /// Open generic registrations by definition name
    open: AHashMap<&'static str, SmallVec<[usize; 2]>>,
    /// Merged candidates per closed generic key, filled lazily
    closed: DashMap<Key, Arc<[Candidate]>>,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self {
            entries: Vec::new(),
            index: AHashMap::new(),
            open: AHashMap::new(),
            closed: DashMap::new(),
        }
    }

    /// Appends a closed descriptor.
    pub(crate) fn insert(&mut self, descriptor: ServiceDescriptor) {
        let position = self.entries.len();
        self.index
            .entry(descriptor.key.clone())
            .or_default()
            .push(position);
        self.entries.push(Entry::Closed(Arc::new(descriptor)));
    }

    /// Appends an open generic descriptor.
    pub(crate) fn insert_open(&mut self, descriptor: OpenGenericDescriptor) {
        let position = self.entries.len();
        self.open
            .entry(descriptor.definition)
            .or_default()
            .push(position);
        self.entries.push(Entry::Open(Arc::new(descriptor)));
    }

    pub(crate) fn contains_key(&self, key: &Key) -> bool {
        self.index.contains_key(key)
    }

    /// Every descriptor that can serve `key`, in registration order.
    ///
    /// A closed generic key merges explicit closed registrations with every
    /// open registration of its definition whose constraint accepts the type
    /// arguments; the merged list is built once and reused. A plain type key
    /// carries no type arguments, so it sees only explicit registrations and
    /// never touches the merged cache.
    pub(crate) fn candidates(&self, key: &Key) -> Arc<[Candidate]> {
        let Some(generic) = key.generic() else {
            return self.exact(key, &[]);
        };
        if self.open.is_empty() {
            return self.exact(key, &[]);
        }
        if let Some(cached) = self.closed.get(key) {
            return cached.clone();
        }

        let mut open_positions: SmallVec<[usize; 2]> = SmallVec::new();
        for &position in self.open.get(generic.definition).into_iter().flatten() {
            if let Entry::Open(open) = &self.entries[position] {
                if open.accepts(&generic.arguments) {
                    open_positions.push(position);
                }
            }
        }

        let merged = self.exact(key, &open_positions);
        self.closed
            .entry(key.clone())
            .or_insert(merged)
            .clone()
    }

    fn exact(&self, key: &Key, open_positions: &[usize]) -> Arc<[Candidate]> {
        let mut positions: SmallVec<[usize; 4]> = self
            .index
            .get(key)
            .map(|p| p.iter().copied().collect())
            .unwrap_or_default();
        positions.extend(open_positions.iter().copied());
        positions.sort_unstable();

        positions
            .into_iter()
            .filter_map(|position| {
                let descriptor = match &self.entries[position] {
                    Entry::Closed(descriptor) => descriptor.clone(),
                    Entry::Open(open) => {
                        let generic = key.generic()?;
                        Arc::new(ServiceDescriptor {
                            key: key.clone(),
                            lifetime: open.lifetime,
                            source: ServiceSource::Implementation((generic.implementation)()),
                        })
                    }
                };
                Some(Candidate {
                    registration: position,
                    descriptor,
                })
            })
            .collect::<Vec<_>>()
            .into()
    }

    /// Closed descriptors in registration order.
    pub(crate) fn iter(&self) -> impl Iterator<Item = &Arc<ServiceDescriptor>> {
        self.entries.iter().filter_map(|entry| match entry {
            Entry::Closed(descriptor) => Some(descriptor),
            Entry::Open(_) => None,
        })
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constructor::{Constructor, Injectable};
    use crate::key::{key_of_generic, key_of_type, GenericService};
    use crate::lifetime::Lifetime;
    use std::marker::PhantomData;

    #[test]
    fn candidates_preserve_registration_order() {
        let mut registry = Registry::new();
        registry.insert(ServiceDescriptor::instance(1u32));
        registry.insert(ServiceDescriptor::instance(2u32));
        registry.insert(ServiceDescriptor::instance("other"));
        registry.insert(ServiceDescriptor::instance(3u32));

        let found = registry.candidates(&key_of_type::<u32>());
        let values: Vec<u32> = found
            .iter()
            .map(|c| match &c.descriptor.source {
                ServiceSource::Instance(v) => *v.clone().downcast::<u32>().unwrap(),
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(values, vec![1, 2, 3]);
        let positions: Vec<usize> = found.iter().map(|c| c.registration).collect();
        assert_eq!(positions, vec![0, 1, 3]);
        assert_eq!(registry.len(), 4);
    }

    struct Boxed<T>(PhantomData<T>);

    impl<T: Send + Sync + 'static> Injectable for Boxed<T> {
        fn constructors() -> Vec<Constructor<Self>> {
            vec![Constructor::new().build(|_| Ok(Boxed(PhantomData)))]
        }
    }

    impl<T: Send + Sync + 'static> GenericService for Boxed<T> {
        const DEFINITION: &'static str = "Boxed<>";

        fn type_arguments() -> Vec<Key> {
            vec![key_of_type::<T>()]
        }
    }

    #[test]
    fn plain_lookup_does_not_fix_generic_candidates() {
        let mut registry = Registry::new();
        registry.insert(ServiceDescriptor::factory(Lifetime::Singleton, |_| {
            Ok(Boxed::<u8>(PhantomData))
        }));
        registry.insert_open(OpenGenericDescriptor {
            definition: "Boxed<>",
            lifetime: Lifetime::Transient,
            constraint: None,
        });

        assert_eq!(registry.candidates(&key_of_type::<Boxed<u8>>()).len(), 1);
        let merged = registry.candidates(&key_of_generic::<Boxed<u8>>());
        let positions: Vec<usize> = merged.iter().map(|c| c.registration).collect();
        assert_eq!(positions, vec![0, 1]);
        assert_eq!(registry.candidates(&key_of_type::<Boxed<u8>>()).len(), 1);
        assert!(registry.candidates(&key_of_type::<Boxed<u16>>()).is_empty());
        assert_eq!(registry.candidates(&key_of_generic::<Boxed<u16>>()).len(), 1);
    }

    #[test]
    fn unknown_key_has_no_candidates() {
        let mut registry = Registry::new();
        registry.insert(ServiceDescriptor::instance(1u32));
        assert!(registry.candidates(&key_of_type::<u64>()).is_empty());
        assert!(!registry.contains_key(&key_of_type::<u64>()));
        assert!(registry.iter().all(|d| d.lifetime == Lifetime::Singleton));
    }
}
