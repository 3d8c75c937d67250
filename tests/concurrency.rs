/// Concurrent access tests
///
/// Singletons must be constructed once no matter how many threads race for
/// them, scoped instances stay per scope, and realization is shared safely.

use callsite_di::{
    CompilationMode, Constructor, Injectable, ProviderOptions, Resolver, ServiceCollection,
};
use crossbeam_utils::thread;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};

static EXPENSIVE_BUILDS: AtomicUsize = AtomicUsize::new(0);

struct Expensive;

impl Injectable for Expensive {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::new().build(|_| {
            EXPENSIVE_BUILDS.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(std::time::Duration::from_millis(5));
            Ok(Expensive)
        })]
    }
}

#[test]
fn test_singleton_constructed_once_under_contention() {
    let mut services = ServiceCollection::new();
    services.add_singleton_type::<Expensive>();
    let provider = services.build();

    let barrier = Barrier::new(16);
    let resolved: Vec<Arc<Expensive>> = thread::scope(|s| {
        let handles: Vec<_> = (0..16)
            .map(|_| {
                s.spawn(|_| {
                    barrier.wait();
                    provider.get::<Expensive>().unwrap()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    })
    .unwrap();

    assert_eq!(EXPENSIVE_BUILDS.load(Ordering::SeqCst), 1);
    assert!(resolved.windows(2).all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
}

#[test]
fn test_singleton_constructed_once_across_racing_scopes() {
    struct Pool;

    let builds = Arc::new(AtomicUsize::new(0));
    let b = builds.clone();
    let mut services = ServiceCollection::new();
    services.add_singleton_factory::<Pool, _>(move |_| {
        b.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(std::time::Duration::from_millis(5));
        Ok(Pool)
    });
    let provider = services.build();

    let barrier = Barrier::new(16);
    let resolved: Vec<Arc<Pool>> = thread::scope(|s| {
        let handles: Vec<_> = (0..16)
            .map(|i| {
                let (provider, barrier) = (&provider, &barrier);
                s.spawn(move |_| {
                    // Even threads go through their own scope, odd ones through the root
                    let scope = (i % 2 == 0).then(|| provider.create_scope());
                    barrier.wait();
                    match &scope {
                        Some(scope) => scope.get::<Pool>().unwrap(),
                        None => provider.get::<Pool>().unwrap(),
                    }
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    })
    .unwrap();

    assert_eq!(builds.load(Ordering::SeqCst), 1);
    assert!(resolved.windows(2).all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
}

#[test]
fn test_scoped_instance_shared_by_threads_of_one_scope() {
    struct Unit(usize);

    let counter = Arc::new(AtomicUsize::new(0));
    let c = counter.clone();
    let mut services = ServiceCollection::new();
    services.add_scoped_factory::<Unit, _>(move |_| Ok(Unit(c.fetch_add(1, Ordering::SeqCst))));
    let provider = services.build();

    let scope = provider.create_scope();
    let ids: Vec<usize> = thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|_| s.spawn(|_| scope.get::<Unit>().unwrap().0))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    })
    .unwrap();

    assert!(ids.iter().all(|id| *id == ids[0]));
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[test]
fn test_scopes_on_many_threads_stay_isolated() {
    struct Unit(usize);

    let counter = Arc::new(AtomicUsize::new(0));
    let c = counter.clone();
    let mut services = ServiceCollection::new();
    services.add_scoped_factory::<Unit, _>(move |_| Ok(Unit(c.fetch_add(1, Ordering::SeqCst))));
    let provider = services
        .build_with(ProviderOptions::default().compilation(CompilationMode::Inline))
        .unwrap();

    let mut ids: Vec<usize> = thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                s.spawn(|_| {
                    let scope = provider.create_scope();
                    let first = scope.get::<Unit>().unwrap().0;
                    for _ in 0..50 {
                        assert_eq!(scope.get::<Unit>().unwrap().0, first);
                    }
                    first
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    })
    .unwrap();

    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 8);
}

#[test]
fn test_concurrent_transients_with_background_compilation() {
    struct Leaf;
    struct Node {
        _leaf: Arc<Leaf>,
    }

    impl Injectable for Leaf {
        fn constructors() -> Vec<Constructor<Self>> {
            vec![Constructor::new().build(|_| Ok(Leaf))]
        }
    }
    impl Injectable for Node {
        fn constructors() -> Vec<Constructor<Self>> {
            vec![Constructor::new().param::<Leaf>().build(|a| Ok(Node { _leaf: a.required()? }))]
        }
    }

    let mut services = ServiceCollection::new();
    services.add_singleton_type::<Leaf>();
    services.add_transient_type::<Node>();
    let provider = services.build();

    thread::scope(|s| {
        for _ in 0..8 {
            s.spawn(|_| {
                for _ in 0..200 {
                    let a = provider.get::<Node>().unwrap();
                    let b = provider.get::<Node>().unwrap();
                    assert!(!Arc::ptr_eq(&a, &b));
                    assert!(Arc::ptr_eq(&a._leaf, &b._leaf));
                }
            });
        }
    })
    .unwrap();
}
