use callsite_di::{
    key_of_type, Constructor, DescriptorKind, DiError, Injectable, Lifetime, Resolver, ResolverCore,
    ServiceCollection, ServiceDescriptor,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

// ===== Test Services =====

struct Config {
    name: &'static str,
}

struct Clock;

struct Metrics;

struct Service {
    config: Arc<Config>,
    metrics: Option<Arc<Metrics>>,
}

impl Injectable for Service {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![
            Constructor::new().param::<Config>().build(|args| {
                Ok(Service {
                    config: args.required()?,
                    metrics: None,
                })
            }),
            Constructor::new()
                .param::<Config>()
                .param::<Metrics>()
                .build(|args| {
                    Ok(Service {
                        config: args.required()?,
                        metrics: Some(args.required()?),
                    })
                }),
        ]
    }
}

#[test]
fn test_singleton_instance() {
    let mut services = ServiceCollection::new();
    services.add_singleton(Config { name: "app" });

    let provider = services.build();
    let a = provider.get::<Config>().unwrap();
    let b = provider.get::<Config>().unwrap();
    assert_eq!(a.name, "app");
    assert!(Arc::ptr_eq(&a, &b));
}

#[test]
fn test_singleton_factory_runs_once() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();

    let mut services = ServiceCollection::new();
    services.add_singleton_factory::<Clock, _>(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(Clock)
    });

    let provider = services.build();
    let scope = provider.create_scope();
    let a = provider.get::<Clock>().unwrap();
    let b = scope.get::<Clock>().unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_transient_type_is_fresh_each_time() {
    struct Token;
    impl Injectable for Token {
        fn constructors() -> Vec<Constructor<Self>> {
            vec![Constructor::new().build(|_| Ok(Token))]
        }
    }

    let mut services = ServiceCollection::new();
    services.add_transient_type::<Token>();

    let provider = services.build();
    let a = provider.get::<Token>().unwrap();
    let b = provider.get::<Token>().unwrap();
    assert!(!Arc::ptr_eq(&a, &b));
}

#[test]
fn test_greediest_resolvable_constructor() {
    let mut services = ServiceCollection::new();
    services.add_singleton(Config { name: "app" });
    services.add_transient_type::<Service>();
    let provider = services.build();
    let service = provider.get::<Service>().unwrap();
    assert_eq!(service.config.name, "app");
    assert!(service.metrics.is_none());

    let mut services = ServiceCollection::new();
    services.add_singleton(Config { name: "app" });
    services.add_singleton(Metrics);
    services.add_transient_type::<Service>();
    let provider = services.build();
    assert!(provider.get::<Service>().unwrap().metrics.is_some());
}

#[test]
fn test_optional_parameter() {
    struct Reporter {
        metrics: Option<Arc<Metrics>>,
    }
    impl Injectable for Reporter {
        fn constructors() -> Vec<Constructor<Self>> {
            vec![Constructor::new().optional::<Metrics>().build(|args| {
                Ok(Reporter {
                    metrics: args.optional()?,
                })
            })]
        }
    }

    let mut services = ServiceCollection::new();
    services.add_transient_type::<Reporter>();
    let provider = services.build();
    assert!(provider.get::<Reporter>().unwrap().metrics.is_none());

    let mut services = ServiceCollection::new();
    services.add_singleton(Metrics);
    services.add_transient_type::<Reporter>();
    let provider = services.build();
    assert!(provider.get::<Reporter>().unwrap().metrics.is_some());
}

#[test]
fn test_equal_arity_constructors_are_ambiguous() {
    struct Split;
    impl Injectable for Split {
        fn constructors() -> Vec<Constructor<Self>> {
            vec![
                Constructor::new().param::<Config>().build(|_| Ok(Split)),
                Constructor::new().param::<Clock>().build(|_| Ok(Split)),
            ]
        }
    }

    let mut services = ServiceCollection::new();
    services.add_singleton(Config { name: "app" });
    services.add_singleton(Clock);
    services.add_transient_type::<Split>();

    let provider = services.build();
    match provider.get::<Split>() {
        Err(DiError::AmbiguousConstructor { implementation, arity }) => {
            assert!(implementation.ends_with("Split"));
            assert_eq!(arity, 1);
        }
        other => panic!("expected ambiguity, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_ambiguity_only_counts_eligible_constructors() {
    struct Split;
    impl Injectable for Split {
        fn constructors() -> Vec<Constructor<Self>> {
            vec![
                Constructor::new().param::<Config>().build(|_| Ok(Split)),
                Constructor::new().param::<Clock>().build(|_| Ok(Split)),
            ]
        }
    }

    let mut services = ServiceCollection::new();
    services.add_singleton(Clock);
    services.add_transient_type::<Split>();

    let provider = services.build();
    assert!(provider.get::<Split>().is_ok());
}

#[test]
fn test_missing_dependency_is_unresolvable() {
    let mut services = ServiceCollection::new();
    services.add_transient_type::<Service>();

    let provider = services.build();
    match provider.get::<Service>() {
        Err(DiError::Unresolvable { service, required_by, chain }) => {
            assert!(service.ends_with("Config"));
            assert!(required_by.ends_with("Service"));
            assert_eq!(chain.len(), 1);
        }
        other => panic!("expected unresolvable, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_no_constructor() {
    struct Bare;
    impl Injectable for Bare {
        fn constructors() -> Vec<Constructor<Self>> {
            Vec::new()
        }
    }

    let mut services = ServiceCollection::new();
    services.add_transient_type::<Bare>();
    let provider = services.build();
    assert!(matches!(provider.get::<Bare>(), Err(DiError::NoConstructor(_))));
}

#[test]
fn test_not_found_and_try_get() {
    let provider = ServiceCollection::new().build();
    assert!(matches!(provider.get::<Config>(), Err(DiError::NotFound(_))));
    assert!(provider.try_get::<Config>().unwrap().is_none());
    assert!(provider.try_resolve_any(&key_of_type::<Config>()).unwrap().is_none());
}

#[test]
#[should_panic]
fn test_get_required_panics_when_missing() {
    let provider = ServiceCollection::new().build();
    let _ = provider.get_required::<Config>();
}

#[test]
fn test_structural_errors_are_cached() {
    let mut services = ServiceCollection::new();
    services.add_transient_type::<Service>();
    let provider = services.build();

    let first = provider.get::<Service>().err().unwrap().to_string();
    let second = provider.get::<Service>().err().unwrap().to_string();
    assert_eq!(first, second);
}

#[test]
fn test_factory_errors_propagate() {
    let mut services = ServiceCollection::new();
    services.add_transient_factory::<Clock, _>(|_| Err(DiError::factory("Clock", "no time source")));

    let provider = services.build();
    match provider.get::<Clock>() {
        Err(DiError::Factory { service, message }) => {
            assert_eq!(service, "Clock");
            assert_eq!(message, "no time source");
        }
        other => panic!("expected factory error, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_try_add_keeps_first_registration() {
    let mut services = ServiceCollection::new();
    assert!(services.try_add_singleton(Config { name: "first" }));
    assert!(!services.try_add_singleton(Config { name: "second" }));
    assert!(!services.try_add_transient_factory::<Config, _>(|_| Ok(Config { name: "third" })));

    let provider = services.build();
    assert_eq!(provider.get::<Config>().unwrap().name, "first");
}

#[test]
fn test_descriptors_snapshot() {
    let mut services = ServiceCollection::new();
    services.add_singleton(Config { name: "app" });
    services.add_scoped_factory::<Clock, _>(|_| Ok(Clock));
    services.add_transient_type::<Service>();
    services.add(ServiceDescriptor::factory(Lifetime::Transient, |_| Ok(Metrics)));

    let descriptors = services.descriptors();
    assert_eq!(descriptors.len(), 4);
    let kinds: Vec<DescriptorKind> = descriptors.iter().map(|d| d.kind()).collect();
    assert_eq!(
        kinds,
        vec![
            DescriptorKind::Instance,
            DescriptorKind::Factory,
            DescriptorKind::Implementation,
            DescriptorKind::Factory,
        ]
    );
    assert_eq!(descriptors[1].lifetime, Lifetime::Scoped);
    assert!(descriptors[2].implementation_type_name().unwrap().ends_with("Service"));
}

#[test]
fn test_trait_factory_and_trait_type() {
    trait Greeter: Send + Sync {
        fn greet(&self) -> String;
    }

    struct Formal {
        config: Arc<Config>,
    }
    impl Greeter for Formal {
        fn greet(&self) -> String {
            format!("Good day from {}", self.config.name)
        }
    }
    impl Injectable for Formal {
        fn constructors() -> Vec<Constructor<Self>> {
            vec![Constructor::new().param::<Config>().build(|args| {
                Ok(Formal {
                    config: args.required()?,
                })
            })]
        }
    }

    struct Casual;
    impl Greeter for Casual {
        fn greet(&self) -> String {
            "hey".to_string()
        }
    }

    let mut services = ServiceCollection::new();
    services.add_singleton(Config { name: "app" });
    services.add_transient_trait_factory::<dyn Greeter, _>(|_| Ok(Arc::new(Casual) as Arc<dyn Greeter>));
    services.add_trait_type::<dyn Greeter, Formal, _>(Lifetime::Singleton, |it| it as Arc<dyn Greeter>);

    let provider = services.build();
    assert_eq!(provider.get_trait::<dyn Greeter>().unwrap().greet(), "Good day from app");
    let a = provider.get_trait::<dyn Greeter>().unwrap();
    let b = provider.get_trait::<dyn Greeter>().unwrap();
    assert!(Arc::ptr_eq(&a, &b));

    let all: Vec<String> = provider
        .get_all_trait::<dyn Greeter>()
        .unwrap()
        .iter()
        .map(|g| g.greet())
        .collect();
    assert_eq!(all, vec!["hey".to_string(), "Good day from app".to_string()]);
}
