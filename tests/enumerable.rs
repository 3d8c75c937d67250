use callsite_di::{
    key_of_trait, Constructor, Injectable, Lifetime, Resolver, ResolverCore, ServiceCollection,
};
use std::sync::Arc;

trait Plugin: Send + Sync {
    fn name(&self) -> &'static str;
}

struct Named(&'static str);

impl Plugin for Named {
    fn name(&self) -> &'static str {
        self.0
    }
}

struct Audit;

impl Plugin for Audit {
    fn name(&self) -> &'static str {
        "audit"
    }
}

impl Injectable for Audit {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::new().build(|_| Ok(Audit))]
    }
}

fn names(plugins: &[Arc<dyn Plugin>]) -> Vec<&'static str> {
    plugins.iter().map(|p| p.name()).collect()
}

#[test]
fn test_all_registrations_in_order() {
    let mut services = ServiceCollection::new();
    services.add_singleton_trait::<dyn Plugin>(Arc::new(Named("first")));
    services.add_trait_factory::<dyn Plugin, _>(Lifetime::Transient, |_| {
        Ok(Arc::new(Named("second")) as Arc<dyn Plugin>)
    });
    services.add_trait_type::<dyn Plugin, Audit, _>(Lifetime::Singleton, |it| it as Arc<dyn Plugin>);

    let provider = services.build();
    let plugins = provider.get_all_trait::<dyn Plugin>().unwrap();
    assert_eq!(names(&plugins), vec!["first", "second", "audit"]);
    assert_eq!(provider.get_trait::<dyn Plugin>().unwrap().name(), "audit");
}

#[test]
fn test_empty_enumerable_is_not_an_error() {
    let provider = ServiceCollection::new().build();
    assert!(provider.get_all_trait::<dyn Plugin>().unwrap().is_empty());
    assert!(provider.get_all::<String>().unwrap().is_empty());
    assert!(provider.resolve_all(&key_of_trait::<dyn Plugin>()).unwrap().is_empty());
}

#[test]
fn test_single_and_enumerable_share_singleton_instances() {
    let mut services = ServiceCollection::new();
    services.add_singleton_trait_factory::<dyn Plugin, _>(|_| Ok(Arc::new(Named("a")) as Arc<dyn Plugin>));
    services.add_singleton_trait_factory::<dyn Plugin, _>(|_| Ok(Arc::new(Named("b")) as Arc<dyn Plugin>));

    let provider = services.build();
    let single = provider.get_trait::<dyn Plugin>().unwrap();
    let all = provider.get_all_trait::<dyn Plugin>().unwrap();
    assert_eq!(names(&all), vec!["a", "b"]);
    assert!(Arc::ptr_eq(&single, &all[1]));

    let again = provider.get_all_trait::<dyn Plugin>().unwrap();
    assert!(Arc::ptr_eq(&all[0], &again[0]));
}

#[test]
fn test_transient_items_are_fresh_per_enumeration() {
    struct Tick;

    let mut services = ServiceCollection::new();
    services.add_transient_factory::<Tick, _>(|_| Ok(Tick));
    services.add_transient_factory::<Tick, _>(|_| Ok(Tick));

    let provider = services.build();
    let first = provider.get_all::<Tick>().unwrap();
    let second = provider.get_all::<Tick>().unwrap();
    assert_eq!(first.len(), 2);
    assert!(!Arc::ptr_eq(&first[0], &second[0]));
}

#[test]
fn test_enumerable_constructor_parameter() {
    struct Host {
        plugins: Vec<Arc<dyn Plugin>>,
    }

    impl Injectable for Host {
        fn constructors() -> Vec<Constructor<Self>> {
            vec![Constructor::new().all_trait::<dyn Plugin>().build(|args| {
                Ok(Host {
                    plugins: args.all_trait()?,
                })
            })]
        }
    }

    let mut services = ServiceCollection::new();
    services.add_singleton_trait::<dyn Plugin>(Arc::new(Named("x")));
    services.add_singleton_trait::<dyn Plugin>(Arc::new(Named("y")));
    services.add_transient_type::<Host>();

    let provider = services.build();
    let host = provider.get::<Host>().unwrap();
    assert_eq!(names(&host.plugins), vec!["x", "y"]);
}

#[test]
fn test_enumerable_parameter_with_no_registrations() {
    struct Host {
        plugins: Vec<Arc<dyn Plugin>>,
    }

    impl Injectable for Host {
        fn constructors() -> Vec<Constructor<Self>> {
            vec![Constructor::new().all_trait::<dyn Plugin>().build(|args| {
                Ok(Host {
                    plugins: args.all_trait()?,
                })
            })]
        }
    }

    let mut services = ServiceCollection::new();
    services.add_transient_type::<Host>();

    let provider = services.build();
    assert!(provider.get::<Host>().unwrap().plugins.is_empty());
}

#[test]
fn test_try_add_enumerable_deduplicates_implementations() {
    let mut services = ServiceCollection::new();
    let audit = || callsite_di::ServiceDescriptor::trait_implementation::<dyn Plugin, Audit, _>(
        Lifetime::Transient,
        |it| it as Arc<dyn Plugin>,
    );
    assert!(services.try_add_enumerable(audit()));
    assert!(!services.try_add_enumerable(audit()));
    assert!(services.try_add_enumerable(callsite_di::ServiceDescriptor::trait_instance::<dyn Plugin>(
        Arc::new(Named("extra"))
    )));

    let provider = services.build();
    assert_eq!(
        names(&provider.get_all_trait::<dyn Plugin>().unwrap()),
        vec!["audit", "extra"]
    );
}
