//! Service collection module for dependency injection.
//!
//! This module contains the ServiceCollection type and related functionality
//! for registering services and building service providers.

use std::sync::Arc;

use ahash::AHashMap;

use crate::call_site::Request;
use crate::constructor::Injectable;
use crate::descriptors::{OpenGenericDescriptor, ServiceDescriptor};
use crate::error::{DiError, DiResult};
use crate::key::Key;
use crate::lifetime::Lifetime;
use crate::observer::{DiObserver, Observers};
use crate::options::ProviderOptions;
use crate::provider::{ResolverContext, ServiceProvider};
use crate::registration::Registry;

mod module_system;

pub use module_system::ServiceModule;

/// Ordered list of service registrations, turned into a provider by
/// [`build`](Self::build) or [`build_with`](Self::build_with).
///
/// Registering the same service type several times is allowed: single
/// resolution returns the last registration, enumerable resolution returns
/// all of them in registration order.
pub struct ServiceCollection {
    registry: Registry,
    observers: Observers,
}

impl ServiceCollection {
    /// Creates a new empty service collection.
    pub fn new() -> Self {
        Self {
            registry: Registry::new(),
            observers: Observers::default(),
        }
    }

    /// Appends a descriptor.
    pub fn add(&mut self, descriptor: ServiceDescriptor) -> &mut Self {
        self.registry.insert(descriptor);
        self
    }

    /// Appends a descriptor only when its service type has no registration yet.
    ///
    /// Returns whether the descriptor was added.
    pub fn try_add(&mut self, descriptor: ServiceDescriptor) -> bool {
        if self.registry.contains_key(&descriptor.key) {
            return false;
        }
        self.registry.insert(descriptor);
        true
    }

    /// Appends a descriptor unless the service already has a registration
    /// with the same implementation type.
    ///
    /// Descriptors without an implementation type (factories and instances)
    /// are always added.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use callsite_di::{Constructor, Injectable, Lifetime, Resolver, ServiceCollection, ServiceDescriptor};
    /// use std::sync::Arc;
    ///
    /// trait Handler: Send + Sync {}
    ///
    /// struct Audit;
    /// impl Handler for Audit {}
    /// impl Injectable for Audit {
    ///     fn constructors() -> Vec<Constructor<Self>> {
    ///         vec![Constructor::new().build(|_| Ok(Audit))]
    ///     }
    /// }
    ///
    /// let mut services = ServiceCollection::new();
    /// let audit = || ServiceDescriptor::trait_implementation::<dyn Handler, Audit, _>(
    ///     Lifetime::Singleton,
    ///     |it| it as Arc<dyn Handler>,
    /// );
    /// assert!(services.try_add_enumerable(audit()));
    /// assert!(!services.try_add_enumerable(audit()));
    ///
    /// let provider = services.build();
    /// assert_eq!(provider.get_all_trait::<dyn Handler>().unwrap().len(), 1);
    /// ```
    pub fn try_add_enumerable(&mut self, descriptor: ServiceDescriptor) -> bool {
        if let Some(implementation) = descriptor.implementation_type() {
            let duplicate = self.registry.iter().any(|existing| {
                existing.key == descriptor.key && existing.implementation_type() == Some(implementation)
            });
            if duplicate {
                return false;
            }
        }
        self.registry.insert(descriptor);
        true
    }

    // ----- Concrete Type Registrations -----

    /// Registers a singleton instance that will be shared across the entire application.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use callsite_di::ServiceCollection;
    /// struct Config {
    ///     database_url: String
    /// }
    ///
    /// let mut services = ServiceCollection::new();
    /// services.add_singleton(Config {
    ///     database_url: "postgres://localhost".to_string()
    /// });
    /// ```
    pub fn add_singleton<T: Send + Sync + 'static>(&mut self, value: T) -> &mut Self {
        self.add(ServiceDescriptor::instance(value))
    }

    pub fn try_add_singleton<T: Send + Sync + 'static>(&mut self, value: T) -> bool {
        self.try_add(ServiceDescriptor::instance(value))
    }

    /// Registers a singleton factory that creates the instance on first request.
    ///
    /// The factory runs at most once per provider; its dependencies are
    /// resolved from the root.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use callsite_di::{ServiceCollection, Resolver};
    /// # use std::sync::Arc;
    /// struct Database { url: String }
    /// struct UserService { db: Arc<Database> }
    ///
    /// let mut services = ServiceCollection::new();
    /// services.add_singleton(Database { url: "postgres://localhost".to_string() });
    /// services.add_singleton_factory::<UserService, _>(|resolver| {
    ///     Ok(UserService {
    ///         db: resolver.get::<Database>()?
    ///     })
    /// });
    /// ```
    pub fn add_singleton_factory<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: Send + Sync + 'static,
        F: Fn(&ResolverContext<'_>) -> DiResult<T> + Send + Sync + 'static,
    {
        self.add(ServiceDescriptor::factory(Lifetime::Singleton, factory))
    }

    /// Registers a scoped factory that creates one instance per scope.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use callsite_di::{ServiceCollection, Resolver};
    /// # use std::sync::Arc;
    /// struct Database { url: String }
    /// struct RequestContext { request_id: String }
    /// struct UserService { db: Arc<Database>, context: Arc<RequestContext> }
    ///
    /// let mut services = ServiceCollection::new();
    /// services.add_singleton(Database { url: "postgres://localhost".to_string() });
    /// services.add_scoped_factory::<RequestContext, _>(|_| {
    ///     Ok(RequestContext { request_id: "req-123".to_string() })
    /// });
    /// services.add_scoped_factory::<UserService, _>(|resolver| {
    ///     Ok(UserService {
    ///         db: resolver.get::<Database>()?,
    ///         context: resolver.get::<RequestContext>()?,
    ///     })
    /// });
    ///
    /// let provider = services.build();
    /// let scope = provider.create_scope();
    /// assert_eq!(scope.get_required::<UserService>().context.request_id, "req-123");
    /// ```
    pub fn add_scoped_factory<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: Send + Sync + 'static,
        F: Fn(&ResolverContext<'_>) -> DiResult<T> + Send + Sync + 'static,
    {
        self.add(ServiceDescriptor::factory(Lifetime::Scoped, factory))
    }

    /// Registers a transient factory that creates a new instance on every request.
    pub fn add_transient_factory<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: Send + Sync + 'static,
        F: Fn(&ResolverContext<'_>) -> DiResult<T> + Send + Sync + 'static,
    {
        self.add(ServiceDescriptor::factory(Lifetime::Transient, factory))
    }

    pub fn try_add_singleton_factory<T, F>(&mut self, factory: F) -> bool
    where
        T: Send + Sync + 'static,
        F: Fn(&ResolverContext<'_>) -> DiResult<T> + Send + Sync + 'static,
    {
        self.try_add(ServiceDescriptor::factory(Lifetime::Singleton, factory))
    }

    pub fn try_add_scoped_factory<T, F>(&mut self, factory: F) -> bool
    where
        T: Send + Sync + 'static,
        F: Fn(&ResolverContext<'_>) -> DiResult<T> + Send + Sync + 'static,
    {
        self.try_add(ServiceDescriptor::factory(Lifetime::Scoped, factory))
    }

    pub fn try_add_transient_factory<T, F>(&mut self, factory: F) -> bool
    where
        T: Send + Sync + 'static,
        F: Fn(&ResolverContext<'_>) -> DiResult<T> + Send + Sync + 'static,
    {
        self.try_add(ServiceDescriptor::factory(Lifetime::Transient, factory))
    }

    // ----- Constructor-built Registrations -----

    /// Registers a singleton built from the type's declared constructors.
    pub fn add_singleton_type<T: Injectable>(&mut self) -> &mut Self {
        self.add(ServiceDescriptor::implementation::<T>(Lifetime::Singleton))
    }

    /// Registers a scoped service built from the type's declared constructors.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use callsite_di::{Constructor, Injectable, Resolver, ServiceCollection};
    /// use std::sync::Arc;
    ///
    /// struct Clock;
    /// struct Session { clock: Arc<Clock> }
    ///
    /// impl Injectable for Session {
    ///     fn constructors() -> Vec<Constructor<Self>> {
    ///         vec![Constructor::new()
    ///             .param::<Clock>()
    ///             .build(|args| Ok(Session { clock: args.required()? }))]
    ///     }
    /// }
    ///
    /// let mut services = ServiceCollection::new();
    /// services.add_singleton(Clock);
    /// services.add_scoped_type::<Session>();
    ///
    /// let provider = services.build();
    /// let scope = provider.create_scope();
    /// let session = scope.get::<Session>().unwrap();
    /// assert!(Arc::ptr_eq(&session.clock, &provider.get::<Clock>().unwrap()));
    /// ```
    pub fn add_scoped_type<T: Injectable>(&mut self) -> &mut Self {
        self.add(ServiceDescriptor::implementation::<T>(Lifetime::Scoped))
    }

    pub fn add_transient_type<T: Injectable>(&mut self) -> &mut Self {
        self.add(ServiceDescriptor::implementation::<T>(Lifetime::Transient))
    }

    // ----- Trait Registrations -----

    /// Registers a singleton trait object.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use callsite_di::{ServiceCollection, Resolver};
    /// # use std::sync::Arc;
    /// trait Logger: Send + Sync {
    ///     fn log(&self, message: &str);
    /// }
    ///
    /// struct ConsoleLogger;
    /// impl Logger for ConsoleLogger {
    ///     fn log(&self, message: &str) {
    ///         println!("[LOG] {}", message);
    ///     }
    /// }
    ///
    /// let mut services = ServiceCollection::new();
    /// services.add_singleton_trait::<dyn Logger>(Arc::new(ConsoleLogger));
    /// ```
    pub fn add_singleton_trait<T: ?Sized + Send + Sync + 'static>(&mut self, value: Arc<T>) -> &mut Self {
        self.add(ServiceDescriptor::trait_instance(value))
    }

    pub fn try_add_singleton_trait<T: ?Sized + Send + Sync + 'static>(&mut self, value: Arc<T>) -> bool {
        self.try_add(ServiceDescriptor::trait_instance(value))
    }

    /// Registers a trait factory with an explicit lifetime.
    pub fn add_trait_factory<Trait, F>(&mut self, lifetime: Lifetime, factory: F) -> &mut Self
    where
        Trait: ?Sized + Send + Sync + 'static,
        F: Fn(&ResolverContext<'_>) -> DiResult<Arc<Trait>> + Send + Sync + 'static,
    {
        self.add(ServiceDescriptor::trait_factory(lifetime, factory))
    }

    pub fn add_singleton_trait_factory<Trait, F>(&mut self, factory: F) -> &mut Self
    where
        Trait: ?Sized + Send + Sync + 'static,
        F: Fn(&ResolverContext<'_>) -> DiResult<Arc<Trait>> + Send + Sync + 'static,
    {
        self.add_trait_factory(Lifetime::Singleton, factory)
    }

    pub fn add_scoped_trait_factory<Trait, F>(&mut self, factory: F) -> &mut Self
    where
        Trait: ?Sized + Send + Sync + 'static,
        F: Fn(&ResolverContext<'_>) -> DiResult<Arc<Trait>> + Send + Sync + 'static,
    {
        self.add_trait_factory(Lifetime::Scoped, factory)
    }

    pub fn add_transient_trait_factory<Trait, F>(&mut self, factory: F) -> &mut Self
    where
        Trait: ?Sized + Send + Sync + 'static,
        F: Fn(&ResolverContext<'_>) -> DiResult<Arc<Trait>> + Send + Sync + 'static,
    {
        self.add_trait_factory(Lifetime::Transient, factory)
    }

    /// Registers an implementation type, built from its constructors, as a
    /// trait service. `cast` performs the unsizing coercion.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use callsite_di::{Constructor, Injectable, Lifetime, Resolver, ServiceCollection};
    /// use std::sync::Arc;
    ///
    /// trait Greeter: Send + Sync {
    ///     fn greet(&self) -> String;
    /// }
    ///
    /// struct English;
    /// impl Greeter for English {
    ///     fn greet(&self) -> String { "hello".into() }
    /// }
    /// impl Injectable for English {
    ///     fn constructors() -> Vec<Constructor<Self>> {
    ///         vec![Constructor::new().build(|_| Ok(English))]
    ///     }
    /// }
    ///
    /// let mut services = ServiceCollection::new();
    /// services.add_trait_type::<dyn Greeter, English, _>(Lifetime::Transient, |it| it as Arc<dyn Greeter>);
    ///
    /// let provider = services.build();
    /// assert_eq!(provider.get_trait::<dyn Greeter>().unwrap().greet(), "hello");
    /// ```
    pub fn add_trait_type<Trait, I, F>(&mut self, lifetime: Lifetime, cast: F) -> &mut Self
    where
        Trait: ?Sized + Send + Sync + 'static,
        I: Injectable,
        F: Fn(Arc<I>) -> Arc<Trait> + Send + Sync + 'static,
    {
        self.add(ServiceDescriptor::trait_implementation::<Trait, I, F>(lifetime, cast))
    }

    // ----- Open Generics -----

    /// Registers an open generic definition (for example `"Repository<>"`)
    /// that serves every closed [`GenericService`](crate::GenericService)
    /// declaring that definition.
    pub fn add_open_generic(&mut self, definition: &'static str, lifetime: Lifetime) -> &mut Self {
        self.registry.insert_open(OpenGenericDescriptor {
            definition,
            lifetime,
            constraint: None,
        });
        self
    }

    /// Like [`add_open_generic`](Self::add_open_generic), serving only the
    /// closings whose type arguments satisfy `constraint`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use callsite_di::{
    ///     Constructor, GenericService, Injectable, Key, Lifetime, Resolver, ServiceCollection,
    ///     key_of_type,
    /// };
    /// use std::marker::PhantomData;
    ///
    /// struct Cache<T> { _item: PhantomData<T> }
    ///
    /// impl<T: Send + Sync + 'static> Injectable for Cache<T> {
    ///     fn constructors() -> Vec<Constructor<Self>> {
    ///         vec![Constructor::new().build(|_| Ok(Cache { _item: PhantomData }))]
    ///     }
    /// }
    ///
    /// impl<T: Send + Sync + 'static> GenericService for Cache<T> {
    ///     const DEFINITION: &'static str = "Cache<>";
    ///     fn type_arguments() -> Vec<Key> {
    ///         vec![key_of_type::<T>()]
    ///     }
    /// }
    ///
    /// let mut services = ServiceCollection::new();
    /// services.add_open_generic_where("Cache<>", Lifetime::Singleton, |arguments| {
    ///     arguments[0] != key_of_type::<String>()
    /// });
    ///
    /// let provider = services.build();
    /// assert!(provider.try_get_generic::<Cache<u64>>().unwrap().is_some());
    /// assert!(provider.try_get_generic::<Cache<String>>().unwrap().is_none());
    /// ```
    pub fn add_open_generic_where<F>(&mut self, definition: &'static str, lifetime: Lifetime, constraint: F) -> &mut Self
    where
        F: Fn(&[Key]) -> bool + Send + Sync + 'static,
    {
        self.registry.insert_open(OpenGenericDescriptor {
            definition,
            lifetime,
            constraint: Some(Arc::new(constraint)),
        });
        self
    }

    // ----- Diagnostics -----

    /// Adds a diagnostics observer.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use callsite_di::{DiObserver, Key, Resolver, ServiceCollection};
    /// use std::sync::atomic::{AtomicUsize, Ordering};
    /// use std::sync::Arc;
    /// use std::time::Duration;
    ///
    /// #[derive(Default)]
    /// struct CountingObserver(AtomicUsize);
    ///
    /// impl DiObserver for CountingObserver {
    ///     fn resolved(&self, _key: &Key, _duration: Duration) {
    ///         self.0.fetch_add(1, Ordering::Relaxed);
    ///     }
    /// }
    ///
    /// let observer = Arc::new(CountingObserver::default());
    /// let mut services = ServiceCollection::new();
    /// services.add_singleton(5u8);
    /// services.add_observer(observer.clone());
    ///
    /// let provider = services.build();
    /// provider.get::<u8>().unwrap();
    /// assert_eq!(observer.0.load(Ordering::Relaxed), 1);
    /// ```
    pub fn add_observer<O: DiObserver + 'static>(&mut self, observer: Arc<O>) -> &mut Self {
        self.observers.add(observer);
        self
    }

    /// Lets `module` add its registrations to this collection.
    pub fn add_module<M: ServiceModule>(&mut self, module: M) -> DiResult<&mut Self> {
        module.register_services(self)?;
        Ok(self)
    }

    /// Snapshot of the closed registrations, in registration order.
    pub fn descriptors(&self) -> Vec<ServiceDescriptor> {
        self.registry.iter().map(|descriptor| (**descriptor).clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.len() == 0
    }

    // ----- Building -----

    /// Builds the root provider with [`ProviderOptions::default`].
    ///
    /// Defaults never validate on build, so building cannot fail; structural
    /// errors surface on first resolution of the affected service.
    pub fn build(self) -> ServiceProvider {
        ServiceProvider::new(self.registry, ProviderOptions::default(), self.observers)
    }

    /// Builds the root provider with explicit options.
    ///
    /// With [`validate_on_build`](ProviderOptions::validate_on_build) every
    /// registered service is planned and validated now, and all failures are
    /// returned together as [`DiError::Validation`].
    ///
    /// # Examples
    ///
    /// ```rust
    /// use callsite_di::{Constructor, DiError, Injectable, ProviderOptions, ServiceCollection};
    ///
    /// struct Missing;
    /// struct Needy;
    /// impl Injectable for Needy {
    ///     fn constructors() -> Vec<Constructor<Self>> {
    ///         vec![Constructor::new().param::<Missing>().build(|_| Ok(Needy))]
    ///     }
    /// }
    ///
    /// let mut services = ServiceCollection::new();
    /// services.add_transient_type::<Needy>();
    ///
    /// match services.build_with(ProviderOptions::default().validate_on_build(true)) {
    ///     Err(DiError::Validation(errors)) => assert_eq!(errors.len(), 1),
    ///     _ => panic!("expected validation errors"),
    /// }
    /// ```
    pub fn build_with(self, options: ProviderOptions) -> DiResult<ServiceProvider> {
        let validate = options.validate_on_build;
        let provider = ServiceProvider::new(self.registry, options, self.observers);
        if validate {
            validate_registrations(&provider)?;
        }
        Ok(provider)
    }
}

impl Default for ServiceCollection {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_registrations(provider: &ServiceProvider) -> DiResult<()> {
    let mut counts: AHashMap<Key, usize> = AHashMap::new();
    let mut keys = Vec::new();
    for descriptor in provider.registry().iter() {
        let count = counts.entry(descriptor.key.clone()).or_insert(0);
        if *count == 0 {
            keys.push(descriptor.key.clone());
        }
        *count += 1;
    }

    let mut errors = Vec::new();
    for key in keys {
        let mut requests = vec![Request::Single(key.clone())];
        if counts.get(&key).copied().unwrap_or(0) > 1 {
            requests.push(Request::All(key));
        }
        for request in requests {
            if let Err(error) = provider.prepare(&request) {
                errors.push(error);
            }
        }
    }

    if errors.is_empty() {
        tracing::debug!(services = counts.len(), "container validated");
        Ok(())
    } else {
        tracing::debug!(errors = errors.len(), "container validation failed");
        Err(DiError::Validation(errors))
    }
}
