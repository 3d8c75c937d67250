//! # callsite-di
//!
//! Dependency injection for Rust built around call sites, modelled on
//! Microsoft.Extensions.DependencyInjection.
//!
//! ## Features
//!
//! - **Lifetimes**: Singleton, Scoped, and Transient services
//! - **Constructor selection**: implementation types declare their constructors;
//!   the one with the most resolvable parameters is chosen
//! - **Call sites**: every requested service is planned once into a tree,
//!   validated once, and served by a cached accessor
//! - **Compiled accessors**: hot services are promoted from tree interpretation
//!   to a precompiled closure chain without blocking callers
//! - **Enumerables and open generics**: all registrations of a type in order;
//!   generic definitions closed on demand
//! - **Deterministic teardown**: scopes release what they created, newest first
//!
//! ## Quick Start
//!
//! ```rust
//! use callsite_di::{Resolver, ServiceCollection};
//! use std::sync::Arc;
//!
//! struct Settings {
//!     greeting: &'static str,
//! }
//!
//! struct Greeter {
//!     settings: Arc<Settings>,
//! }
//!
//! impl Greeter {
//!     fn greet(&self, name: &str) -> String {
//!         format!("{}, {}!", self.settings.greeting, name)
//!     }
//! }
//!
//! let mut services = ServiceCollection::new();
//! services.add_singleton(Settings { greeting: "Hello" });
//! services.add_transient_factory::<Greeter, _>(|ctx| {
//!     Ok(Greeter { settings: ctx.get::<Settings>()? })
//! });
//!
//! let provider = services.build();
//! assert_eq!(provider.get::<Greeter>().unwrap().greet("world"), "Hello, world!");
//! ```
//!
//! ## Constructor Injection
//!
//! ```rust
//! use callsite_di::{Constructor, Injectable, Resolver, ServiceCollection};
//! use std::sync::Arc;
//!
//! struct Clock;
//! struct Metrics;
//!
//! struct Handler {
//!     clock: Arc<Clock>,
//!     metrics: Option<Arc<Metrics>>,
//! }
//!
//! impl Injectable for Handler {
//!     fn constructors() -> Vec<Constructor<Self>> {
//!         vec![
//!             Constructor::new()
//!                 .param::<Clock>()
//!                 .build(|args| Ok(Handler { clock: args.required()?, metrics: None })),
//!             Constructor::new()
//!                 .param::<Clock>()
//!                 .param::<Metrics>()
//!                 .build(|args| Ok(Handler {
//!                     clock: args.required()?,
//!                     metrics: Some(args.required()?),
//!                 })),
//!         ]
//!     }
//! }
//!
//! let mut services = ServiceCollection::new();
//! services.add_singleton(Clock);
//! services.add_transient_type::<Handler>();
//!
//! // Metrics is not registered, so the one-parameter constructor is used
//! let provider = services.build();
//! let handler = provider.get::<Handler>().unwrap();
//! assert!(handler.metrics.is_none());
//! ```
//!
//! ## Scoped Services
//!
//! ```rust
//! use callsite_di::{DiError, Resolver, ServiceCollection};
//! use std::sync::atomic::{AtomicU64, Ordering};
//! use std::sync::Arc;
//!
//! struct TraceId(u64);
//!
//! let next = Arc::new(AtomicU64::new(100));
//! let mut services = ServiceCollection::new();
//! services.add_scoped_factory::<TraceId, _>(move |_| Ok(TraceId(next.fetch_add(1, Ordering::SeqCst))));
//!
//! let provider = services.build();
//! let request = provider.create_scope();
//! assert_eq!(request.get::<TraceId>().unwrap().0, 100);
//! assert_eq!(request.get::<TraceId>().unwrap().0, 100);
//! assert_eq!(provider.create_scope().get::<TraceId>().unwrap().0, 101);
//!
//! // Scoped services are not available from the root
//! assert!(matches!(provider.get::<TraceId>(), Err(DiError::ScopedFromRoot { .. })));
//! ```

// Module declarations
pub mod collection;
pub mod constructor;
pub mod descriptors;
pub mod error;
pub mod key;
pub mod lifetime;
pub mod observer;
pub mod options;
pub mod provider;
pub mod traits;

mod call_site;
mod engine;
mod internal;
mod registration;
mod validation;

// Re-exports
pub use collection::{ServiceCollection, ServiceModule};
pub use constructor::{Arguments, Constructor, ConstructorBuilder, Implementation, Injectable, Param, ParamKind};
pub use descriptors::{DescriptorKind, ServiceDescriptor};
pub use engine::AccessorState;
pub use error::{DiError, DiResult, DisposalFailure};
pub use key::{key_of_generic, key_of_trait, key_of_type, GenericArguments, GenericService, Key};
pub use lifetime::Lifetime;
pub use observer::{DiObserver, TracingObserver};
pub use options::{CompilationMode, ProviderOptions};
pub use provider::{ResolverContext, Scope, ScopeFactory, ServiceProvider};
pub use traits::{AsyncDispose, Dispose, DisposeResult, Release, Resolver, ResolverCore};
