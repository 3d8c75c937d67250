//! Service lifetime definitions.

use std::fmt;

/// How long a produced instance is reused, and which scope releases it.
///
/// | Lifetime    | Cached by        | Released by             |
/// |-------------|------------------|-------------------------|
/// | `Singleton` | the root         | the root                |
/// | `Scoped`    | each scope       | that scope              |
/// | `Transient` | nothing          | the requesting scope    |
///
/// A singleton may not depend on a scoped service, directly or through
/// transients; see [`DiError::CaptiveDependency`](crate::DiError::CaptiveDependency).
///
/// # Examples
///
/// ```rust
/// use callsite_di::{Lifetime, Resolver, ServiceCollection, ServiceDescriptor};
/// use std::sync::atomic::{AtomicU32, Ordering};
/// use std::sync::Arc;
///
/// struct Ticket(u32);
///
/// fn provider_with(lifetime: Lifetime) -> callsite_di::ServiceProvider {
///     let next = Arc::new(AtomicU32::new(0));
///     let mut services = ServiceCollection::new();
///     services.add(ServiceDescriptor::factory(lifetime, move |_| {
///         Ok(Ticket(next.fetch_add(1, Ordering::SeqCst)))
///     }));
///     services.build()
/// }
///
/// for lifetime in [Lifetime::Singleton, Lifetime::Scoped, Lifetime::Transient] {
///     let provider = provider_with(lifetime);
///     let (a, b) = (provider.create_scope(), provider.create_scope());
///
///     let first = a.get::<Ticket>().unwrap().0;
///     let same_scope = a.get::<Ticket>().unwrap().0;
///     let other_scope = b.get::<Ticket>().unwrap().0;
///
///     match lifetime {
///         Lifetime::Singleton => assert_eq!((first, same_scope, other_scope), (0, 0, 0)),
///         Lifetime::Scoped => assert_eq!((first, same_scope, other_scope), (0, 0, 1)),
///         Lifetime::Transient => assert_eq!((first, same_scope, other_scope), (0, 1, 2)),
///     }
/// }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "config", derive(serde::Serialize, serde::Deserialize))]
pub enum Lifetime {
    /// One instance per root provider, shared by every scope and thread.
    Singleton,
    /// One instance per scope.
    Scoped,
    /// A new instance per resolution. Disposable transients are still
    /// tracked by the scope that requested them.
    Transient,
}

impl fmt::Display for Lifetime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Lifetime::Singleton => "Singleton",
            Lifetime::Scoped => "Scoped",
            Lifetime::Transient => "Transient",
        };
        f.write_str(name)
    }
}
