//! Service module system for modular registration.

use crate::{DiResult, ServiceCollection};

/// A group of registrations that belong together.
///
/// Libraries expose a module instead of asking callers to repeat their
/// registrations; [`ServiceCollection::add_module`] applies it.
///
/// # Example
///
/// ```rust
/// use callsite_di::{DiResult, Resolver, ServiceCollection, ServiceModule};
/// use std::sync::Arc;
///
/// #[derive(Default)]
/// struct StorageConfig;
///
/// struct Storage { _config: Arc<StorageConfig> }
///
/// struct StorageModule;
///
/// impl ServiceModule for StorageModule {
///     fn register_services(self, services: &mut ServiceCollection) -> DiResult<()> {
///         services.add_singleton(StorageConfig::default());
///         services.add_scoped_factory::<Storage, _>(|r| {
///             Ok(Storage { _config: r.get::<StorageConfig>()? })
///         });
///         Ok(())
///     }
/// }
///
/// # fn main() -> DiResult<()> {
/// let mut services = ServiceCollection::new();
/// services.add_module(StorageModule)?;
/// let provider = services.build();
/// let scope = provider.create_scope();
/// assert!(scope.get::<Storage>().is_ok());
/// # Ok(())
/// # }
/// ```
pub trait ServiceModule {
    /// Adds this module's registrations to `services`.
    fn register_services(self, services: &mut ServiceCollection) -> DiResult<()>;
}
