//! Service identity tokens for the dependency injection container.

use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::constructor::{Implementation, Injectable};

/// Key for service storage and lookup.
///
/// Keys uniquely identify a service type inside one container. Equality and
/// hashing only look at the `TypeId`; the type name is carried for
/// diagnostics and error messages.
///
/// # Key Types
///
/// - **Type**: Concrete types (structs, enums, primitives)
/// - **Trait**: Trait objects such as `dyn Logger`
/// - **Generic**: A closed generic type (`Repository<User>`) that remembers
///   its open definition and type arguments so an open-generic registration
///   can serve it
///
/// # Examples
///
/// ```rust
/// use callsite_di::{Key, key_of_type, key_of_trait};
///
/// trait Logger: Send + Sync {}
///
/// let number = key_of_type::<u32>();
/// let logger = key_of_trait::<dyn Logger>();
///
/// assert_eq!(number.display_name(), "u32");
/// assert!(logger.display_name().contains("Logger"));
/// assert_ne!(number, logger);
/// ```
#[derive(Debug, Clone)]
pub enum Key {
    /// Concrete type key with TypeId and name for diagnostics
    Type(TypeId, &'static str),
    /// Trait object key (`dyn Trait`)
    ///
    /// Trait services are stored as `Arc<Arc<dyn Trait>>` inside the
    /// type-erased slot so they can round-trip through `Any`.
    Trait(TypeId, &'static str),
    /// Closed generic type key
    ///
    /// Equal to the `Type` key of the same type. Only this form carries the
    /// arguments needed to close an open-generic registration, so only this
    /// form sees open registrations.
    Generic(TypeId, &'static str, Arc<GenericArguments>),
}

/// Open definition and type arguments of a closed generic service.
#[derive(Debug)]
pub struct GenericArguments {
    /// Name of the open generic definition, e.g. `"Repository<>"`.
    pub definition: &'static str,
    /// Keys of the type arguments the definition is closed over.
    pub arguments: Vec<Key>,
    pub(crate) implementation: fn() -> Implementation,
}

impl Key {
    /// Key for a concrete type.
    #[inline(always)]
    pub fn of<T: 'static>() -> Key {
        key_of_type::<T>()
    }

    /// Get the type or trait name for display
    ///
    /// # Examples
    ///
    /// ```rust
    /// use callsite_di::Key;
    /// use std::any::TypeId;
    ///
    /// let type_key = Key::Type(TypeId::of::<String>(), "alloc::string::String");
    /// assert_eq!(type_key.display_name(), "alloc::string::String");
    /// ```
    pub fn display_name(&self) -> &'static str {
        match self {
            Key::Type(_, name) => name,
            Key::Trait(_, name) => name,
            Key::Generic(_, name, _) => name,
        }
    }

    /// The `TypeId` this key identifies.
    pub fn type_id(&self) -> TypeId {
        match self {
            Key::Type(id, _) | Key::Trait(id, _) | Key::Generic(id, _, _) => *id,
        }
    }

    /// Generic shape, present only for keys built with [`key_of_generic`].
    pub fn generic(&self) -> Option<&GenericArguments> {
        match self {
            Key::Generic(_, _, args) => Some(&**args),
            _ => None,
        }
    }

    /// Whether this key names a trait object service.
    pub fn is_trait(&self) -> bool {
        matches!(self, Key::Trait(_, _))
    }
}

impl PartialEq for Key {
    #[inline(always)]
    fn eq(&self, other: &Self) -> bool {
        self.type_id() == other.type_id()
    }
}

impl Eq for Key {}

impl Hash for Key {
    #[inline(always)]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id().hash(state);
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// A closed generic type that open-generic registrations can serve.
///
/// Rust monomorphizes generics at compile time, so the closed type itself
/// supplies its constructors; the open registration contributes the lifetime
/// and the argument constraint.
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
/// struct Repository<T> { _entity: PhantomData<T> }
///
/// impl<T: Send + Sync + 'static> Injectable for Repository<T> {
///     fn constructors() -> Vec<Constructor<Self>> {
///         vec![Constructor::new().build(|_| Ok(Repository { _entity: PhantomData }))]
///     }
/// }
///
/// impl<T: Send + Sync + 'static> GenericService for Repository<T> {
///     const DEFINITION: &'static str = "Repository<>";
///     fn type_arguments() -> Vec<Key> {
///         vec![key_of_type::<T>()]
///     }
/// }
///
/// struct User;
///
/// let mut services = ServiceCollection::new();
/// services.add_open_generic("Repository<>", Lifetime::Scoped);
///
/// let provider = services.build();
/// let scope = provider.create_scope();
/// let a = scope.get_generic::<Repository<User>>().unwrap();
/// let b = scope.get_generic::<Repository<User>>().unwrap();
/// assert!(std::sync::Arc::ptr_eq(&a, &b));
/// ```
pub trait GenericService: Injectable {
    /// Name of the open definition this type closes.
    const DEFINITION: &'static str;

    /// Keys of the type arguments, in declaration order.
    fn type_arguments() -> Vec<Key>;
}

/// Helper function for creating concrete type keys.
#[inline(always)]
pub fn key_of_type<T: 'static>() -> Key {
    Key::Type(TypeId::of::<T>(), std::any::type_name::<T>())
}

/// Helper function for creating trait object keys.
#[inline(always)]
pub fn key_of_trait<T: ?Sized + 'static>() -> Key {
    Key::Trait(TypeId::of::<T>(), std::any::type_name::<T>())
}

/// Helper function for creating closed generic keys.
pub fn key_of_generic<T: GenericService>() -> Key {
    Key::Generic(
        TypeId::of::<T>(),
        std::any::type_name::<T>(),
        Arc::new(GenericArguments {
            definition: T::DEFINITION,
            arguments: T::type_arguments(),
            implementation: Implementation::of::<T>,
        }),
    )
}
