//! Constructor descriptors for implementation-type registrations.
//!
//! Rust has no runtime constructor reflection, so an implementation type
//! declares its constructors explicitly: an ordered list of parameter keys
//! (each required, optional, or "all registrations") plus a function that
//! assembles the instance from the resolved arguments. The call-site builder
//! picks the greediest constructor whose parameters it can satisfy.

use std::any::TypeId;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::error::{DiError, DiResult};
use crate::key::{key_of_generic, key_of_trait, key_of_type, GenericService, Key};
use crate::registration::{downcast_all, downcast_all_trait, downcast_service, downcast_trait, AnyArc};
use crate::traits::Release;

/// A type the container can construct from its own registrations.
///
/// # Examples
///
/// ```
/// use callsite_di::{Constructor, Injectable, Resolver, ServiceCollection};
/// use std::sync::Arc;
///
/// struct Database { url: String }
///
/// struct UserService { db: Arc<Database> }
///
/// impl Injectable for UserService {
///     fn constructors() -> Vec<Constructor<Self>> {
///         vec![Constructor::new()
///             .param::<Database>()
///             .build(|args| Ok(UserService { db: args.required()? }))]
///     }
/// }
///
/// let mut services = ServiceCollection::new();
/// services.add_singleton(Database { url: "postgres://localhost".to_string() });
/// services.add_transient_type::<UserService>();
///
/// let provider = services.build();
/// let users = provider.get::<UserService>().unwrap();
/// assert_eq!(users.db.url, "postgres://localhost");
/// ```
pub trait Injectable: Send + Sync + Sized + 'static {
    /// Every way of building this type. Order does not matter; the builder
    /// prefers the constructor with the most resolvable parameters.
    fn constructors() -> Vec<Constructor<Self>>;

    /// Release capability of a freshly built instance.
    ///
    /// Types implementing [`Dispose`](crate::Dispose) or
    /// [`AsyncDispose`](crate::AsyncDispose) return it here so the owning
    /// scope tracks the instance.
    fn release(this: &Arc<Self>) -> Option<Release> {
        let _ = this;
        None
    }
}

/// How a constructor parameter is satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// Must be registered, otherwise the constructor is not eligible.
    Required,
    /// Supplied when registered, `None` otherwise.
    Optional,
    /// Every registration of the service, in registration order (possibly empty).
    All,
}

/// One declared constructor parameter.
#[derive(Debug, Clone)]
pub struct Param {
    pub key: Key,
    pub kind: ParamKind,
}

impl Param {
    pub fn new(key: Key, kind: ParamKind) -> Self {
        Self { key, kind }
    }
}

type Assemble<T> = Arc<dyn Fn(&mut Arguments) -> DiResult<T> + Send + Sync>;

/// A finished, typed constructor declaration.
pub struct Constructor<T> {
    params: Vec<Param>,
    assemble: Assemble<T>,
}

impl<T: Injectable> Constructor<T> {
    /// Starts declaring a constructor.
    #[allow(clippy::new_ret_no_self)]
    pub fn new() -> ConstructorBuilder<T> {
        ConstructorBuilder {
            params: Vec::new(),
            _marker: PhantomData,
        }
    }

    /// Declared parameters, in call order.
    pub fn params(&self) -> &[Param] {
        &self.params
    }

    fn erase(self) -> ConstructorInfo {
        let assemble = self.assemble;
        ConstructorInfo {
            params: self.params,
            activate: Arc::new(move |args: &mut Arguments| {
                let value = Arc::new(assemble(args)?);
                let release = T::release(&value);
                Ok(Activated {
                    value: value as AnyArc,
                    release,
                })
            }),
        }
    }
}

/// Builder collecting a constructor's parameter list.
pub struct ConstructorBuilder<T> {
    params: Vec<Param>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Injectable> ConstructorBuilder<T> {
    /// Required concrete-type parameter.
    pub fn param<P: Send + Sync + 'static>(self) -> Self {
        self.dependency(Param::new(key_of_type::<P>(), ParamKind::Required))
    }

    /// Required trait-object parameter.
    pub fn param_trait<P: ?Sized + Send + Sync + 'static>(self) -> Self {
        self.dependency(Param::new(key_of_trait::<P>(), ParamKind::Required))
    }

    /// Required closed-generic parameter, served by an open-generic registration if needed.
    pub fn param_generic<P: GenericService>(self) -> Self {
        self.dependency(Param::new(key_of_generic::<P>(), ParamKind::Required))
    }

    /// Optional concrete-type parameter.
    pub fn optional<P: Send + Sync + 'static>(self) -> Self {
        self.dependency(Param::new(key_of_type::<P>(), ParamKind::Optional))
    }

    /// Optional trait-object parameter.
    pub fn optional_trait<P: ?Sized + Send + Sync + 'static>(self) -> Self {
        self.dependency(Param::new(key_of_trait::<P>(), ParamKind::Optional))
    }

    /// Every registration of a concrete type.
    pub fn all<P: Send + Sync + 'static>(self) -> Self {
        self.dependency(Param::new(key_of_type::<P>(), ParamKind::All))
    }

    /// Every registration of a trait.
    pub fn all_trait<P: ?Sized + Send + Sync + 'static>(self) -> Self {
        self.dependency(Param::new(key_of_trait::<P>(), ParamKind::All))
    }

    /// Arbitrary parameter.
    pub fn dependency(mut self, param: Param) -> Self {
        self.params.push(param);
        self
    }

    /// Finishes the declaration with the function assembling the instance.
    ///
    /// Arguments arrive in declaration order; read them with the matching
    /// [`Arguments`] accessor.
    pub fn build<F>(self, assemble: F) -> Constructor<T>
    where
        F: Fn(&mut Arguments) -> DiResult<T> + Send + Sync + 'static,
    {
        Constructor {
            params: self.params,
            assemble: Arc::new(assemble),
        }
    }
}

/// Resolved constructor arguments, consumed in declaration order.
pub struct Arguments {
    service: &'static str,
    values: std::vec::IntoIter<Option<AnyArc>>,
}

impl Arguments {
    pub(crate) fn new(service: &'static str, values: Vec<Option<AnyArc>>) -> Self {
        Self {
            service,
            values: values.into_iter(),
        }
    }

    fn next_slot(&mut self) -> DiResult<Option<AnyArc>> {
        self.values.next().ok_or(DiError::TypeMismatch(self.service))
    }

    fn next_present<P: ?Sized>(&mut self) -> DiResult<AnyArc> {
        self.next_slot()?
            .ok_or(DiError::NotFound(std::any::type_name::<P>()))
    }

    /// Next argument as a concrete type.
    pub fn required<P: Send + Sync + 'static>(&mut self) -> DiResult<Arc<P>> {
        downcast_service::<P>(self.next_present::<P>()?)
    }

    /// Next argument as a trait object.
    pub fn required_trait<P: ?Sized + Send + Sync + 'static>(&mut self) -> DiResult<Arc<P>> {
        downcast_trait::<P>(self.next_present::<P>()?)
    }

    /// Next argument, absent when the optional service is not registered.
    pub fn optional<P: Send + Sync + 'static>(&mut self) -> DiResult<Option<Arc<P>>> {
        self.next_slot()?.map(downcast_service::<P>).transpose()
    }

    /// Next argument as an optional trait object.
    pub fn optional_trait<P: ?Sized + Send + Sync + 'static>(&mut self) -> DiResult<Option<Arc<P>>> {
        self.next_slot()?.map(downcast_trait::<P>).transpose()
    }

    /// Next argument as every registration of a concrete type.
    pub fn all<P: Send + Sync + 'static>(&mut self) -> DiResult<Vec<Arc<P>>> {
        downcast_all::<P>(self.next_present::<Vec<Arc<P>>>()?)
    }

    /// Next argument as every registration of a trait.
    pub fn all_trait<P: ?Sized + Send + Sync + 'static>(&mut self) -> DiResult<Vec<Arc<P>>> {
        downcast_all_trait::<P>(self.next_present::<Vec<Arc<P>>>()?)
    }
}

/// Result of running a constructor: the erased value plus its release capability.
pub(crate) struct Activated {
    pub(crate) value: AnyArc,
    pub(crate) release: Option<Release>,
}

pub(crate) type Activator = Arc<dyn Fn(&mut Arguments) -> DiResult<Activated> + Send + Sync>;

/// Type-erased constructor.
#[derive(Clone)]
pub(crate) struct ConstructorInfo {
    pub(crate) params: Vec<Param>,
    pub(crate) activate: Activator,
}

/// Type-erased implementation type: its name and every declared constructor.
#[derive(Clone)]
pub struct Implementation {
    pub(crate) type_id: TypeId,
    pub(crate) type_name: &'static str,
    pub(crate) constructors: Arc<[ConstructorInfo]>,
}

impl Implementation {
    /// Captures the constructors of an [`Injectable`] type.
    pub fn of<T: Injectable>() -> Self {
        let constructors: Vec<ConstructorInfo> =
            T::constructors().into_iter().map(Constructor::erase).collect();
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            constructors: constructors.into(),
        }
    }

    /// Serves a trait service from this implementation: every activated
    /// `Arc<I>` goes through `cast` and is stored as `Arc<Arc<Trait>>`.
    pub(crate) fn upcast<I, Trait, F>(self, cast: F) -> Self
    where
        I: Send + Sync + 'static,
        Trait: ?Sized + Send + Sync + 'static,
        F: Fn(Arc<I>) -> Arc<Trait> + Send + Sync + 'static,
    {
        let cast = Arc::new(cast);
        let constructors: Vec<ConstructorInfo> = self
            .constructors
            .iter()
            .map(|ctor| {
                let inner = ctor.activate.clone();
                let cast = cast.clone();
                ConstructorInfo {
                    params: ctor.params.clone(),
                    activate: Arc::new(move |args: &mut Arguments| {
                        let activated = inner(args)?;
                        let concrete = downcast_service::<I>(activated.value)?;
                        let service: Arc<Trait> = cast(concrete);
                        Ok(Activated {
                            value: Arc::new(service) as AnyArc,
                            release: activated.release,
                        })
                    }),
                }
            })
            .collect();
        Self {
            constructors: constructors.into(),
            ..self
        }
    }

    /// Name of the implementation type.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// `TypeId` of the implementation type.
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Parameter count of each declared constructor.
    pub fn arities(&self) -> Vec<usize> {
        self.constructors.iter().map(|c| c.params.len()).collect()
    }
}

impl std::fmt::Debug for Implementation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Implementation")
            .field("type_name", &self.type_name)
            .field("arities", &self.arities())
            .finish()
    }
}
