//! Release contracts for tracked instances.

use std::error::Error;
use std::sync::Arc;

/// Outcome of a single release hook.
pub type DisposeResult = Result<(), Box<dyn Error + Send + Sync>>;

/// Synchronous release of a tracked instance.
///
/// The owning scope calls `dispose` at teardown, newest instance first. A
/// failing or panicking release is collected into
/// [`DiError::Disposal`](crate::DiError::Disposal) and the remaining
/// instances are still released.
///
/// # Examples
///
/// ```
/// use callsite_di::{Constructor, Dispose, DisposeResult, Injectable, Release, Resolver, ServiceCollection};
/// use std::sync::atomic::{AtomicBool, Ordering};
/// use std::sync::Arc;
///
/// static FLUSHED: AtomicBool = AtomicBool::new(false);
///
/// struct WriteBuffer;
///
/// impl Dispose for WriteBuffer {
///     fn dispose(&self) -> DisposeResult {
///         FLUSHED.store(true, Ordering::SeqCst);
///         Ok(())
///     }
/// }
///
/// impl Injectable for WriteBuffer {
///     fn constructors() -> Vec<Constructor<Self>> {
///         vec![Constructor::new().build(|_| Ok(WriteBuffer))]
///     }
///
///     fn release(this: &Arc<Self>) -> Option<Release> {
///         Some(Release::sync(this.clone()))
///     }
/// }
///
/// let mut services = ServiceCollection::new();
/// services.add_scoped_type::<WriteBuffer>();
///
/// let scope = services.build().create_scope();
/// scope.get::<WriteBuffer>().unwrap();
/// scope.dispose().unwrap();
/// assert!(FLUSHED.load(Ordering::SeqCst));
/// ```
pub trait Dispose: Send + Sync + 'static {
    fn dispose(&self) -> DisposeResult;
}

/// Asynchronous release of a tracked instance.
///
/// Only `dispose_async` awaits these; a synchronous `dispose` reports them
/// as failures instead of blocking.
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use callsite_di::{AsyncDispose, DisposeResult};
///
/// struct Uploader {
///     pending: usize,
/// }
///
/// #[async_trait]
/// impl AsyncDispose for Uploader {
///     async fn dispose(&self) -> DisposeResult {
///         if self.pending > 0 {
///             return Err(format!("{} uploads abandoned", self.pending).into());
///         }
///         Ok(())
///     }
/// }
/// ```
#[async_trait::async_trait]
pub trait AsyncDispose: Send + Sync + 'static {
    async fn dispose(&self) -> DisposeResult;
}

/// Release capability reported by a freshly constructed instance.
///
/// Returned from [`Injectable::release`](crate::Injectable::release) so the
/// container can track the instance without type checks during resolution.
#[derive(Clone)]
pub enum Release {
    /// Released by calling [`Dispose::dispose`].
    Sync(Arc<dyn Dispose>),
    /// Released by awaiting [`AsyncDispose::dispose`].
    Async(Arc<dyn AsyncDispose>),
}

impl Release {
    /// Wraps a synchronously disposable instance.
    pub fn sync<T: Dispose>(instance: Arc<T>) -> Self {
        Release::Sync(instance)
    }

    /// Wraps an asynchronously disposable instance.
    pub fn asynchronous<T: AsyncDispose>(instance: Arc<T>) -> Self {
        Release::Async(instance)
    }
}

impl std::fmt::Debug for Release {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Release::Sync(_) => f.write_str("Release::Sync"),
            Release::Async(_) => f.write_str("Release::Async"),
        }
    }
}
