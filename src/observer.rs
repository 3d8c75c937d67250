//! Diagnostic observers for container events.
//!
//! Observers are registered on the `ServiceCollection` and called
//! synchronously by the provider. Every hook has an empty default so an
//! observer implements only what it cares about. When no observer is
//! registered the provider skips the notification path entirely.

use std::sync::Arc;
use std::time::Duration;

use crate::error::DiError;
use crate::key::Key;

/// Observer trait for container events.
///
/// # Performance
///
/// Hooks run on the resolving thread. Keep implementations lightweight; for
/// expensive work, queue events and process them elsewhere.
///
/// # Examples
///
/// ```
/// use callsite_di::{DiObserver, Key, Resolver, ServiceCollection};
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// #[derive(Default)]
/// struct CountingObserver {
///     resolved: AtomicUsize,
/// }
///
/// impl DiObserver for CountingObserver {
///     fn resolved(&self, _key: &Key, _duration: Duration) {
///         self.resolved.fetch_add(1, Ordering::Relaxed);
///     }
/// }
///
/// let observer = Arc::new(CountingObserver::default());
/// let mut services = ServiceCollection::new();
/// services.add_singleton(7u8);
/// services.add_observer(observer.clone());
///
/// let provider = services.build();
/// provider.get::<u8>().unwrap();
/// provider.get::<u8>().unwrap();
/// assert_eq!(observer.resolved.load(Ordering::Relaxed), 2);
/// ```
pub trait DiObserver: Send + Sync {
    /// A call site was built and validated for `key` (`enumerable` for "all registrations" requests).
    fn call_site_built(&self, key: &Key, enumerable: bool) {
        let _ = (key, enumerable);
    }

    /// A resolution produced an instance. Requests made from inside
    /// factories are reported too, innermost first.
    fn resolved(&self, key: &Key, duration: Duration) {
        let _ = (key, duration);
    }

    /// A resolution failed. A missing optional service is not a failure.
    fn resolution_failed(&self, key: &Key, error: &DiError) {
        let _ = (key, error);
    }

    /// The accessor for `key` switched from the interpreter to its compiled form.
    fn accessor_compiled(&self, key: &Key) {
        let _ = key;
    }

    /// A scope finished teardown after releasing `released` tracked instances.
    fn scope_disposed(&self, root: bool, released: usize) {
        let _ = (root, released);
    }
}

/// Registered observers, shared by the provider and every scope.
#[derive(Default, Clone)]
pub(crate) struct Observers {
    observers: Vec<Arc<dyn DiObserver>>,
}

impl Observers {
    pub(crate) fn add(&mut self, observer: Arc<dyn DiObserver>) {
        self.observers.push(observer);
    }

    #[inline]
    pub(crate) fn has_observers(&self) -> bool {
        !self.observers.is_empty()
    }

    pub(crate) fn call_site_built(&self, key: &Key, enumerable: bool) {
        for observer in &self.observers {
            observer.call_site_built(key, enumerable);
        }
    }

    pub(crate) fn resolved(&self, key: &Key, duration: Duration) {
        for observer in &self.observers {
            observer.resolved(key, duration);
        }
    }

    pub(crate) fn resolution_failed(&self, key: &Key, error: &DiError) {
        for observer in &self.observers {
            observer.resolution_failed(key, error);
        }
    }

    pub(crate) fn accessor_compiled(&self, key: &Key) {
        for observer in &self.observers {
            observer.accessor_compiled(key);
        }
    }

    pub(crate) fn scope_disposed(&self, root: bool, released: usize) {
        for observer in &self.observers {
            observer.scope_disposed(root, released);
        }
    }
}

/// Built-in observer that forwards every event to `tracing`.
///
/// # Examples
///
/// ```
/// use callsite_di::{ServiceCollection, TracingObserver};
/// use std::sync::Arc;
///
/// let mut services = ServiceCollection::new();
/// services.add_observer(Arc::new(TracingObserver::new()));
/// let _provider = services.build();
/// ```
#[derive(Debug, Default)]
pub struct TracingObserver;

impl TracingObserver {
    pub fn new() -> Self {
        Self
    }
}

impl DiObserver for TracingObserver {
    fn call_site_built(&self, key: &Key, enumerable: bool) {
        tracing::debug!(service = key.display_name(), enumerable, "call site built");
    }

    fn resolved(&self, key: &Key, duration: Duration) {
        tracing::trace!(service = key.display_name(), ?duration, "resolved");
    }

    fn resolution_failed(&self, key: &Key, error: &DiError) {
        tracing::debug!(service = key.display_name(), %error, "resolution failed");
    }

    fn accessor_compiled(&self, key: &Key) {
        tracing::debug!(service = key.display_name(), "accessor compiled");
    }

    fn scope_disposed(&self, root: bool, released: usize) {
        tracing::debug!(root, released, "scope disposed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl DiObserver for Recorder {
        fn accessor_compiled(&self, key: &Key) {
            self.events.lock().push(format!("compiled {}", key));
        }

        fn scope_disposed(&self, root: bool, released: usize) {
            self.events.lock().push(format!("disposed {} {}", root, released));
        }
    }

    #[test]
    fn observers_fan_out_and_default_hooks_are_silent() {
        let recorder = Arc::new(Recorder::default());
        let mut observers = Observers::default();
        assert!(!observers.has_observers());
        observers.add(recorder.clone());
        observers.add(Arc::new(TracingObserver::new()));
        assert!(observers.has_observers());

        let key = crate::key_of_type::<String>();
        observers.call_site_built(&key, false);
        observers.resolved(&key, Duration::from_millis(1));
        observers.resolution_failed(&key, &DiError::NotFound("x"));
        observers.accessor_compiled(&key);
        observers.scope_disposed(false, 3);

        assert_eq!(
            *recorder.events.lock(),
            vec!["compiled alloc::string::String".to_string(), "disposed false 3".to_string()]
        );
    }
}
