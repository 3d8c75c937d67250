//! Internal disposal bag tracking instances that need release.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::error::{DiError, DiResult, DisposalFailure};
use crate::traits::Release;

/// One tracked instance together with the service it was produced for.
pub(crate) struct Tracked {
    pub(crate) service: &'static str,
    pub(crate) release: Release,
}

/// Ordered list of release hooks, consumed in LIFO order exactly once.
///
/// Entries of both kinds share one list so reverse-creation order holds
/// across sync and async instances alike.
#[derive(Default)]
pub(crate) struct DisposeBag {
    entries: Vec<Tracked>,
    disposed: bool,
}

impl DisposeBag {
    /// Appends an entry; once the bag has been drained the entry is handed back.
    pub(crate) fn push(&mut self, tracked: Tracked) -> Result<(), Tracked> {
        if self.disposed {
            return Err(tracked);
        }
        self.entries.push(tracked);
        Ok(())
    }

    /// Marks the bag disposed and takes its entries. `None` after the first call.
    pub(crate) fn drain(&mut self) -> Option<Vec<Tracked>> {
        if self.disposed {
            return None;
        }
        self.disposed = true;
        Some(std::mem::take(&mut self.entries))
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", message)
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("panicked: {}", message)
    } else {
        "panicked".to_string()
    }
}

fn release_one_sync(tracked: &Tracked) -> Option<DisposalFailure> {
    let outcome = match &tracked.release {
        Release::Sync(instance) => {
            catch_unwind(AssertUnwindSafe(|| instance.dispose())).map_err(panic_message)
        }
        Release::Async(_) => Ok(Err("instance only supports asynchronous disposal".into())),
    };
    let message = match outcome {
        Ok(Ok(())) => return None,
        Ok(Err(error)) => error.to_string(),
        Err(panic) => panic,
    };
    Some(DisposalFailure {
        service: tracked.service,
        message,
    })
}

fn aggregate(failures: Vec<DisposalFailure>) -> DiResult<()> {
    if failures.is_empty() {
        Ok(())
    } else {
        Err(DiError::Disposal(failures))
    }
}

/// Releases drained entries newest-first, continuing past failures.
pub(crate) fn release_sync(entries: Vec<Tracked>) -> DiResult<()> {
    let failures = entries
        .iter()
        .rev()
        .filter_map(release_one_sync)
        .collect();
    aggregate(failures)
}

/// Releases drained entries newest-first, awaiting async entries in place.
pub(crate) async fn release_async(entries: Vec<Tracked>) -> DiResult<()> {
    let mut failures = Vec::new();
    for tracked in entries.iter().rev() {
        match &tracked.release {
            Release::Async(instance) => {
                if let Err(error) = instance.dispose().await {
                    failures.push(DisposalFailure {
                        service: tracked.service,
                        message: error.to_string(),
                    });
                }
            }
            Release::Sync(_) => failures.extend(release_one_sync(tracked)),
        }
    }
    aggregate(failures)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::{AsyncDispose, Dispose, DisposeResult};
    use parking_lot::Mutex;
    use std::sync::Arc;

    struct Closer {
        name: &'static str,
        log: Arc<Mutex<Vec<&'static str>>>,
        fail: bool,
    }

    impl Dispose for Closer {
        fn dispose(&self) -> DisposeResult {
            self.log.lock().push(self.name);
            if self.fail {
                Err(format!("{} refused", self.name).into())
            } else {
                Ok(())
            }
        }
    }

    struct Remote;

    #[async_trait::async_trait]
    impl AsyncDispose for Remote {
        async fn dispose(&self) -> DisposeResult {
            Ok(())
        }
    }

    fn closer(name: &'static str, log: &Arc<Mutex<Vec<&'static str>>>, fail: bool) -> Tracked {
        Tracked {
            service: name,
            release: Release::sync(Arc::new(Closer {
                name,
                log: log.clone(),
                fail,
            })),
        }
    }

    #[test]
    fn releases_in_reverse_and_aggregates_failures() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut bag = DisposeBag::default();
        assert!(bag.push(closer("x", &log, false)).is_ok());
        assert!(bag.push(closer("y", &log, true)).is_ok());
        assert!(bag.push(closer("z", &log, false)).is_ok());
        assert_eq!(bag.len(), 3);

        let entries = bag.drain().unwrap();
        let error = release_sync(entries).unwrap_err();
        assert_eq!(*log.lock(), vec!["z", "y", "x"]);
        match error {
            DiError::Disposal(failures) => {
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].service, "y");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn drained_bag_rejects_new_entries() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut bag = DisposeBag::default();
        assert!(bag.drain().is_some());
        assert!(bag.drain().is_none());
        assert!(bag.push(closer("late", &log, false)).is_err());
    }

    #[test]
    fn sync_release_reports_async_only_entries() {
        let entries = vec![Tracked {
            service: "remote",
            release: Release::asynchronous(Arc::new(Remote)),
        }];
        assert!(matches!(release_sync(entries), Err(DiError::Disposal(f)) if f[0].service == "remote"));
    }
}
