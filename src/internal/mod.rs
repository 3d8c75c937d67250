//! Internal implementation details.

pub(crate) mod circular;
pub(crate) mod dispose_bag;

pub(crate) use circular::{Frame, StackGuard};
pub(crate) use dispose_bag::{release_async, release_sync, DisposeBag, Tracked};
