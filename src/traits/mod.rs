//! Core traits for the dependency injection container.

mod dispose;
mod resolver;

pub use dispose::{AsyncDispose, Dispose, DisposeResult, Release};
pub use resolver::{Resolver, ResolverCore};
