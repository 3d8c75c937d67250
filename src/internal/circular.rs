//! Runtime reentrancy detection for resolutions driven by factories.
//!
//! Call-site construction detects cycles between declared constructors, but a
//! factory can resolve anything at run time. This thread-local chain catches
//! those cycles (and runaway recursion) and turns them into errors.

use std::any::TypeId;
use std::cell::RefCell;

use crate::error::{DiError, DiResult};

pub(crate) const MAX_DEPTH: usize = 1024;

// Thread-local resolution chain
thread_local! {
    static RESOLUTION_CHAIN: RefCell<Vec<(Frame, &'static str)>> = const { RefCell::new(Vec::new()) };
}

/// What a chain entry is producing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Frame {
    /// Initialization of one cached slot, identified by its address
    Slot(usize),
    /// A single (`false`) or enumerable (`true`) resolution request
    Request(TypeId, bool),
}

/// Guard for one entry on the thread-local resolution chain.
pub(crate) struct StackGuard {
    frame: Frame,
}

impl StackGuard {
    pub(crate) fn enter(frame: Frame, name: &'static str) -> DiResult<Self> {
        RESOLUTION_CHAIN.with(|chain| {
            let mut chain = chain.borrow_mut();

            // Circular detection BEFORE pushing the new entry
            if let Some(start) = chain.iter().position(|(f, _)| *f == frame) {
                let mut path: Vec<&'static str> = chain[start..].iter().map(|(_, n)| *n).collect();
                // a request and the slot it initializes share a name
                path.dedup();
                path.push(name);
                return Err(DiError::Circular(path));
            }

            if chain.len() >= MAX_DEPTH {
                return Err(DiError::DepthExceeded(MAX_DEPTH));
            }

            chain.push((frame, name));
            Ok(Self { frame })
        })
    }
}

impl Drop for StackGuard {
    fn drop(&mut self) {
        RESOLUTION_CHAIN.with(|chain| {
            if let Some((last, _)) = chain.borrow_mut().pop() {
                debug_assert_eq!(last, self.frame);
            }
        });
    }
}
