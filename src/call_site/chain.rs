use crate::error::{DiError, DiResult};
use crate::key::Key;

/// Services whose call sites are currently being built, outermost first.
#[derive(Default)]
pub(crate) struct CallSiteChain {
    stack: Vec<Key>,
}

impl CallSiteChain {
    /// Pushes `key`, failing with the full cycle when it is already in progress.
    pub(crate) fn enter(&mut self, key: &Key) -> DiResult<()> {
        if self.stack.contains(key) {
            let mut cycle = self.names();
            cycle.push(key.display_name());
            return Err(DiError::Circular(cycle));
        }
        self.stack.push(key.clone());
        Ok(())
    }

    pub(crate) fn exit(&mut self) {
        self.stack.pop();
    }

    pub(crate) fn names(&self) -> Vec<&'static str> {
        self.stack.iter().map(Key::display_name).collect()
    }
}
