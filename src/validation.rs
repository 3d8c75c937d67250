//! Lifetime validation for freshly built call sites.
//!
//! Runs once per built call site, not per resolution. Rejects any Scoped
//! node reachable from a Singleton node (a captive dependency) and reports
//! the first Scoped node of the tree so the provider can refuse to resolve
//! it from the root.

use std::sync::Arc;

use ahash::AHashMap;

use crate::call_site::CallSite;
use crate::error::{DiError, DiResult};
use crate::lifetime::Lifetime;

/// Validates `site` and returns the first Scoped service it contains, if any.
pub(crate) fn validate(site: &Arc<CallSite>) -> DiResult<Option<&'static str>> {
    let mut validator = LifetimeValidator::default();
    let mut path = Vec::new();
    validator.visit(site, None, &mut path)
}

#[derive(Default)]
struct LifetimeValidator {
    /// First scoped service below a node, keyed by node and singleton context
    visited: AHashMap<(usize, bool), Option<&'static str>>,
}

impl LifetimeValidator {
    fn visit(
        &mut self,
        site: &Arc<CallSite>,
        singleton: Option<&'static str>,
        path: &mut Vec<&'static str>,
    ) -> DiResult<Option<&'static str>> {
        let singleton = match site.lifetime {
            Some(Lifetime::Singleton) => singleton.or(Some(site.service)),
            _ => singleton,
        };
        let memo = (Arc::as_ptr(site) as usize, singleton.is_some());
        if let Some(found) = self.visited.get(&memo) {
            return Ok(*found);
        }

        path.push(site.service);
        let result = self.visit_node(site, singleton, path);
        path.pop();

        let found = result?;
        self.visited.insert(memo, found);
        Ok(found)
    }

    fn visit_node(
        &mut self,
        site: &Arc<CallSite>,
        singleton: Option<&'static str>,
        path: &mut Vec<&'static str>,
    ) -> DiResult<Option<&'static str>> {
        let mut first_scoped = None;

        if site.lifetime == Some(Lifetime::Scoped) {
            if let Some(singleton) = singleton {
                return Err(DiError::CaptiveDependency {
                    singleton,
                    scoped: site.service,
                    chain: path.clone(),
                });
            }
            first_scoped = Some(site.service);
        }

        for child in site.children() {
            let found = self.visit(child, singleton, path)?;
            first_scoped = first_scoped.or(found);
        }
        Ok(first_scoped)
    }
}
