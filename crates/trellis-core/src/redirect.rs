//! Redirect and index resolution
//!
//! Redirect edges form their own graph on top of the parent/child tree and
//! may cycle. The resolver follows them with a visited set plus a hop
//! ceiling and reports [`Error::RedirectCycle`] instead of looping.

use crate::hook::Target;
use crate::matcher::PathMatcher;
use crate::tree::{NodeId, RouteTree};
use crate::{Error, Params, Result};
use std::collections::HashSet;
use tracing::debug;

/// Terminal state reached after following redirects and default children
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settled {
    pub terminal: NodeId,
    /// Bindings picked up from path-style redirect targets
    pub bindings: Params,
    /// Redirect hops taken (default-child descents are not counted)
    pub hops: usize,
}

/// Follows redirect chains with cycle protection
pub struct RedirectResolver<'a> {
    tree: &'a RouteTree,
    max_hops: usize,
}

impl<'a> RedirectResolver<'a> {
    pub fn new(tree: &'a RouteTree, max_hops: usize) -> Self {
        Self { tree, max_hops }
    }

    /// Follow redirects only
    pub fn resolve(&self, node: NodeId) -> Result<NodeId> {
        self.walk(node, false).map(|s| s.terminal)
    }

    /// Follow redirects and descend into default children until neither applies
    pub fn settle(&self, node: NodeId) -> Result<Settled> {
        self.walk(node, true)
    }

    fn walk(&self, start: NodeId, descend: bool) -> Result<Settled> {
        let mut visited = HashSet::from([start]);
        let mut trail = vec![self.tree.qualified_name(start).to_string()];
        let mut bindings = Params::new();
        let mut hops = 0;
        let mut current = start;

        loop {
            let node = self.tree.node(current);
            let next = if let Some(target) = node.redirect() {
                hops += 1;
                if hops > self.max_hops {
                    trail.push(format!("(more than {} hops)", self.max_hops));
                    return Err(Error::RedirectCycle { chain: trail });
                }
                let next = match target {
                    Target::State(name) => self.tree.lookup(Some(current), name)?,
                    Target::Path(path) => {
                        let chain = PathMatcher::new(self.tree).match_path(path)?;
                        bindings.extend(chain.bindings());
                        chain.leaf()
                    }
                };
                debug!(
                    from = %node.qualified_name(),
                    to = %self.tree.qualified_name(next),
                    "following redirect"
                );
                next
            } else if let Some(child) = node.default_child().filter(|_| descend) {
                child
            } else {
                break;
            };

            trail.push(self.tree.qualified_name(next).to_string());
            if !visited.insert(next) {
                return Err(Error::RedirectCycle { chain: trail });
            }
            current = next;
        }

        Ok(Settled {
            terminal: current,
            bindings,
            hops,
        })
    }
}
