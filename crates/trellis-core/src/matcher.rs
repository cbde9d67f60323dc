//! Path matching
//!
//! Walks the route tree depth-first, consuming as many path segments per
//! level as the node's pattern declares. Siblings are tried in match order
//! (all-literal patterns first) and the walk backtracks on a dead end, so
//! `/hosts` and `/hosts/:host_id` can live side by side.
//!
//! When the path runs out at a node, matching continues into its default
//! child without consuming anything, stopping at the first node that
//! redirects; the rest is up to [`RedirectResolver`](crate::RedirectResolver).

use crate::path::RoutePath;
use crate::tree::{NodeId, RouteTree};
use crate::{Error, Params, Result};

/// A matched chain of states, root first, with per-state bindings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedChain {
    pub nodes: Vec<NodeId>,
    pub params: Vec<Params>,
}

impl MatchedChain {
    /// Deepest matched state
    pub fn leaf(&self) -> NodeId {
        // A chain always contains at least the root.
        self.nodes[self.nodes.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All bindings merged into one map
    pub fn bindings(&self) -> Params {
        self.params
            .iter()
            .flat_map(|p| p.iter().map(|(k, v)| (k.clone(), v.clone())))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Params)> {
        self.nodes.iter().copied().zip(self.params.iter())
    }
}

/// Maps navigation paths onto the route tree
pub struct PathMatcher<'a> {
    tree: &'a RouteTree,
}

impl<'a> PathMatcher<'a> {
    pub fn new(tree: &'a RouteTree) -> Self {
        Self { tree }
    }

    /// Parse and match a path string
    pub fn match_path(&self, path: &str) -> Result<MatchedChain> {
        let parsed = RoutePath::parse(path)?;
        self.match_route(&parsed)
    }

    /// Match a parsed path
    pub fn match_route(&self, path: &RoutePath) -> Result<MatchedChain> {
        let no_match = || Error::NoMatch {
            path: path.as_str().to_string(),
        };

        let root = self.tree.root();
        let pattern = self.tree.node(root).pattern();
        let root_params = pattern.match_prefix(path.segments()).ok_or_else(no_match)?;

        let mut chain = MatchedChain {
            nodes: vec![root],
            params: vec![root_params],
        };
        if self.walk(root, &path.segments()[pattern.len()..], &mut chain) {
            Ok(chain)
        } else {
            Err(no_match())
        }
    }

    fn walk(&self, node: NodeId, rest: &[String], chain: &mut MatchedChain) -> bool {
        if rest.is_empty() {
            let mut current = self.tree.node(node);
            while current.redirect().is_none() {
                let Some(child) = current.default_child() else {
                    break;
                };
                chain.nodes.push(child);
                chain.params.push(Params::new());
                current = self.tree.node(child);
            }
            return true;
        }

        for &child in self.tree.node(node).match_order() {
            let pattern = self.tree.node(child).pattern();
            let Some(params) = pattern.match_prefix(rest) else {
                continue;
            };
            chain.nodes.push(child);
            chain.params.push(params);
            if self.walk(child, &rest[pattern.len()..], chain) {
                return true;
            }
            chain.nodes.pop();
            chain.params.pop();
        }
        false
    }
}
