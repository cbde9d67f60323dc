//! Compiled route tree
//!
//! [`RouteTree::build`] flattens a [`RouteNode`] declaration into an arena of
//! [`StateNode`]s addressed by [`NodeId`], compiles every path pattern,
//! resolves default children and validates the whole tree once. The result
//! is read-only for the lifetime of the process.

use crate::hook::{EventHandler, StateHook, Target};
use crate::node::{ConnectSpec, FieldAssignment, RouteNode};
use crate::path::RoutePattern;
use crate::redirect::RedirectResolver;
use crate::{Error, Result, DEFAULT_MAX_REDIRECTS, NAME_SEPARATOR};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Index of a state in the route tree arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    #[cfg(test)]
    pub(crate) fn from_index(index: usize) -> Self {
        NodeId(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A compiled state
pub struct StateNode {
    id: NodeId,
    name: String,
    qualified: String,
    pattern: RoutePattern,
    parent: Option<NodeId>,
    depth: usize,
    children: Vec<NodeId>,
    match_order: Vec<NodeId>,
    default_child: Option<NodeId>,
    redirect: Option<Target>,
    on_enter: Option<StateHook>,
    on_exit: Option<StateHook>,
    connect: Option<ConnectSpec>,
    assignments: Vec<FieldAssignment>,
    follow_up: Option<Target>,
    events: Vec<(String, EventHandler)>,
}

impl StateNode {
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Short name, unique among siblings
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Dotted name from the root (the root is named by itself)
    pub fn qualified_name(&self) -> &str {
        &self.qualified
    }

    pub fn pattern(&self) -> &RoutePattern {
        &self.pattern
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Distance from the root
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Children reachable by path, in the order the matcher tries them
    pub fn match_order(&self) -> &[NodeId] {
        &self.match_order
    }

    pub fn default_child(&self) -> Option<NodeId> {
        self.default_child
    }

    pub fn redirect(&self) -> Option<&Target> {
        self.redirect.as_ref()
    }

    pub fn on_enter(&self) -> Option<&StateHook> {
        self.on_enter.as_ref()
    }

    pub fn on_exit(&self) -> Option<&StateHook> {
        self.on_exit.as_ref()
    }

    pub fn connect(&self) -> Option<&ConnectSpec> {
        self.connect.as_ref()
    }

    pub fn assignments(&self) -> &[FieldAssignment] {
        &self.assignments
    }

    pub fn follow_up(&self) -> Option<&Target> {
        self.follow_up.as_ref()
    }

    /// Handler for a named event declared on this state
    pub fn event(&self, name: &str) -> Option<&EventHandler> {
        self.events
            .iter()
            .find(|(event, _)| event == name)
            .map(|(_, handler)| handler)
    }

    pub fn event_names(&self) -> impl Iterator<Item = &str> {
        self.events.iter().map(|(name, _)| name.as_str())
    }

    /// Check whether this state declares placeholders
    pub fn has_params(&self) -> bool {
        !self.pattern.is_literal()
    }
}

impl std::fmt::Debug for StateNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateNode")
            .field("id", &self.id)
            .field("qualified", &self.qualified)
            .field("pattern", &self.pattern.as_str())
            .field("default_child", &self.default_child)
            .field("redirect", &self.redirect)
            .finish()
    }
}

/// The immutable, validated route tree
#[derive(Debug)]
pub struct RouteTree {
    nodes: Vec<StateNode>,
    qualified: HashMap<String, NodeId>,
    by_name: HashMap<String, Vec<NodeId>>,
}

impl RouteTree {
    /// Compile and validate a route declaration
    ///
    /// Every problem found is reported in a single [`Error::InvalidTree`].
    pub fn build(root: RouteNode) -> Result<Self> {
        let mut builder = TreeBuilder::default();
        builder.add(root, None);

        let TreeBuilder { nodes, mut issues } = builder;
        let mut tree = RouteTree {
            nodes,
            qualified: HashMap::new(),
            by_name: HashMap::new(),
        };
        for node in &tree.nodes {
            tree.qualified.insert(node.qualified.clone(), node.id);
            tree.by_name.entry(node.name.clone()).or_default().push(node.id);
        }

        tree.validate_redirects(&mut issues);

        if !issues.is_empty() {
            return Err(Error::InvalidTree { issues });
        }

        debug!(states = tree.nodes.len(), "route tree built");
        Ok(tree)
    }

    fn validate_redirects(&self, issues: &mut Vec<String>) {
        let resolver = RedirectResolver::new(self, DEFAULT_MAX_REDIRECTS);
        for node in self.nodes.iter().filter(|n| n.redirect.is_some()) {
            if let Err(e) = resolver.settle(node.id) {
                issues.push(format!("state {}: {}", node.qualified, e));
            }
        }
        for node in &self.nodes {
            if let Some(Target::State(name)) = &node.follow_up {
                if let Err(e) = self.lookup(Some(node.id), name) {
                    issues.push(format!("state {} follow-up: {}", node.qualified, e));
                }
            }
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Number of states in the tree
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Get a state by id
    ///
    /// Ids are only ever minted by this tree, so indexing is in bounds.
    pub fn node(&self, id: NodeId) -> &StateNode {
        &self.nodes[id.0]
    }

    pub fn get(&self, id: NodeId) -> Option<&StateNode> {
        self.nodes.get(id.0)
    }

    /// All states in declaration (pre-order) order
    pub fn iter(&self) -> impl Iterator<Item = &StateNode> {
        self.nodes.iter()
    }

    pub fn qualified_name(&self, id: NodeId) -> &str {
        &self.node(id).qualified
    }

    /// Chain of states from the root down to `id`, inclusive
    pub fn ancestry(&self, id: NodeId) -> Vec<NodeId> {
        let mut chain = vec![id];
        let mut current = self.node(id).parent;
        while let Some(parent) = current {
            chain.push(parent);
            current = self.node(parent).parent;
        }
        chain.reverse();
        chain
    }

    /// Find a child of `parent` by short name
    pub fn child_named(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        self.node(parent)
            .children
            .iter()
            .copied()
            .find(|&c| self.node(c).name == name)
    }

    fn descend(&self, from: NodeId, parts: &[&str]) -> Option<NodeId> {
        parts
            .iter()
            .try_fold(from, |node, part| self.child_named(node, part))
    }

    /// Resolve a (possibly dotted) state name
    ///
    /// Searched in order: the descendants of `scope` and of each of its
    /// ancestors, the fully qualified name (optionally prefixed with the
    /// root's name), then a unique state whose qualified name ends with it.
    pub fn lookup(&self, scope: Option<NodeId>, name: &str) -> Result<NodeId> {
        if name.is_empty() {
            return Err(Error::UnknownState(name.to_string()));
        }
        let parts: Vec<&str> = name.split(NAME_SEPARATOR).collect();

        let scope = scope.unwrap_or(self.root());
        if self.get(scope).is_none() {
            return Err(Error::UnknownState(format!("{} (scope {})", name, scope)));
        }
        let mut current = Some(scope);
        while let Some(node) = current {
            if let Some(found) = self.descend(node, &parts) {
                return Ok(found);
            }
            current = self.node(node).parent;
        }

        if let Some(&id) = self.qualified.get(name) {
            return Ok(id);
        }
        let root = self.node(self.root());
        if parts.len() > 1 && parts[0] == root.name {
            if let Some(found) = self.descend(root.id, &parts[1..]) {
                return Ok(found);
            }
        }

        let last = parts[parts.len() - 1];
        let suffix = format!("{}{}", NAME_SEPARATOR, name);
        let candidates: Vec<NodeId> = self
            .by_name
            .get(last)
            .map(|ids| {
                ids.iter()
                    .copied()
                    .filter(|&id| {
                        let q = &self.node(id).qualified;
                        q == name || q.ends_with(&suffix)
                    })
                    .collect()
            })
            .unwrap_or_default();

        match candidates.as_slice() {
            [] => Err(Error::UnknownState(name.to_string())),
            [only] => Ok(*only),
            many => Err(Error::AmbiguousState {
                name: name.to_string(),
                candidates: many
                    .iter()
                    .map(|&id| self.node(id).qualified.clone())
                    .collect(),
            }),
        }
    }

    /// Render a stack of (state, bindings) pairs back into a URL
    pub fn render_url<'a>(
        &self,
        entries: impl IntoIterator<Item = (NodeId, &'a crate::Params)>,
    ) -> Option<String> {
        let mut segments = Vec::new();
        for (id, params) in entries {
            segments.extend(self.node(id).pattern.render(params)?);
        }
        Some(format!("/{}", segments.join("/")))
    }
}

#[derive(Default)]
struct TreeBuilder {
    nodes: Vec<StateNode>,
    issues: Vec<String>,
}

impl TreeBuilder {
    fn add(&mut self, decl: RouteNode, parent: Option<NodeId>) -> NodeId {
        let id = NodeId(self.nodes.len());
        let (qualified, depth) = match parent {
            None => (decl.name.clone(), 0),
            Some(p) if p.0 == 0 => (decl.name.clone(), 1),
            Some(p) => {
                let parent = &self.nodes[p.0];
                (
                    format!("{}{}{}", parent.qualified, NAME_SEPARATOR, decl.name),
                    parent.depth + 1,
                )
            }
        };

        if decl.name.is_empty() {
            let label = parent_label(self, parent);
            self.issues
                .push(format!("state under {} has an empty name", label));
        } else if decl.name.contains(NAME_SEPARATOR) {
            self.issues
                .push(format!("state name {} must not contain '{}'", qualified, NAME_SEPARATOR));
        }

        let pattern = match RoutePattern::parse(&decl.path) {
            Ok(pattern) => pattern,
            Err(e) => {
                self.issues.push(format!("state {}: {}", qualified, e));
                RoutePattern::index()
            }
        };

        let mut seen_events = HashSet::new();
        for (event, _) in &decl.events {
            if !seen_events.insert(event.as_str()) {
                self.issues
                    .push(format!("state {} declares event {} twice", qualified, event));
            }
        }

        self.nodes.push(StateNode {
            id,
            name: decl.name,
            qualified,
            pattern,
            parent,
            depth,
            children: Vec::new(),
            match_order: Vec::new(),
            default_child: None,
            redirect: decl.redirect.as_deref().map(Target::parse),
            on_enter: decl.on_enter,
            on_exit: decl.on_exit,
            connect: decl.connect,
            assignments: decl.assignments,
            follow_up: decl.follow_up.as_deref().map(Target::parse),
            events: decl.events,
        });

        let mut children = Vec::with_capacity(decl.children.len());
        let mut names = HashSet::new();
        for child in decl.children {
            if !names.insert(child.name.clone()) {
                self.issues.push(format!(
                    "state {} has duplicate child {}",
                    self.nodes[id.0].qualified, child.name
                ));
            }
            children.push(self.add(child, Some(id)));
        }

        let default_child = decl.default_child.and_then(|name| {
            let found = children
                .iter()
                .copied()
                .find(|&c| self.nodes[c.0].name == name);
            if found.is_none() {
                self.issues.push(format!(
                    "state {} names missing default child {}",
                    self.nodes[id.0].qualified, name
                ));
            }
            found
        });

        // Index-style children are reachable only as a default child.
        let mut match_order: Vec<NodeId> = children
            .iter()
            .copied()
            .filter(|&c| !self.nodes[c.0].pattern.is_index())
            .collect();
        match_order.sort_by_key(|&c| !self.nodes[c.0].pattern.is_literal());

        let node = &mut self.nodes[id.0];
        node.children = children;
        node.match_order = match_order;
        node.default_child = default_child;
        id
    }
}

fn parent_label(builder: &TreeBuilder, parent: Option<NodeId>) -> String {
    parent
        .map(|p| builder.nodes[p.0].qualified.clone())
        .unwrap_or_else(|| "<root>".to_string())
}
