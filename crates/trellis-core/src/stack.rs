//! The active state stack

use crate::registry::OutletHandle;
use crate::tree::{NodeId, RouteTree};
use crate::Params;
use serde::Serialize;
use serde_json::Value;

/// One active state
#[derive(Debug, Clone, PartialEq)]
pub struct StackEntry {
    pub node: NodeId,
    /// This state's own placeholder bindings
    pub params: Params,
    /// Content bound to this state
    pub content: Option<Value>,
    /// Outlet attached on entry, if the state connects one
    pub outlet: Option<OutletHandle>,
}

impl StackEntry {
    pub fn new(node: NodeId, params: Params) -> Self {
        Self {
            node,
            params,
            content: None,
            outlet: None,
        }
    }

    pub fn with_content(mut self, content: Option<Value>) -> Self {
        self.content = content;
        self
    }

    /// Same state with the same bindings
    pub fn same_state(&self, other: &StackEntry) -> bool {
        self.node == other.node && self.params == other.params
    }
}

/// Active states, root first
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateStack {
    entries: Vec<StackEntry>,
}

impl StateStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: Vec<StackEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[StackEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn leaf(&self) -> Option<&StackEntry> {
        self.entries.last()
    }

    /// Entry for `node`, if it is active
    pub fn entry_for(&self, node: NodeId) -> Option<&StackEntry> {
        self.entries.iter().find(|e| e.node == node)
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.entry_for(node).is_some()
    }

    pub fn nodes(&self) -> impl DoubleEndedIterator<Item = NodeId> + '_ {
        self.entries.iter().map(|e| e.node)
    }

    /// Length of the prefix shared with `target`
    ///
    /// Entries match only on the same node with equal bindings; a changed
    /// binding breaks the prefix even though the node is the same.
    pub fn common_prefix(&self, target: &[StackEntry]) -> usize {
        self.entries
            .iter()
            .zip(target)
            .take_while(|(current, wanted)| current.same_state(wanted))
            .count()
    }

    pub fn push(&mut self, entry: StackEntry) {
        self.entries.push(entry);
    }

    pub fn pop(&mut self) -> Option<StackEntry> {
        self.entries.pop()
    }

    pub fn last_mut(&mut self) -> Option<&mut StackEntry> {
        self.entries.last_mut()
    }

    pub fn truncate(&mut self, len: usize) {
        self.entries.truncate(len);
    }

    /// Serializable view of the stack
    pub fn snapshot(&self, tree: &RouteTree) -> StackSnapshot {
        let states = self
            .entries
            .iter()
            .map(|e| SnapshotEntry {
                state: tree.qualified_name(e.node).to_string(),
                params: e.params.clone(),
                outlet: e.outlet.as_ref().map(ToString::to_string),
            })
            .collect();
        let url = if self.entries.is_empty() {
            None
        } else {
            tree.render_url(self.entries.iter().map(|e| (e.node, &e.params)))
        };
        StackSnapshot { states, url }
    }
}

/// One state in a [`StackSnapshot`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotEntry {
    pub state: String,
    #[serde(skip_serializing_if = "Params::is_empty")]
    pub params: Params,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outlet: Option<String>,
}

/// Serializable snapshot of the active stack
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StackSnapshot {
    pub states: Vec<SnapshotEntry>,
    /// URL that would navigate back to this stack
    pub url: Option<String>,
}

impl StackSnapshot {
    /// Qualified name of the leaf state
    pub fn leaf(&self) -> Option<&str> {
        self.states.last().map(|s| s.state.as_str())
    }

    pub fn names(&self) -> Vec<&str> {
        self.states.iter().map(|s| s.state.as_str()).collect()
    }
}

impl std::fmt::Display for StackSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.names().join(", "))?;
        if let Some(url) = &self.url {
            write!(f, " {}", url)?;
        }
        Ok(())
    }
}
