//! Hook and event scopes
//!
//! Enter/exit hooks and event handlers never see the router itself. They
//! get a scope that exposes the controller registry, the bindings of the
//! state they run for, and a way to request further transitions:
//!
//! - hooks may only `defer` (run on the next scheduler turn); a direct
//!   `transition_to` from inside a hook is rejected
//! - event handlers run while the router is idle, so their `transition_to`
//!   requests are queued and executed right after the handler returns

use crate::registry::ControllerRegistry;
use crate::tree::NodeId;
use crate::{Error, Params, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

/// Hook invoked when a state is entered or exited
pub type StateHook = Arc<dyn Fn(&mut HookScope<'_>) -> Result<()> + Send + Sync>;

/// Handler invoked when a named event reaches a state
pub type EventHandler = Arc<dyn Fn(&mut EventScope<'_>) -> Result<()> + Send + Sync>;

/// Where a transition should go
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Target {
    /// A navigation path, matched from the root
    Path(String),
    /// A (possibly dotted) state name, resolved relative to the requester
    State(String),
}

impl Target {
    /// Parse a target: paths start with `/`, everything else is a state name
    pub fn parse(s: &str) -> Self {
        if s.starts_with('/') {
            Target::Path(s.to_string())
        } else {
            Target::State(s.to_string())
        }
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Target::Path(p) => write!(f, "{}", p),
            Target::State(s) => write!(f, "state {}", s),
        }
    }
}

impl From<&str> for Target {
    fn from(s: &str) -> Self {
        Target::parse(s)
    }
}

/// A request to move the state stack
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionRequest {
    pub target: Target,
    /// Content bound to the nearest placeholder of a named target
    pub context: Option<Value>,
    /// State that issued the request; scopes relative name lookup
    pub origin: Option<NodeId>,
}

impl TransitionRequest {
    pub fn new(target: Target) -> Self {
        Self {
            target,
            context: None,
            origin: None,
        }
    }

    /// Request a path transition
    pub fn to_path(path: impl Into<String>) -> Self {
        Self::new(Target::Path(path.into()))
    }

    /// Request a named-state transition
    pub fn to_state(name: impl Into<String>) -> Self {
        Self::new(Target::State(name.into()))
    }

    pub fn with_context(mut self, context: impl Into<Option<Value>>) -> Self {
        self.context = context.into();
        self
    }

    pub fn with_origin(mut self, origin: NodeId) -> Self {
        self.origin = Some(origin);
        self
    }
}

impl From<&str> for TransitionRequest {
    fn from(s: &str) -> Self {
        TransitionRequest::new(Target::parse(s))
    }
}

/// Reference to the UI element an event originated from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewRef {
    /// Controller owning the sibling views
    pub owner: String,
    /// Identifier of the originating child view
    pub id: String,
}

/// Payload delivered with a named event
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventContext {
    pub payload: Option<Value>,
    pub view: Option<ViewRef>,
}

impl EventContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn with_view(mut self, owner: impl Into<String>, id: impl Into<String>) -> Self {
        self.view = Some(ViewRef {
            owner: owner.into(),
            id: id.into(),
        });
        self
    }

    /// The payload as a string, if it is one
    pub fn payload_str(&self) -> Option<&str> {
        self.payload.as_ref().and_then(Value::as_str)
    }
}

/// Scope handed to enter and exit hooks
pub struct HookScope<'a> {
    state: NodeId,
    name: &'a str,
    params: &'a Params,
    content: Option<&'a Value>,
    parent_content: Option<&'a Value>,
    controllers: &'a mut ControllerRegistry,
    deferred: &'a mut Vec<TransitionRequest>,
}

impl<'a> HookScope<'a> {
    pub fn new(
        state: NodeId,
        name: &'a str,
        params: &'a Params,
        controllers: &'a mut ControllerRegistry,
        deferred: &'a mut Vec<TransitionRequest>,
    ) -> Self {
        Self {
            state,
            name,
            params,
            content: None,
            parent_content: None,
            controllers,
            deferred,
        }
    }

    pub fn with_content(mut self, content: Option<&'a Value>) -> Self {
        self.content = content;
        self
    }

    pub fn with_parent_content(mut self, content: Option<&'a Value>) -> Self {
        self.parent_content = content;
        self
    }

    /// Node the hook runs for
    pub fn state(&self) -> NodeId {
        self.state
    }

    /// Qualified name of the state
    pub fn state_name(&self) -> &str {
        self.name
    }

    /// This state's own placeholder bindings
    pub fn params(&self) -> &Params {
        self.params
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// Content bound to this state
    pub fn content(&self) -> Option<&Value> {
        self.content
    }

    /// Content held by the parent state
    pub fn parent_content(&self) -> Option<&Value> {
        self.parent_content
    }

    pub fn controllers(&mut self) -> &mut ControllerRegistry {
        &mut *self.controllers
    }

    /// Schedule a follow-up transition for after the current one commits
    pub fn defer(&mut self, request: impl Into<TransitionRequest>) {
        let mut request = request.into();
        if request.origin.is_none() {
            request.origin = Some(self.state);
        }
        self.deferred.push(request);
    }

    /// Direct transitions are not allowed while a transition is in flight
    pub fn transition_to(&mut self, request: impl Into<TransitionRequest>) -> Result<()> {
        let request = request.into();
        warn!(
            state = %self.name,
            to = %request.target,
            "rejecting re-entrant transition from hook; use defer"
        );
        Err(Error::ReentrantTransition {
            requested: request.target.to_string(),
        })
    }
}

/// Scope handed to event handlers
pub struct EventScope<'a> {
    event: &'a str,
    state: NodeId,
    name: &'a str,
    context: &'a EventContext,
    controllers: &'a mut ControllerRegistry,
    queued: &'a mut Vec<TransitionRequest>,
    deferred: &'a mut Vec<TransitionRequest>,
}

impl<'a> EventScope<'a> {
    pub fn new(
        event: &'a str,
        state: NodeId,
        name: &'a str,
        context: &'a EventContext,
        controllers: &'a mut ControllerRegistry,
        queued: &'a mut Vec<TransitionRequest>,
        deferred: &'a mut Vec<TransitionRequest>,
    ) -> Self {
        Self {
            event,
            state,
            name,
            context,
            controllers,
            queued,
            deferred,
        }
    }

    pub fn event(&self) -> &str {
        self.event
    }

    /// Node whose handler claimed the event
    pub fn state(&self) -> NodeId {
        self.state
    }

    pub fn state_name(&self) -> &str {
        self.name
    }

    pub fn context(&self) -> &EventContext {
        self.context
    }

    pub fn payload(&self) -> Option<&Value> {
        self.context.payload.as_ref()
    }

    pub fn controllers(&mut self) -> &mut ControllerRegistry {
        &mut *self.controllers
    }

    /// Queue a transition to run as soon as the handler returns
    pub fn transition_to(&mut self, request: impl Into<TransitionRequest>) {
        let mut request = request.into();
        if request.origin.is_none() {
            request.origin = Some(self.state);
        }
        self.queued.push(request);
    }

    /// Schedule a transition for the next scheduler turn
    pub fn defer(&mut self, request: impl Into<TransitionRequest>) {
        let mut request = request.into();
        if request.origin.is_none() {
            request.origin = Some(self.state);
        }
        self.deferred.push(request);
    }

    /// Mark the originating view active among its siblings
    pub fn activate_view(&mut self) -> Result<()> {
        let Some(view) = &self.context.view else {
            return Err(Error::hook(
                self.name,
                format!("event {} carries no originating view", self.event),
            ));
        };
        self.controllers
            .get_mut(&view.owner)?
            .set_active_child(&view.id)
    }
}
