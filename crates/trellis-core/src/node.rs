//! Route node declarations
//!
//! A [`RouteNode`] is the builder-side description of one state: its path
//! pattern, children, index/redirect behavior, hooks, outlet connection and
//! event handlers. Nodes are plain configuration; [`RouteTree::build`]
//! compiles and validates them once at startup.
//!
//! [`RouteTree::build`]: crate::RouteTree::build

use crate::hook::{EventHandler, EventScope, HookScope, StateHook, Target, TransitionRequest};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Which outlet to populate, on which controller, with what content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectSpec {
    pub controller: String,
    pub outlet: String,
    #[serde(default)]
    pub content: ContentSource,
}

impl ConnectSpec {
    /// Connect a content-less outlet
    pub fn new(controller: impl Into<String>, outlet: impl Into<String>) -> Self {
        Self {
            controller: controller.into(),
            outlet: outlet.into(),
            content: ContentSource::None,
        }
    }

    pub fn with_content(mut self, content: ContentSource) -> Self {
        self.content = content;
        self
    }
}

/// Where the content for an outlet comes from
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContentSource {
    /// Content-less region
    #[default]
    None,
    /// The content bound to this state (transition context or its bindings)
    Context,
    /// An empty object, e.g. a blank edit form
    Empty,
    /// A fixed value from configuration
    Literal { value: Value },
    /// The content held by the parent state
    Parent,
    /// A field currently held by a controller
    ControllerField { controller: String, field: String },
}

/// A controller field set when a state is entered
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldAssignment {
    pub controller: String,
    pub field: String,
    pub value: Value,
}

impl FieldAssignment {
    pub fn new(controller: impl Into<String>, field: impl Into<String>, value: Value) -> Self {
        Self {
            controller: controller.into(),
            field: field.into(),
            value,
        }
    }
}

/// Declarative event handler
///
/// Covers what route trees usually do in an event: flip some controller
/// fields, activate the clicked tab and move to another state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventAction {
    /// State (or `/path`) to transition to
    pub target: Option<String>,
    /// Take the target state name from the event payload
    pub target_from_context: bool,
    /// Pass the event payload as the transition context
    pub pass_context: bool,
    /// Run the transition on the next scheduler turn
    pub defer: bool,
    /// Activate the originating view among its siblings
    pub activate_view: bool,
    /// Controller fields to set before transitioning
    pub set: Vec<FieldAssignment>,
}

impl EventAction {
    /// Transition to `target` when the event fires
    pub fn transition(target: impl Into<String>) -> Self {
        Self {
            target: Some(target.into()),
            ..Self::default()
        }
    }

    pub fn passing_context(mut self) -> Self {
        self.pass_context = true;
        self
    }

    pub fn deferred(mut self) -> Self {
        self.defer = true;
        self
    }

    pub fn activating_view(mut self) -> Self {
        self.activate_view = true;
        self
    }

    pub fn setting(mut self, assignment: FieldAssignment) -> Self {
        self.set.push(assignment);
        self
    }

    /// Run the action against an event scope
    pub fn apply(&self, scope: &mut EventScope<'_>) -> Result<()> {
        for assignment in &self.set {
            scope.controllers().assign(assignment)?;
        }

        if self.activate_view {
            scope.activate_view()?;
        }

        let target = if self.target_from_context {
            let Some(name) = scope.context().payload_str() else {
                return Err(Error::hook(
                    scope.state_name(),
                    format!("event {} payload does not name a state", scope.event()),
                ));
            };
            Some(Target::parse(name))
        } else {
            self.target.as_deref().map(Target::parse)
        };

        if let Some(target) = target {
            let mut request = TransitionRequest::new(target);
            if self.pass_context && !self.target_from_context {
                request.context = scope.payload().cloned();
            }
            if self.defer {
                scope.defer(request);
            } else {
                scope.transition_to(request);
            }
        }

        Ok(())
    }

    /// Wrap the action as an [`EventHandler`]
    pub fn into_handler(self) -> EventHandler {
        Arc::new(move |scope: &mut EventScope<'_>| self.apply(scope))
    }
}

/// A route node declaration
#[derive(Clone)]
pub struct RouteNode {
    pub(crate) name: String,
    pub(crate) path: String,
    pub(crate) children: Vec<RouteNode>,
    pub(crate) default_child: Option<String>,
    pub(crate) redirect: Option<String>,
    pub(crate) on_enter: Option<StateHook>,
    pub(crate) on_exit: Option<StateHook>,
    pub(crate) connect: Option<ConnectSpec>,
    pub(crate) assignments: Vec<FieldAssignment>,
    pub(crate) follow_up: Option<String>,
    pub(crate) events: Vec<(String, EventHandler)>,
}

impl RouteNode {
    /// Declare a node matching `path` (relative to its parent)
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            children: Vec::new(),
            default_child: None,
            redirect: None,
            on_enter: None,
            on_exit: None,
            connect: None,
            assignments: Vec::new(),
            follow_up: None,
            events: Vec::new(),
        }
    }

    /// Declare the application root (empty pattern)
    pub fn root(name: impl Into<String>) -> Self {
        Self::new(name, "/")
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn children(&self) -> &[RouteNode] {
        &self.children
    }

    /// Add a child state
    pub fn child(mut self, child: RouteNode) -> Self {
        self.children.push(child);
        self
    }

    /// Add a child and make it the index (default) child
    pub fn index(mut self, child: RouteNode) -> Self {
        self.default_child = Some(child.name.clone());
        self.children.push(child);
        self
    }

    /// Name the child entered when a path ends at this node
    pub fn default_child(mut self, name: impl Into<String>) -> Self {
        self.default_child = Some(name.into());
        self
    }

    /// Unconditionally redirect to another state (dotted name or `/path`)
    pub fn redirect(mut self, target: impl Into<String>) -> Self {
        self.redirect = Some(target.into());
        self
    }

    pub fn on_enter<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut HookScope<'_>) -> Result<()> + Send + Sync + 'static,
    {
        self.on_enter = Some(Arc::new(hook));
        self
    }

    pub fn on_exit<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut HookScope<'_>) -> Result<()> + Send + Sync + 'static,
    {
        self.on_exit = Some(Arc::new(hook));
        self
    }

    pub fn connect(mut self, spec: ConnectSpec) -> Self {
        self.connect = Some(spec);
        self
    }

    /// Shorthand for a content-less [`ConnectSpec`]
    pub fn connect_outlet(self, controller: impl Into<String>, outlet: impl Into<String>) -> Self {
        self.connect(ConnectSpec::new(controller, outlet))
    }

    /// Set a controller field whenever this state is entered
    pub fn assign(mut self, controller: impl Into<String>, field: impl Into<String>, value: Value) -> Self {
        self.assignments
            .push(FieldAssignment::new(controller, field, value));
        self
    }

    /// Defer a transition to `target` after this state is entered
    pub fn follow_up(mut self, target: impl Into<String>) -> Self {
        self.follow_up = Some(target.into());
        self
    }

    /// Handle a named event with a closure
    pub fn on_event<F>(mut self, event: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&mut EventScope<'_>) -> Result<()> + Send + Sync + 'static,
    {
        self.events.push((event.into(), Arc::new(handler)));
        self
    }

    /// Handle a named event with a declarative action
    pub fn on_event_action(mut self, event: impl Into<String>, action: EventAction) -> Self {
        self.events.push((event.into(), action.into_handler()));
        self
    }
}

impl std::fmt::Debug for RouteNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteNode")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("default_child", &self.default_child)
            .field("redirect", &self.redirect)
            .field("connect", &self.connect)
            .field("events", &self.events.iter().map(|(n, _)| n).collect::<Vec<_>>())
            .field("children", &self.children)
            .finish()
    }
}
