//! Named event dispatch
//!
//! Events bubble from the leaf of the active stack to the root; the first
//! state declaring a handler claims the event and bubbling stops. An event
//! nobody handles is a normal outcome, not an error.

use crate::error::Result;
use crate::router::{Phase, Router, TransitionReport};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};
use trellis_core::{
    Error, EventContext, EventHandler, EventScope, NodeId, RouteTree, StateStack,
};

/// Finds the handler for an event on the active stack
pub struct EventBubbler<'a> {
    tree: &'a RouteTree,
}

impl<'a> EventBubbler<'a> {
    pub fn new(tree: &'a RouteTree) -> Self {
        Self { tree }
    }

    /// First state from the leaf up that handles `event`
    pub fn find(&self, stack: &StateStack, event: &str) -> Option<(NodeId, &'a EventHandler)> {
        stack
            .nodes()
            .rev()
            .find_map(|id| self.tree.node(id).event(event).map(|handler| (id, handler)))
    }
}

/// What happened to a dispatched event
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DispatchOutcome {
    pub handled: bool,
    /// State whose handler claimed the event
    pub handler: Option<String>,
    /// Transitions the handler requested, run right after it returned
    pub reports: Vec<TransitionReport>,
    /// Scheduler ids of transitions the handler deferred
    pub deferred: Vec<u64>,
}

impl Router {
    /// Dispatch a named event, returning whether a state handled it
    pub fn dispatch(&mut self, event: &str, context: EventContext) -> Result<bool> {
        self.dispatch_event(event, context).map(|outcome| outcome.handled)
    }

    /// Dispatch a named event and report what it caused
    ///
    /// Transitions requested by the handler go through [`Router::transition`]
    /// exactly like external requests, after the handler has returned.
    pub fn dispatch_event(&mut self, event: &str, context: EventContext) -> Result<DispatchOutcome> {
        if self.phase == Phase::Transitioning {
            warn!(event, "event dispatched while a transition is in flight");
            return Err(Error::ReentrantTransition {
                requested: format!("event {}", event),
            }
            .into());
        }

        let tree = Arc::clone(self.tree());
        let Some((state, handler)) = EventBubbler::new(&tree).find(&self.stack, event) else {
            debug!(event, stack = %self.snapshot(), "event not handled");
            return Ok(DispatchOutcome::default());
        };
        let name = tree.qualified_name(state);
        debug!(event, state = %name, "event handled");

        let mut queued = Vec::new();
        let mut deferred = Vec::new();
        {
            let mut scope = EventScope::new(
                event,
                state,
                name,
                &context,
                &mut self.controllers,
                &mut queued,
                &mut deferred,
            );
            handler(&mut scope)?;
        }

        let mut outcome = DispatchOutcome {
            handled: true,
            handler: Some(name.to_string()),
            ..DispatchOutcome::default()
        };
        for request in queued {
            outcome.reports.push(self.transition(request)?);
        }
        let generation = self.generation();
        for request in deferred {
            outcome
                .deferred
                .push(self.scheduler.schedule(generation, request));
        }
        Ok(outcome)
    }
}
