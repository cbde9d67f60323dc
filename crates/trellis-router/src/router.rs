//! Transition engine
//!
//! The [`Router`] owns the active [`StateStack`] and is the only thing that
//! mutates it. A transition:
//!
//! 1. resolves the target (path or named state) into a root-first chain,
//!    following redirects and default children and binding placeholders
//! 2. keeps the prefix it shares with the active stack (same node, same
//!    bindings); those states are neither exited nor re-entered
//! 3. exits the rest of the active stack leaf first (exit hook, then outlet
//!    detach)
//! 4. enters the new suffix root first (field assignments, enter hook,
//!    then outlet attach)
//! 5. commits, and schedules any follow-ups for the next scheduler turn
//!
//! A failing hook or outlet attach aborts the walk. Nothing is rolled back:
//! the committed stack is exactly what is live at that point, and
//! follow-ups requested by the failed attempt are discarded.

use crate::error::{Result, RouterError};
use crate::scheduler::Scheduler;
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};
use trellis_core::{
    ContentSource, ControllerRegistry, Error, HookScope, NodeId, Params, PathMatcher,
    RedirectResolver, RouteTree, StackEntry, StackSnapshot, StateStack, Target,
    TransitionRequest, DEFAULT_MAX_REDIRECTS,
};

/// Router configuration
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Router name, used in logs
    pub name: String,
    /// Redirect hop ceiling while settling a target
    pub max_redirects: usize,
    /// Scheduler turns [`Router::settle`] runs before giving up
    pub max_settle_turns: usize,
    /// Command channel capacity of the [`Navigator`](crate::Navigator)
    pub queue_capacity: usize,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            name: "Trellis Router".to_string(),
            max_redirects: DEFAULT_MAX_REDIRECTS,
            max_settle_turns: 32,
            queue_capacity: 64,
        }
    }
}

/// Whether a transition is in flight
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Transitioning,
}

/// Outcome of one committed transition
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransitionReport {
    pub generation: u64,
    /// The request target as given
    pub target: String,
    /// States exited, leaf first
    pub exited: Vec<String>,
    /// States entered, root first
    pub entered: Vec<String>,
    /// Scheduler ids of the follow-ups this transition queued
    pub deferred: Vec<u64>,
    /// The stack after commit
    pub stack: StackSnapshot,
}

/// The transition engine
pub struct Router {
    config: RouterConfig,
    tree: Arc<RouteTree>,
    pub(crate) controllers: ControllerRegistry,
    pub(crate) stack: StateStack,
    pub(crate) phase: Phase,
    generation: u64,
    pub(crate) scheduler: Scheduler,
}

impl Router {
    pub fn new(tree: impl Into<Arc<RouteTree>>, controllers: ControllerRegistry) -> Self {
        Self::with_config(tree, controllers, RouterConfig::default())
    }

    pub fn with_config(
        tree: impl Into<Arc<RouteTree>>,
        controllers: ControllerRegistry,
        config: RouterConfig,
    ) -> Self {
        Self {
            config,
            tree: tree.into(),
            controllers,
            stack: StateStack::new(),
            phase: Phase::Idle,
            generation: 0,
            scheduler: Scheduler::new(),
        }
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    pub fn tree(&self) -> &Arc<RouteTree> {
        &self.tree
    }

    pub fn stack(&self) -> &StateStack {
        &self.stack
    }

    pub fn controllers(&self) -> &ControllerRegistry {
        &self.controllers
    }

    pub fn controllers_mut(&mut self) -> &mut ControllerRegistry {
        &mut self.controllers
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Generation of the most recently started transition
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn snapshot(&self) -> StackSnapshot {
        self.stack.snapshot(&self.tree)
    }

    /// Check whether follow-up transitions are waiting for a turn
    pub fn has_pending(&self) -> bool {
        !self.scheduler.is_empty()
    }

    pub fn pending_count(&self) -> usize {
        self.scheduler.len()
    }

    // =========================================================================
    // Transitions
    // =========================================================================

    /// Transition to whatever `path` resolves to
    pub fn navigate(&mut self, path: &str) -> Result<TransitionReport> {
        self.transition(TransitionRequest::to_path(path))
    }

    /// Transition to a named state, binding `context` to its nearest placeholder
    pub fn transition_to(&mut self, name: &str, context: Option<Value>) -> Result<TransitionReport> {
        self.transition(TransitionRequest::to_state(name).with_context(context))
    }

    /// Run one transition to completion
    pub fn transition(&mut self, request: TransitionRequest) -> Result<TransitionReport> {
        if self.phase == Phase::Transitioning {
            warn!(to = %request.target, "transition requested while another is in flight");
            return Err(Error::ReentrantTransition {
                requested: request.target.to_string(),
            }
            .into());
        }

        // Resolution failures leave the engine untouched.
        let target = self.resolve(&request)?;

        self.generation += 1;
        let generation = self.generation;
        self.phase = Phase::Transitioning;
        info!(router = %self.config.name, generation, to = %request.target, "transition started");

        let mut working = std::mem::take(&mut self.stack);
        let mut deferred = Vec::new();
        let mut report = TransitionReport {
            generation,
            target: request.target.to_string(),
            exited: Vec::new(),
            entered: Vec::new(),
            deferred: Vec::new(),
            stack: StackSnapshot::default(),
        };

        let outcome = self.walk(&mut working, target, &mut deferred, &mut report);

        self.stack = working;
        self.phase = Phase::Idle;

        if let Err(e) = outcome {
            warn!(
                generation,
                error = %e,
                stack = %self.stack.snapshot(&self.tree),
                "transition failed; partial stack committed"
            );
            if !deferred.is_empty() {
                debug!(generation, dropped = deferred.len(), "discarding follow-ups of failed transition");
            }
            return Err(e.into());
        }

        for request in deferred {
            debug!(generation, to = %request.target, "follow-up scheduled");
            report.deferred.push(self.scheduler.schedule(generation, request));
        }
        report.stack = self.snapshot();
        info!(generation, stack = %report.stack, "transition committed");
        Ok(report)
    }

    fn walk(
        &mut self,
        working: &mut StateStack,
        target: Vec<StackEntry>,
        deferred: &mut Vec<TransitionRequest>,
        report: &mut TransitionReport,
    ) -> trellis_core::Result<()> {
        let tree = Arc::clone(&self.tree);
        let keep = working.common_prefix(&target);

        // Exit: leaf first, while the parent is still live
        while working.len() > keep {
            let entries = working.entries();
            let entry = &entries[entries.len() - 1];
            let parent_content = entries
                .len()
                .checked_sub(2)
                .and_then(|i| entries[i].content.as_ref());
            let node = tree.node(entry.node);
            debug!(state = %node.qualified_name(), "exiting");

            if let Some(hook) = node.on_exit() {
                let mut scope = HookScope::new(
                    entry.node,
                    node.qualified_name(),
                    &entry.params,
                    &mut self.controllers,
                    deferred,
                )
                .with_content(entry.content.as_ref())
                .with_parent_content(parent_content);
                hook(&mut scope)?;
            }

            // once its exit hook has run the state is gone, even if detaching fails
            let exited = working.pop();
            report.exited.push(node.qualified_name().to_string());
            if let Some(handle) = exited.and_then(|e| e.outlet) {
                self.controllers.disconnect(&handle)?;
            }
        }

        // Enter: root first, each outlet inside its freshly attached parent
        for entry in target.into_iter().skip(keep) {
            let node = tree.node(entry.node);
            debug!(state = %node.qualified_name(), params = ?entry.params, "entering");

            for assignment in node.assignments() {
                self.controllers.assign(assignment)?;
            }

            let parent_content = working.leaf().and_then(|p| p.content.clone());
            if let Some(hook) = node.on_enter() {
                let mut scope = HookScope::new(
                    entry.node,
                    node.qualified_name(),
                    &entry.params,
                    &mut self.controllers,
                    deferred,
                )
                .with_content(entry.content.as_ref())
                .with_parent_content(parent_content.as_ref());
                hook(&mut scope)?;
            }
            if let Some(follow_up) = node.follow_up() {
                deferred.push(TransitionRequest::new(follow_up.clone()).with_origin(entry.node));
            }

            let content = match node.connect() {
                Some(spec) => Some((spec, self.outlet_content(&spec.content, &entry, parent_content)?)),
                None => None,
            };
            working.push(entry);

            if let Some((spec, content)) = content {
                let handle = self.controllers.connect(spec, content.as_ref())?;
                debug!(state = %node.qualified_name(), outlet = %handle, "outlet connected");
                if let Some(last) = working.last_mut() {
                    last.outlet = Some(handle);
                }
            }
            report.entered.push(node.qualified_name().to_string());
        }

        Ok(())
    }

    fn outlet_content(
        &self,
        source: &ContentSource,
        entry: &StackEntry,
        parent_content: Option<Value>,
    ) -> trellis_core::Result<Option<Value>> {
        Ok(match source {
            ContentSource::None => None,
            ContentSource::Context => entry.content.clone(),
            ContentSource::Empty => Some(Value::Object(Map::new())),
            ContentSource::Literal { value } => Some(value.clone()),
            ContentSource::Parent => parent_content,
            ContentSource::ControllerField { controller, field } => {
                self.controllers.read_field(controller, field)?
            }
        })
    }

    // =========================================================================
    // Resolution
    // =========================================================================

    /// Resolve a request into the root-first chain of entries to activate
    pub fn resolve(&self, request: &TransitionRequest) -> trellis_core::Result<Vec<StackEntry>> {
        let tree = &*self.tree;
        let resolver = RedirectResolver::new(tree, self.config.max_redirects);

        match &request.target {
            Target::Path(path) => {
                let chain = PathMatcher::new(tree).match_path(path)?;
                let settled = resolver.settle(chain.leaf())?;
                let matched: Vec<(NodeId, &Params)> = chain.iter().collect();
                self.bind_chain(settled.terminal, &settled.bindings, |id| {
                    matched
                        .iter()
                        .find(|(node, _)| *node == id)
                        .map(|(_, params)| (*params).clone())
                })
            }
            Target::State(name) => {
                let scope = request.origin.or_else(|| self.stack.leaf().map(|e| e.node));
                let named = tree.lookup(scope, name)?;
                let settled = resolver.settle(named)?;

                let Some(context) = &request.context else {
                    return self.bind_chain(settled.terminal, &settled.bindings, |_| None);
                };

                let holder = tree
                    .ancestry(named)
                    .into_iter()
                    .rev()
                    .find(|&id| tree.node(id).has_params())
                    .unwrap_or(named);
                let bound = bind_context(tree.node(holder).pattern().param_names(), context);

                let mut entries = self.bind_chain(settled.terminal, &settled.bindings, |id| {
                    (id == holder).then(|| bound.clone())
                })?;
                if let Some(entry) = entries.iter_mut().find(|e| e.node == holder) {
                    entry.content = Some(context.clone());
                }
                Ok(entries)
            }
        }
    }

    /// Bind every placeholder on the chain ending at `terminal`
    ///
    /// Per state: explicit bindings first, then bindings picked up while
    /// settling, then the bindings of the same state if it is active.
    fn bind_chain(
        &self,
        terminal: NodeId,
        settled: &Params,
        explicit: impl Fn(NodeId) -> Option<Params>,
    ) -> trellis_core::Result<Vec<StackEntry>> {
        let tree = &*self.tree;
        tree.ancestry(terminal)
            .into_iter()
            .map(|id| {
                let node = tree.node(id);
                let explicit = explicit(id).unwrap_or_default();
                let active = self.stack.entry_for(id);

                let mut params = Params::new();
                let mut inherited = true;
                for name in node.pattern().param_names() {
                    let value = if let Some(v) = explicit.get(name).or_else(|| settled.get(name)) {
                        inherited = false;
                        v.clone()
                    } else if let Some(v) = active.and_then(|e| e.params.get(name)) {
                        v.clone()
                    } else {
                        return Err(Error::MissingParam {
                            state: node.qualified_name().to_string(),
                            param: name.to_string(),
                        });
                    };
                    params.insert(name.to_string(), value);
                }

                let content = match active {
                    Some(active) if inherited || active.params == params => active.content.clone(),
                    _ if params.is_empty() => None,
                    _ => Some(params_object(&params)),
                };
                Ok(StackEntry::new(id, params).with_content(content))
            })
            .collect()
    }

    // =========================================================================
    // Scheduler turns
    // =========================================================================

    /// Run one scheduler turn
    ///
    /// Follow-ups from an older generation are dropped; a newer transition
    /// has superseded them. A follow-up that fails is logged and skipped,
    /// and the rest of the turn still runs. If the failure got as far as
    /// starting a walk, the bumped generation makes the remaining tasks stale.
    pub fn run_pending(&mut self) -> Vec<TransitionReport> {
        let mut reports = Vec::new();
        for task in self.scheduler.take_turn() {
            if task.generation != self.generation {
                debug!(
                    id = task.id,
                    scheduled = task.generation,
                    current = self.generation,
                    to = %task.request.target,
                    "dropping stale follow-up"
                );
                continue;
            }
            debug!(id = task.id, to = %task.request.target, "running follow-up");
            let target = task.request.target.to_string();
            match self.transition(task.request) {
                Ok(report) => reports.push(report),
                Err(e) => warn!(id = task.id, to = %target, error = %e, "follow-up failed"),
            }
        }
        reports
    }

    /// Run scheduler turns until nothing is pending
    pub fn settle(&mut self) -> Result<Vec<TransitionReport>> {
        let mut reports = Vec::new();
        for _ in 0..self.config.max_settle_turns {
            if self.scheduler.is_empty() {
                return Ok(reports);
            }
            reports.extend(self.run_pending());
        }
        if self.scheduler.is_empty() {
            return Ok(reports);
        }
        warn!(turns = self.config.max_settle_turns, pending = self.scheduler.len(), "follow-ups did not settle");
        Err(RouterError::Unsettled {
            turns: self.config.max_settle_turns,
        })
    }

    /// Cancel one scheduled follow-up
    pub fn cancel_follow_up(&mut self, id: u64) -> bool {
        self.scheduler.cancel(id)
    }

    /// Drop every scheduled follow-up
    pub fn clear_pending(&mut self) -> usize {
        self.scheduler.clear()
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("name", &self.config.name)
            .field("phase", &self.phase)
            .field("generation", &self.generation)
            .field("stack", &self.snapshot().names())
            .field("pending", &self.scheduler.len())
            .finish()
    }
}

/// Bind a transition context to a state's placeholders
///
/// Strings and numbers bind a lone placeholder; objects bind each
/// placeholder from the field of the same name, or from `id` when there is
/// only one placeholder.
fn bind_context<'a>(names: impl Iterator<Item = &'a str>, context: &Value) -> Params {
    let names: Vec<&str> = names.collect();
    let mut params = Params::new();
    match context {
        Value::Object(fields) => {
            for name in &names {
                let field = fields
                    .get(*name)
                    .or_else(|| (names.len() == 1).then(|| fields.get("id")).flatten());
                if let Some(value) = field.and_then(scalar) {
                    params.insert(name.to_string(), value);
                }
            }
        }
        other => {
            if let ([name], Some(value)) = (names.as_slice(), scalar(other)) {
                params.insert(name.to_string(), value);
            }
        }
    }
    params
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn params_object(params: &Params) -> Value {
    Value::Object(
        params
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect(),
    )
}
