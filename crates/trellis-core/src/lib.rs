//! Trellis Core
//!
//! Static route configuration and the pure resolution steps of the trellis
//! navigation engine. Nothing in this crate performs I/O or owns a runtime.
//!
//! This crate provides:
//! - Path parsing and route patterns ([`RoutePath`], [`RoutePattern`])
//! - The route node builder and compiled tree ([`RouteNode`], [`RouteTree`])
//! - Path matching with dynamic segments ([`PathMatcher`])
//! - Redirect and index resolution with cycle protection ([`RedirectResolver`])
//! - The active state stack ([`StateStack`])
//! - The controller registry and outlet contract ([`ControllerRegistry`])
//! - Hook scopes handed to enter/exit hooks and event handlers ([`hook`])
//! - Declarative TOML route manifests ([`RouteManifest`])

pub mod error;
pub mod hook;
pub mod manifest;
pub mod matcher;
pub mod node;
pub mod path;
pub mod redirect;
pub mod registry;
pub mod stack;
pub mod tree;

pub use error::{Error, Result};
pub use hook::{
    EventContext, EventHandler, EventScope, HookScope, StateHook, Target, TransitionRequest,
    ViewRef,
};
pub use manifest::{NodeManifest, RouteManifest};
pub use matcher::{MatchedChain, PathMatcher};
pub use node::{ConnectSpec, ContentSource, EventAction, FieldAssignment, RouteNode};
pub use path::{Params, RoutePath, RoutePattern, Segment};
pub use redirect::{RedirectResolver, Settled};
pub use registry::{BasicController, Controller, ControllerRegistry, OutletHandle};
pub use stack::{SnapshotEntry, StackEntry, StackSnapshot, StateStack};
pub use tree::{NodeId, RouteTree, StateNode};

/// Default ceiling on redirect hops while settling a target
pub const DEFAULT_MAX_REDIRECTS: usize = 16;

/// Separator between state names in dotted and qualified names
pub const NAME_SEPARATOR: char = '.';

/// Prefix marking a dynamic placeholder in a route pattern
pub const PARAM_PREFIX: char = ':';
