//! Declarative route manifests
//!
//! A route tree can be declared in TOML instead of code:
//!
//! ```toml
//! controllers = ["mainController"]
//!
//! [root]
//! name = "main"
//! path = "/main"
//!
//! [[root.children]]
//! name = "hosts"
//! path = "/hosts"
//! default_child = "index"
//! connect = { controller = "mainController", outlet = "mainHost" }
//!
//! [[root.children.children]]
//! name = "index"
//! path = "/"
//! redirect = "summary"
//! ```
//!
//! Manifests carry no closures; enter effects are limited to field
//! assignments and follow-up transitions, and event handlers to
//! [`EventAction`]s.

use crate::node::{ConnectSpec, ContentSource, EventAction, FieldAssignment, RouteNode};
use crate::registry::ControllerRegistry;
use crate::tree::RouteTree;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A complete route manifest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteManifest {
    /// Controllers to register up front
    #[serde(default)]
    pub controllers: Vec<String>,
    pub root: NodeManifest,
}

/// One node of a manifest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeManifest {
    pub name: String,
    #[serde(default = "default_path")]
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_child: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connect: Option<ConnectSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub set: Vec<FieldAssignment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub follow_up: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub events: BTreeMap<String, EventAction>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeManifest>,
}

fn default_path() -> String {
    "/".to_string()
}

impl RouteManifest {
    /// Decode a TOML manifest
    pub fn from_toml(source: &str) -> Result<Self> {
        Ok(toml::from_str(source)?)
    }

    /// Convert into a route declaration
    pub fn into_route(self) -> RouteNode {
        self.root.into_route()
    }

    /// Every controller the manifest refers to, sorted
    pub fn referenced_controllers(&self) -> BTreeSet<String> {
        let mut names: BTreeSet<String> = self.controllers.iter().cloned().collect();
        self.root.collect_controllers(&mut names);
        names
    }

    /// Build the validated tree and a registry with a [`BasicController`]
    /// for every referenced controller
    ///
    /// [`BasicController`]: crate::BasicController
    pub fn build(self) -> Result<(RouteTree, ControllerRegistry)> {
        let mut registry = ControllerRegistry::new();
        for name in self.referenced_controllers() {
            registry.ensure_basic(&name);
        }
        let tree = RouteTree::build(self.into_route())?;
        Ok((tree, registry))
    }
}

impl NodeManifest {
    pub fn into_route(self) -> RouteNode {
        let mut node = RouteNode::new(self.name, self.path);
        if let Some(default_child) = self.default_child {
            node = node.default_child(default_child);
        }
        if let Some(redirect) = self.redirect {
            node = node.redirect(redirect);
        }
        if let Some(connect) = self.connect {
            node = node.connect(connect);
        }
        for assignment in self.set {
            node = node.assign(assignment.controller, assignment.field, assignment.value);
        }
        if let Some(target) = self.follow_up {
            node = node.follow_up(target);
        }
        for (event, action) in self.events {
            node = node.on_event_action(event, action);
        }
        for child in self.children {
            node = node.child(child.into_route());
        }
        node
    }

    fn collect_controllers(&self, names: &mut BTreeSet<String>) {
        if let Some(connect) = &self.connect {
            names.insert(connect.controller.clone());
            if let ContentSource::ControllerField { controller, .. } = &connect.content {
                names.insert(controller.clone());
            }
        }
        let assignments = self
            .set
            .iter()
            .chain(self.events.values().flat_map(|a| a.set.iter()));
        for assignment in assignments {
            names.insert(assignment.controller.clone());
        }
        for child in &self.children {
            child.collect_controllers(names);
        }
    }
}
