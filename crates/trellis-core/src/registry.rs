//! Controller registry and the outlet attach contract
//!
//! Controllers are the external owners of view regions and domain content.
//! The engine only ever reaches them through a flat string key, and only
//! touches the handful of operations defined by [`Controller`].

use crate::node::{ConnectSpec, FieldAssignment};
use crate::{Error, Result};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};

/// Handle for an attached outlet, held by the stack entry that connected it
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct OutletHandle {
    /// Controller that owns the outlet
    pub controller: String,
    /// Outlet (view region) name
    pub outlet: String,
    /// Attach serial, unique per registry
    pub serial: u64,
}

impl std::fmt::Display for OutletHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.controller, self.outlet)
    }
}

/// The view-layer side of the engine
pub trait Controller: Send {
    /// Render `outlet` bound to `content` (none for content-less regions)
    fn connect_outlet(&mut self, outlet: &str, content: Option<&Value>) -> Result<()>;

    /// Tear down a previously connected outlet
    fn disconnect_outlet(&mut self, _outlet: &str) -> Result<()> {
        Ok(())
    }

    /// Read a controller-held field
    fn field(&self, field: &str) -> Option<Value>;

    /// Set a controller-held field as directed by route configuration
    fn set_field(&mut self, field: &str, value: Value) -> Result<()>;

    /// Mark one child view active and deactivate its siblings
    fn set_active_child(&mut self, child: &str) -> Result<()> {
        Err(Error::Controller(format!(
            "controller has no selectable child views (requested {})",
            child
        )))
    }
}

/// A plain in-memory controller
///
/// Keeps fields in a JSON map and remembers which outlets are attached.
#[derive(Debug, Clone, Default)]
pub struct BasicController {
    fields: Map<String, Value>,
    outlets: BTreeMap<String, Option<Value>>,
    active_child: Option<String>,
}

impl BasicController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Currently attached outlets and their content
    pub fn outlets(&self) -> &BTreeMap<String, Option<Value>> {
        &self.outlets
    }

    /// The active child view, if one was selected
    pub fn active_child(&self) -> Option<&str> {
        self.active_child.as_deref()
    }
}

impl Controller for BasicController {
    fn connect_outlet(&mut self, outlet: &str, content: Option<&Value>) -> Result<()> {
        self.outlets.insert(outlet.to_string(), content.cloned());
        if let Some(content) = content {
            self.fields.insert("content".to_string(), content.clone());
        }
        Ok(())
    }

    fn disconnect_outlet(&mut self, outlet: &str) -> Result<()> {
        self.outlets.remove(outlet);
        Ok(())
    }

    fn field(&self, field: &str) -> Option<Value> {
        self.fields.get(field).cloned()
    }

    fn set_field(&mut self, field: &str, value: Value) -> Result<()> {
        self.fields.insert(field.to_string(), value);
        Ok(())
    }

    fn set_active_child(&mut self, child: &str) -> Result<()> {
        self.active_child = Some(child.to_string());
        Ok(())
    }
}

/// Process-wide controller lookup, constructed once and injected into the router
#[derive(Default)]
pub struct ControllerRegistry {
    controllers: HashMap<String, Box<dyn Controller>>,
    next_serial: u64,
}

impl ControllerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a controller, returning any controller it replaces
    pub fn register(
        &mut self,
        name: impl Into<String>,
        controller: impl Controller + 'static,
    ) -> Option<Box<dyn Controller>> {
        self.controllers.insert(name.into(), Box::new(controller))
    }

    /// Builder-style [`ControllerRegistry::register`]
    pub fn with(mut self, name: impl Into<String>, controller: impl Controller + 'static) -> Self {
        self.register(name, controller);
        self
    }

    /// Register a [`BasicController`] unless the name is already taken
    pub fn ensure_basic(&mut self, name: &str) {
        if !self.controllers.contains_key(name) {
            self.controllers
                .insert(name.to_string(), Box::new(BasicController::new()));
        }
    }

    /// Check whether a controller is registered
    pub fn contains(&self, name: &str) -> bool {
        self.controllers.contains_key(name)
    }

    /// Registered controller names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.controllers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn get(&self, name: &str) -> Result<&dyn Controller> {
        self.controllers
            .get(name)
            .map(|c| &**c)
            .ok_or_else(|| Error::UnknownController(name.to_string()))
    }

    pub fn get_mut(&mut self, name: &str) -> Result<&mut (dyn Controller + 'static)> {
        self.controllers
            .get_mut(name)
            .map(|c| &mut **c)
            .ok_or_else(|| Error::UnknownController(name.to_string()))
    }

    /// Attach the outlet described by `spec`
    pub fn connect(&mut self, spec: &ConnectSpec, content: Option<&Value>) -> Result<OutletHandle> {
        self.get_mut(&spec.controller)?
            .connect_outlet(&spec.outlet, content)?;
        self.next_serial += 1;
        Ok(OutletHandle {
            controller: spec.controller.clone(),
            outlet: spec.outlet.clone(),
            serial: self.next_serial,
        })
    }

    /// Detach a previously attached outlet
    pub fn disconnect(&mut self, handle: &OutletHandle) -> Result<()> {
        self.get_mut(&handle.controller)?
            .disconnect_outlet(&handle.outlet)
    }

    /// Apply a field assignment
    pub fn assign(&mut self, assignment: &FieldAssignment) -> Result<()> {
        self.get_mut(&assignment.controller)?
            .set_field(&assignment.field, assignment.value.clone())
    }

    /// Read a field from a named controller
    pub fn read_field(&self, controller: &str, field: &str) -> Result<Option<Value>> {
        Ok(self.get(controller)?.field(field))
    }
}

impl std::fmt::Debug for ControllerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControllerRegistry")
            .field("controllers", &self.names())
            .finish()
    }
}
