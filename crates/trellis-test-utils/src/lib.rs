//! Common test helpers and fixtures for trellis tests
//!
//! This crate provides:
//! - An ordered, shareable [`Journal`] of side effects
//! - A [`RecordingController`] that journals every outlet and field call
//! - Route builders whose hooks write to a journal
//! - The sample "cluster console" route tree used across the test suites

use parking_lot::Mutex;
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::timeout;
use trellis_core::{
    BasicController, ConnectSpec, ContentSource, Controller, ControllerRegistry, Error,
    EventAction, RouteNode, RouteTree,
};
use trellis_router::{Router, RouterConfig, TransitionReport};

/// Default test timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

// ============================================================================
// Journal
// ============================================================================

/// Ordered record of side effects, shared between hooks and controllers
#[derive(Clone, Default)]
pub struct Journal {
    entries: Arc<Mutex<Vec<String>>>,
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, entry: impl Into<String>) {
        self.entries.lock().push(entry.into());
    }

    /// Get all entries so far
    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().clone()
    }

    /// Take all entries, leaving the journal empty
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.entries.lock())
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn contains(&self, entry: &str) -> bool {
        self.entries.lock().iter().any(|e| e == entry)
    }

    /// Index of the first occurrence of `entry`
    pub fn position(&self, entry: &str) -> Option<usize> {
        self.entries.lock().iter().position(|e| e == entry)
    }

    /// Entries starting with `prefix`
    pub fn matching(&self, prefix: &str) -> Vec<String> {
        self.entries
            .lock()
            .iter()
            .filter(|e| e.starts_with(prefix))
            .cloned()
            .collect()
    }
}

impl std::fmt::Debug for Journal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.entries.lock().iter()).finish()
    }
}

// ============================================================================
// Recording Controller
// ============================================================================

/// Controller that journals every call and can be told to refuse outlets
pub struct RecordingController {
    name: String,
    journal: Journal,
    inner: BasicController,
    refuse: BTreeSet<String>,
    stuck: BTreeSet<String>,
}

impl RecordingController {
    pub fn new(name: impl Into<String>, journal: &Journal) -> Self {
        Self {
            name: name.into(),
            journal: journal.clone(),
            inner: BasicController::new(),
            refuse: BTreeSet::new(),
            stuck: BTreeSet::new(),
        }
    }

    /// Fail every attach of `outlet`
    pub fn refusing(mut self, outlet: impl Into<String>) -> Self {
        self.refuse.insert(outlet.into());
        self
    }

    /// Fail every detach of `outlet`
    pub fn stuck(mut self, outlet: impl Into<String>) -> Self {
        self.stuck.insert(outlet.into());
        self
    }
}

impl Controller for RecordingController {
    fn connect_outlet(&mut self, outlet: &str, content: Option<&Value>) -> trellis_core::Result<()> {
        if self.refuse.contains(outlet) {
            self.journal
                .record(format!("refuse {}.{}", self.name, outlet));
            return Err(Error::Controller(format!("{} refused outlet {}", self.name, outlet)));
        }
        match content {
            Some(content) => self
                .journal
                .record(format!("connect {}.{} {}", self.name, outlet, content)),
            None => self.journal.record(format!("connect {}.{}", self.name, outlet)),
        }
        self.inner.connect_outlet(outlet, content)
    }

    fn disconnect_outlet(&mut self, outlet: &str) -> trellis_core::Result<()> {
        if self.stuck.contains(outlet) {
            self.journal
                .record(format!("stuck {}.{}", self.name, outlet));
            return Err(Error::Controller(format!("{} cannot detach outlet {}", self.name, outlet)));
        }
        self.journal
            .record(format!("disconnect {}.{}", self.name, outlet));
        self.inner.disconnect_outlet(outlet)
    }

    fn field(&self, field: &str) -> Option<Value> {
        self.inner.field(field)
    }

    fn set_field(&mut self, field: &str, value: Value) -> trellis_core::Result<()> {
        self.journal
            .record(format!("set {}.{}={}", self.name, field, value));
        self.inner.set_field(field, value)
    }

    fn set_active_child(&mut self, child: &str) -> trellis_core::Result<()> {
        self.journal
            .record(format!("activate {}.{}", self.name, child));
        self.inner.set_active_child(child)
    }
}

// ============================================================================
// Journaled Routes
// ============================================================================

/// Attach hooks recording `enter <state>` and `exit <state>`
pub fn traced(node: RouteNode, journal: &Journal) -> RouteNode {
    let on_enter = journal.clone();
    let on_exit = journal.clone();
    node.on_enter(move |scope| {
        on_enter.record(format!("enter {}", scope.state_name()));
        Ok(())
    })
    .on_exit(move |scope| {
        on_exit.record(format!("exit {}", scope.state_name()));
        Ok(())
    })
}

/// A traced node
pub fn state(name: &str, path: &str, journal: &Journal) -> RouteNode {
    traced(RouteNode::new(name, path), journal)
}

/// A node whose enter hook records itself and then fails
pub fn failing(name: &str, path: &str, journal: &Journal) -> RouteNode {
    let on_enter = journal.clone();
    let on_exit = journal.clone();
    RouteNode::new(name, path)
        .on_enter(move |scope| {
            on_enter.record(format!("enter {}", scope.state_name()));
            Err(Error::hook(scope.state_name(), "refused to enter"))
        })
        .on_exit(move |scope| {
            on_exit.record(format!("exit {}", scope.state_name()));
            Ok(())
        })
}

// ============================================================================
// Cluster Console Fixture
// ============================================================================

/// Controllers used by [`console_tree`]
pub const CONSOLE_CONTROLLERS: &[&str] = &[
    "mainController",
    "mainHostController",
    "mainHostDetailsController",
    "mainAdminController",
    "mainChartsController",
];

/// A trimmed cluster console: hosts, host details, admin and charts
pub fn console_tree(journal: &Journal) -> RouteNode {
    let j = journal;

    let hosts = state("hosts", "/hosts", j)
        .connect_outlet("mainController", "mainHost")
        .index(state("index", "/", j).redirect("summary"))
        .child(
            state("summary", "/summary", j)
                .connect_outlet("mainHostController", "mainHostSummary"),
        )
        .child(state("metrics", "/metrics", j));

    let host_details = state("hostDetails", "/hosts/:host_id", j)
        .connect(
            ConnectSpec::new("mainController", "mainHostDetails").with_content(ContentSource::Context),
        )
        .index(state("index", "/", j).redirect("summary"))
        .child(
            state("summary", "/summary", j).connect(
                ConnectSpec::new("mainHostDetailsController", "mainHostSummary")
                    .with_content(ContentSource::Parent),
            ),
        )
        .child(
            state("metrics", "/metrics", j)
                .connect_outlet("mainHostDetailsController", "mainHostMetrics"),
        )
        .child(state("audit", "/audit", j));

    let admin_user = state("adminUser", "/user", j)
        .assign("mainAdminController", "category", Value::from("user"))
        .follow_up("allUsers")
        .on_event_action("gotoUsers", EventAction::transition("allUsers"))
        .on_event_action("gotoCreateUser", EventAction::transition("createUser"))
        .on_event_action(
            "gotoEditUser",
            EventAction::transition("editUser").passing_context(),
        )
        .child(
            state("allUsers", "/", j).connect_outlet("mainAdminController", "mainAdminUser"),
        )
        .child(
            state("createUser", "/create", j).connect(
                ConnectSpec::new("mainAdminController", "mainAdminUserCreate")
                    .with_content(ContentSource::Empty),
            ),
        )
        .child(
            state("editUser", "/edit/:userName", j).connect(
                ConnectSpec::new("mainAdminController", "mainAdminUserEdit")
                    .with_content(ContentSource::Context),
            ),
        );

    let admin = state("admin", "/admin", j)
        .connect_outlet("mainController", "mainAdmin")
        .index(state("index", "/", j).redirect("adminUser"))
        .child(admin_user)
        .child(
            state("adminAudit", "/audit", j)
                .connect_outlet("mainAdminController", "mainAdminAudit"),
        );

    let charts = state("charts", "/charts", j)
        .connect_outlet("mainController", "mainCharts")
        .default_child("heatmap")
        .on_event_action(
            "showChart",
            EventAction {
                target_from_context: true,
                activate_view: true,
                ..EventAction::default()
            },
        )
        .child(
            state("heatmap", "/heatmap", j)
                .connect_outlet("mainChartsController", "mainChartsHeatmap"),
        )
        .child(
            state("horizon_chart", "/horizon", j)
                .connect_outlet("mainChartsController", "mainChartsHorizon"),
        );

    let refresh = journal.clone();
    traced(RouteNode::root("root"), j)
        .on_event("refresh", move |scope| {
            refresh.record(format!("refresh at {}", scope.state_name()));
            Ok(())
        })
        .child(hosts)
        .child(host_details)
        .child(admin)
        .child(charts)
}

/// A registry of [`RecordingController`]s for [`console_tree`]
pub fn console_registry(journal: &Journal) -> ControllerRegistry {
    CONSOLE_CONTROLLERS
        .iter()
        .fold(ControllerRegistry::new(), |registry, name| {
            registry.with(*name, RecordingController::new(*name, journal))
        })
}

/// A router over the console fixture
pub fn console_router(journal: &Journal) -> Router {
    console_router_with(journal, console_registry(journal), RouterConfig::default())
}

pub fn console_router_with(
    journal: &Journal,
    controllers: ControllerRegistry,
    config: RouterConfig,
) -> Router {
    let tree = RouteTree::build(console_tree(journal)).expect("console fixture is valid");
    Router::with_config(tree, controllers, config)
}

// ============================================================================
// Async Helpers
// ============================================================================

/// Wait for the next report, or `None` on timeout or a closed channel
pub async fn next_report(
    rx: &mut broadcast::Receiver<TransitionReport>,
    max_wait: Duration,
) -> Option<TransitionReport> {
    timeout(max_wait, rx.recv()).await.ok()?.ok()
}

/// Wait for a report whose leaf state is `leaf`
pub async fn wait_for_leaf(
    rx: &mut broadcast::Receiver<TransitionReport>,
    leaf: &str,
    max_wait: Duration,
) -> Option<TransitionReport> {
    let deadline = tokio::time::Instant::now() + max_wait;
    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        let report = next_report(rx, remaining).await?;
        if report.stack.leaf() == Some(leaf) {
            return Some(report);
        }
    }
}
