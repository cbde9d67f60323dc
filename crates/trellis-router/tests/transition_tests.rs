//! Transition engine tests
//!
//! Covers:
//! - Common-prefix reuse and exit/enter ordering
//! - Re-entry on binding changes
//! - Index and redirect resolution
//! - Named transitions and context binding
//! - Deferred follow-ups and generation superseding
//! - Failure semantics (partial commit, no rollback)
//! - Request origins from a different tree

use serde_json::json;
use trellis_core::{ControllerRegistry, Error, RouteNode, RouteTree, TransitionRequest};
use trellis_router::{Phase, Router, RouterConfig, RouterError};
use trellis_test_utils::{
    console_registry, console_router, console_router_with, failing, state, Journal,
    RecordingController,
};

fn names(router: &Router) -> Vec<String> {
    router
        .snapshot()
        .names()
        .into_iter()
        .map(String::from)
        .collect()
}

fn abc_router(journal: &Journal) -> Router {
    let tree = RouteTree::build(
        state("A", "/", journal).child(
            state("B", "/b", journal)
                .connect_outlet("ctrl", "outletB")
                .child(state("C", "/c", journal).connect_outlet("ctrl", "outletC"))
                .child(state("D", "/d", journal).connect_outlet("ctrl", "outletD")),
        ),
    )
    .unwrap();
    let controllers = ControllerRegistry::new().with("ctrl", RecordingController::new("ctrl", journal));
    Router::new(tree, controllers)
}

#[test]
fn test_initial_entry_runs_root_first() {
    let journal = Journal::new();
    let mut router = abc_router(&journal);

    let report = router.navigate("/b/c").unwrap();
    assert_eq!(report.entered, vec!["A", "B", "B.C"]);
    assert!(report.exited.is_empty());
    assert_eq!(
        journal.take(),
        vec![
            "enter A",
            "enter B",
            "connect ctrl.outletB",
            "enter B.C",
            "connect ctrl.outletC",
        ]
    );
}

#[test]
fn test_common_prefix_is_not_reentered() {
    let journal = Journal::new();
    let mut router = abc_router(&journal);
    router.navigate("/b/c").unwrap();
    journal.clear();

    let report = router.navigate("/b/d").unwrap();
    assert_eq!(report.exited, vec!["B.C"]);
    assert_eq!(report.entered, vec!["B.D"]);
    assert_eq!(
        journal.take(),
        vec![
            "exit B.C",
            "disconnect ctrl.outletC",
            "enter B.D",
            "connect ctrl.outletD",
        ]
    );
    assert_eq!(names(&router), vec!["A", "B", "B.D"]);
}

#[test]
fn test_exit_runs_leaf_first() {
    let journal = Journal::new();
    let mut router = console_router(&journal);
    router.navigate("/hosts/summary").unwrap();
    journal.clear();

    router.navigate("/charts").unwrap();
    let entries = journal.entries();
    let exit_summary = journal.position("exit hosts.summary").unwrap();
    let exit_hosts = journal.position("exit hosts").unwrap();
    let enter_charts = journal.position("enter charts").unwrap();
    assert!(exit_summary < exit_hosts, "{:?}", entries);
    assert!(exit_hosts < enter_charts, "{:?}", entries);
    assert!(!journal.contains("exit root"));
}

#[test]
fn test_same_path_is_a_no_op_walk() {
    let journal = Journal::new();
    let mut router = abc_router(&journal);
    router.navigate("/b/c").unwrap();
    journal.clear();

    let report = router.navigate("/b/c/").unwrap();
    assert!(report.exited.is_empty());
    assert!(report.entered.is_empty());
    assert!(journal.entries().is_empty());
}

#[test]
fn test_binding_change_forces_reentry() {
    let journal = Journal::new();
    let mut router = console_router(&journal);
    router.navigate("/hosts/host1/summary").unwrap();
    journal.clear();

    let report = router.navigate("/hosts/host2/summary").unwrap();
    assert_eq!(report.exited, vec!["hostDetails.summary", "hostDetails"]);
    assert_eq!(report.entered, vec!["hostDetails", "hostDetails.summary"]);
    assert!(journal.contains(r#"connect mainController.mainHostDetails {"host_id":"host2"}"#));
    // Parent content flows down into the nested outlet
    assert!(journal.contains(r#"connect mainHostDetailsController.mainHostSummary {"host_id":"host2"}"#));
    assert!(!journal.contains("exit root"));
}

#[test]
fn test_index_redirect_matches_explicit_path() {
    let journal = Journal::new();
    let mut router = console_router(&journal);

    let via_index = router.navigate("/hosts/").unwrap();
    assert_eq!(via_index.stack.leaf(), Some("hosts.summary"));
    assert!(!journal.contains("enter hosts.index"));

    let mut other = console_router(&Journal::new());
    let direct = other.navigate("/hosts/summary").unwrap();
    assert_eq!(via_index.stack, direct.stack);
}

#[test]
fn test_redirect_chain_enters_only_terminal() {
    let journal = Journal::new();
    let tree = RouteTree::build(
        state("root", "/", &journal)
            .child(state("x", "/x", &journal).redirect("y"))
            .child(state("y", "/y", &journal).redirect("z"))
            .child(state("z", "/z", &journal)),
    )
    .unwrap();
    let mut router = Router::new(tree, ControllerRegistry::new());

    let report = router.navigate("/x").unwrap();
    assert_eq!(report.entered, vec!["root", "z"]);
    assert!(!journal.contains("enter x"));
    assert!(!journal.contains("enter y"));
}

#[test]
fn test_redirect_cycle_fails_without_hanging() {
    let err = RouteTree::build(
        RouteNode::root("root")
            .child(RouteNode::new("x", "/x").redirect("y"))
            .child(RouteNode::new("y", "/y").redirect("x")),
    )
    .unwrap_err();
    assert!(matches!(err, Error::InvalidTree { .. }));
}

#[test]
fn test_redirect_ceiling_at_runtime() {
    let tree = RouteTree::build(
        RouteNode::root("root")
            .child(RouteNode::new("x", "/x").redirect("y"))
            .child(RouteNode::new("y", "/y")),
    )
    .unwrap();
    let config = RouterConfig {
        max_redirects: 0,
        ..RouterConfig::default()
    };
    let mut router = Router::with_config(tree, ControllerRegistry::new(), config);

    let err = router.navigate("/x").unwrap_err();
    assert!(matches!(err, RouterError::Core(Error::RedirectCycle { .. })));
    assert_eq!(router.generation(), 0);
    assert!(router.stack().is_empty());
}

#[test]
fn test_no_match_leaves_stack_untouched() {
    let journal = Journal::new();
    let mut router = console_router(&journal);
    router.navigate("/hosts/summary").unwrap();
    let before = router.snapshot();
    let generation = router.generation();

    let err = router.navigate("/clusters").unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(router.snapshot(), before);
    assert_eq!(router.generation(), generation);
}

#[test]
fn test_named_transition_binds_context() {
    let journal = Journal::new();
    let mut router = console_router(&journal);

    let report = router
        .transition_to("hostDetails", Some(json!("c6401.ambari.apache.org")))
        .unwrap();
    assert_eq!(report.stack.leaf(), Some("hostDetails.summary"));
    assert_eq!(
        report.stack.url.as_deref(),
        Some("/hosts/c6401.ambari.apache.org/summary")
    );
    assert!(journal.contains(r#"connect mainController.mainHostDetails "c6401.ambari.apache.org""#));
}

#[test]
fn test_named_transition_with_object_context() {
    let journal = Journal::new();
    let mut router = console_router(&journal);

    let report = router
        .transition_to("hostDetails.metrics", Some(json!({"id": "h7", "rack": "/r1"})))
        .unwrap();
    assert_eq!(report.stack.url.as_deref(), Some("/hosts/h7/metrics"));
}

#[test]
fn test_named_transition_inherits_active_binding() {
    let journal = Journal::new();
    let mut router = console_router(&journal);
    router.navigate("/hosts/h1/summary").unwrap();
    journal.clear();

    let report = router.transition_to("metrics", None).unwrap();
    assert_eq!(report.exited, vec!["hostDetails.summary"]);
    assert_eq!(report.entered, vec!["hostDetails.metrics"]);
    assert_eq!(report.stack.url.as_deref(), Some("/hosts/h1/metrics"));
}

#[test]
fn test_named_transition_missing_param() {
    let mut router = console_router(&Journal::new());
    let err = router.transition_to("hostDetails.audit", None).unwrap_err();
    assert!(matches!(
        err,
        RouterError::Core(Error::MissingParam { ref param, .. }) if param == "host_id"
    ));
    assert_eq!(router.generation(), 0);
}

#[test]
fn test_ambiguous_name_is_rejected() {
    let mut router = console_router(&Journal::new());
    let err = router.transition_to("summary", None).unwrap_err();
    assert!(matches!(err, RouterError::Core(Error::AmbiguousState { .. })));
}

#[test]
fn test_admin_user_scenario() {
    let journal = Journal::new();
    let mut router = console_router(&journal);

    let report = router.navigate("/admin/user").unwrap();
    assert_eq!(report.entered, vec!["root", "admin", "admin.adminUser"]);
    assert_eq!(report.deferred.len(), 1);
    assert_eq!(names(&router), vec!["root", "admin", "admin.adminUser"]);
    assert!(router.has_pending());
    assert_eq!(
        journal.take(),
        vec![
            "enter root",
            "enter admin",
            "connect mainController.mainAdmin",
            r#"set mainAdminController.category="user""#,
            "enter admin.adminUser",
        ]
    );

    let reports = router.run_pending();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].entered, vec!["admin.adminUser.allUsers"]);
    assert_eq!(
        journal.take(),
        vec![
            "enter admin.adminUser.allUsers",
            "connect mainAdminController.mainAdminUser",
        ]
    );
    assert_eq!(
        names(&router),
        vec!["root", "admin", "admin.adminUser", "admin.adminUser.allUsers"]
    );
    assert!(!router.has_pending());
}

#[test]
fn test_admin_index_redirects_then_follows_up() {
    let journal = Journal::new();
    let mut router = console_router(&journal);

    router.navigate("/admin").unwrap();
    let reports = router.settle().unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(router.snapshot().leaf(), Some("admin.adminUser.allUsers"));
    assert_eq!(
        router
            .controllers()
            .read_field("mainAdminController", "category")
            .unwrap(),
        Some(json!("user"))
    );
}

#[test]
fn test_newer_transition_supersedes_follow_up() {
    let journal = Journal::new();
    let mut router = console_router(&journal);

    router.navigate("/admin/user").unwrap();
    router.navigate("/hosts/summary").unwrap();
    journal.clear();

    let reports = router.run_pending();
    assert!(reports.is_empty());
    assert!(journal.entries().is_empty());
    assert_eq!(router.snapshot().leaf(), Some("hosts.summary"));
}

#[test]
fn test_cancel_follow_up() {
    let mut router = console_router(&Journal::new());
    let report = router.navigate("/admin/user").unwrap();

    assert!(router.cancel_follow_up(report.deferred[0]));
    assert!(router.settle().unwrap().is_empty());
    assert_eq!(router.snapshot().leaf(), Some("admin.adminUser"));
}

#[test]
fn test_failed_follow_up_does_not_drop_the_rest() {
    let journal = Journal::new();
    let tree = RouteTree::build(
        RouteNode::root("root")
            .child(RouteNode::new("start", "/start").on_enter(|scope| {
                scope.defer("nowhere");
                scope.defer("done");
                Ok(())
            }))
            .child(state("done", "/done", &journal)),
    );
    // "nowhere" only fails when its turn comes
    let mut router = Router::new(tree.unwrap(), ControllerRegistry::new());
    let report = router.navigate("/start").unwrap();
    assert_eq!(report.deferred.len(), 2);

    let reports = router.run_pending();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].entered, vec!["done"]);
    assert_eq!(router.snapshot().leaf(), Some("done"));
    assert!(!router.has_pending());
    assert_eq!(journal.take(), vec!["enter done"]);
}

#[test]
fn test_hook_cannot_transition_inline() {
    let journal = Journal::new();
    let hook_journal = journal.clone();
    let tree = RouteTree::build(
        RouteNode::root("root")
            .child(RouteNode::new("start", "/start").on_enter(move |scope| {
                match scope.transition_to("done") {
                    Err(Error::ReentrantTransition { .. }) => hook_journal.record("rejected"),
                    other => hook_journal.record(format!("unexpected {:?}", other)),
                }
                scope.defer("done");
                Ok(())
            }))
            .child(state("done", "/done", &journal)),
    )
    .unwrap();
    let mut router = Router::new(tree, ControllerRegistry::new());

    let report = router.navigate("/start").unwrap();
    assert_eq!(report.stack.leaf(), Some("start"));
    assert_eq!(journal.take(), vec!["rejected"]);
    assert_eq!(router.phase(), Phase::Idle);

    router.settle().unwrap();
    assert_eq!(router.snapshot().leaf(), Some("done"));
    assert_eq!(journal.take(), vec!["enter done"]);
}

#[test]
fn test_failed_enter_commits_partial_stack() {
    let journal = Journal::new();
    let tree = RouteTree::build(
        state("root", "/", &journal)
            .child(
                state("jobs", "/jobs", &journal)
                    .follow_up("/elsewhere")
                    .child(failing("broken", "/broken", &journal)),
            )
            .child(state("elsewhere", "/elsewhere", &journal)),
    )
    .unwrap();
    let mut router = Router::new(tree, ControllerRegistry::new());

    let err = router.navigate("/jobs/broken").unwrap_err();
    assert!(matches!(err, RouterError::Core(Error::Hook { .. })));
    // jobs finished entering; broken ran its hook but never completed
    assert_eq!(names(&router), vec!["root", "jobs"]);
    assert!(!router.has_pending());
    assert_eq!(router.phase(), Phase::Idle);

    journal.clear();
    router.navigate("/elsewhere").unwrap();
    assert_eq!(journal.take(), vec!["exit jobs", "enter elsewhere"]);
}

#[test]
fn test_refused_outlet_keeps_entered_state() {
    let journal = Journal::new();
    let mut controllers = console_registry(&journal);
    controllers.register(
        "mainController",
        RecordingController::new("mainController", &journal).refusing("mainCharts"),
    );
    let mut router = console_router_with(&journal, controllers, RouterConfig::default());

    let err = router.navigate("/charts").unwrap_err();
    assert!(matches!(err, RouterError::Core(Error::Controller(_))));
    assert_eq!(names(&router), vec!["root", "charts"]);
    assert_eq!(router.stack().leaf().unwrap().outlet, None);
}

#[test]
fn test_failed_detach_does_not_exit_twice() {
    let journal = Journal::new();
    let tree = RouteTree::build(
        state("A", "/", &journal).child(
            state("B", "/b", &journal)
                .child(state("C", "/c", &journal).connect_outlet("ctrl", "outletC"))
                .child(state("D", "/d", &journal)),
        ),
    )
    .unwrap();
    let controllers = ControllerRegistry::new()
        .with("ctrl", RecordingController::new("ctrl", &journal).stuck("outletC"));
    let mut router = Router::new(tree, controllers);
    router.navigate("/b/c").unwrap();
    journal.clear();

    let err = router.navigate("/b/d").unwrap_err();
    assert!(matches!(err, RouterError::Core(Error::Controller(_))));
    assert_eq!(names(&router), vec!["A", "B"]);
    assert_eq!(journal.take(), vec!["exit B.C", "stuck ctrl.outletC"]);

    let report = router.navigate("/b/d").unwrap();
    assert!(report.exited.is_empty());
    assert_eq!(journal.take(), vec!["enter B.D"]);
}

#[test]
fn test_default_child_descent_on_path() {
    let journal = Journal::new();
    let mut router = console_router(&journal);
    let report = router.navigate("/charts").unwrap();
    assert_eq!(report.entered, vec!["root", "charts", "charts.heatmap"]);
}

#[test]
fn test_path_redirect_supplies_bindings() {
    let tree = RouteTree::build(
        RouteNode::root("root")
            .child(RouteNode::new("legacyHost", "/legacy").redirect("/hosts/h9"))
            .child(
                RouteNode::new("hostDetails", "/hosts/:host_id")
                    .index(RouteNode::new("index", "/").redirect("summary"))
                    .child(RouteNode::new("summary", "/summary")),
            ),
    )
    .unwrap();
    let mut router = Router::new(tree, ControllerRegistry::new());

    let report = router.navigate("/legacy").unwrap();
    assert_eq!(report.stack.url.as_deref(), Some("/hosts/h9/summary"));
}

#[test]
fn test_transition_request_origin_scopes_lookup() {
    let mut router = console_router(&Journal::new());
    router.navigate("/hosts/summary").unwrap();

    let hosts = router.tree().lookup(None, "hosts").unwrap();
    let report = router
        .transition(TransitionRequest::to_state("metrics").with_origin(hosts))
        .unwrap();
    assert_eq!(report.stack.leaf(), Some("hosts.metrics"));
}

#[test]
fn test_origin_from_another_tree_is_rejected() {
    let other = RouteTree::build(
        RouteNode::root("other")
            .child(RouteNode::new("one", "/one"))
            .child(RouteNode::new("two", "/two"))
            .child(RouteNode::new("three", "/three"))
            .child(RouteNode::new("four", "/four"))
            .child(RouteNode::new("five", "/five")),
    )
    .unwrap();
    let foreign = other.lookup(None, "five").unwrap();

    let mut router = abc_router(&Journal::new());
    router.navigate("/b/d").unwrap();
    assert!(router.tree().len() <= foreign.index());

    let err = router
        .transition(TransitionRequest::to_state("C").with_origin(foreign))
        .unwrap_err();
    assert!(matches!(err, RouterError::Core(Error::UnknownState(_))));
    assert_eq!(names(&router), vec!["A", "B", "B.D"]);
    assert_eq!(router.generation(), 1);
}

#[test]
fn test_settle_is_bounded() {
    let tree = RouteTree::build(
        RouteNode::root("root")
            .child(RouteNode::new("ping", "/ping").follow_up("pong"))
            .child(RouteNode::new("pong", "/pong").follow_up("ping")),
    )
    .unwrap();
    let config = RouterConfig {
        max_settle_turns: 4,
        ..RouterConfig::default()
    };
    let mut router = Router::with_config(tree, ControllerRegistry::new(), config);

    router.navigate("/ping").unwrap();
    assert_eq!(router.settle().unwrap_err(), RouterError::Unsettled { turns: 4 });
    assert_eq!(router.clear_pending(), 1);
}
