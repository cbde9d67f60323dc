//! Event bubbling tests

use serde_json::json;
use trellis_core::{ControllerRegistry, Error, EventContext, RouteNode, RouteTree};
use trellis_router::{Router, RouterError};
use trellis_test_utils::{console_router, Journal};

#[test]
fn test_root_handler_catches_bubbled_event() {
    let journal = Journal::new();
    let mut router = console_router(&journal);
    router.navigate("/admin/user").unwrap();
    let before = router.snapshot();

    let handled = router.dispatch("refresh", EventContext::new()).unwrap();
    assert!(handled);
    assert!(journal.contains("refresh at root"));
    assert_eq!(router.snapshot(), before);
}

#[test]
fn test_unhandled_event_is_not_an_error() {
    let journal = Journal::new();
    let mut router = console_router(&journal);
    router.navigate("/hosts/summary").unwrap();
    let before = router.snapshot();
    let generation = router.generation();

    let outcome = router
        .dispatch_event("gotoCreateUser", EventContext::new())
        .unwrap();
    assert!(!outcome.handled);
    assert_eq!(outcome.handler, None);
    assert_eq!(router.snapshot(), before);
    assert_eq!(router.generation(), generation);
}

#[test]
fn test_dispatch_on_empty_stack() {
    let mut router = console_router(&Journal::new());
    assert!(!router.dispatch("refresh", EventContext::new()).unwrap());
}

#[test]
fn test_leaf_handler_wins() {
    let journal = Journal::new();
    let root_journal = journal.clone();
    let leaf_journal = journal.clone();
    let tree = RouteTree::build(
        RouteNode::root("root")
            .on_event("save", move |_| {
                root_journal.record("root saved");
                Ok(())
            })
            .child(RouteNode::new("a", "/a").child(RouteNode::new("b", "/b").on_event(
                "save",
                move |scope| {
                    leaf_journal.record(format!("{} saved", scope.state_name()));
                    Ok(())
                },
            ))),
    )
    .unwrap();
    let mut router = Router::new(tree, ControllerRegistry::new());
    router.navigate("/a/b").unwrap();

    let outcome = router.dispatch_event("save", EventContext::new()).unwrap();
    assert_eq!(outcome.handler.as_deref(), Some("a.b"));
    assert_eq!(journal.entries(), vec!["a.b saved"]);
}

#[test]
fn test_handler_transition_runs_after_handler() {
    let journal = Journal::new();
    let mut router = console_router(&journal);
    router.navigate("/admin/user").unwrap();
    router.settle().unwrap();
    journal.clear();

    let outcome = router
        .dispatch_event("gotoCreateUser", EventContext::new())
        .unwrap();
    assert_eq!(outcome.handler.as_deref(), Some("admin.adminUser"));
    assert_eq!(outcome.reports.len(), 1);
    assert_eq!(
        journal.take(),
        vec![
            "exit admin.adminUser.allUsers",
            "disconnect mainAdminController.mainAdminUser",
            "enter admin.adminUser.createUser",
            "connect mainAdminController.mainAdminUserCreate {}",
        ]
    );
}

#[test]
fn test_handler_passes_context() {
    let journal = Journal::new();
    let mut router = console_router(&journal);
    router.navigate("/admin/user/create").unwrap();

    let handled = router
        .dispatch(
            "gotoEditUser",
            EventContext::new().with_payload(json!({"userName": "admin"})),
        )
        .unwrap();
    assert!(handled);
    let snapshot = router.snapshot();
    assert_eq!(snapshot.leaf(), Some("admin.adminUser.editUser"));
    assert_eq!(snapshot.url.as_deref(), Some("/admin/user/edit/admin"));
    assert!(journal.contains(r#"connect mainAdminController.mainAdminUserEdit {"userName":"admin"}"#));
}

#[test]
fn test_show_chart_activates_view() {
    let journal = Journal::new();
    let mut router = console_router(&journal);
    router.navigate("/charts").unwrap();
    journal.clear();

    let context = EventContext::new()
        .with_payload(json!("horizon_chart"))
        .with_view("mainChartsController", "horizon_chart");
    assert!(router.dispatch("showChart", context).unwrap());

    let entries = journal.entries();
    assert_eq!(entries[0], "activate mainChartsController.horizon_chart");
    assert!(journal.contains("enter charts.horizon_chart"));
    assert_eq!(router.snapshot().leaf(), Some("charts.horizon_chart"));
}

#[test]
fn test_handler_error_propagates() {
    let mut router = console_router(&Journal::new());
    router.navigate("/charts").unwrap();

    // showChart needs a payload naming the chart
    let err = router.dispatch("showChart", EventContext::new()).unwrap_err();
    assert!(matches!(err, RouterError::Core(Error::Hook { .. })));
    assert_eq!(router.snapshot().leaf(), Some("charts.heatmap"));
}

#[test]
fn test_deferred_from_handler_waits_for_turn() {
    let tree = RouteTree::build(
        RouteNode::root("root")
            .on_event("later", |scope| {
                scope.defer("done");
                Ok(())
            })
            .child(RouteNode::new("done", "/done")),
    )
    .unwrap();
    let mut router = Router::new(tree, ControllerRegistry::new());
    router.navigate("/").unwrap();

    let outcome = router.dispatch_event("later", EventContext::new()).unwrap();
    assert!(outcome.reports.is_empty());
    assert_eq!(outcome.deferred.len(), 1);
    assert_eq!(router.snapshot().leaf(), Some("root"));

    router.settle().unwrap();
    assert_eq!(router.snapshot().leaf(), Some("done"));
}
