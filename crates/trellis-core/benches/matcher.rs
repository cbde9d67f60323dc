//! Path matching benchmarks

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use trellis_core::{PathMatcher, RedirectResolver, RouteNode, RouteTree, DEFAULT_MAX_REDIRECTS};

fn console_tree() -> RouteTree {
    let host_tabs = |node: RouteNode| {
        node.index(RouteNode::new("index", "/").redirect("summary"))
            .child(RouteNode::new("summary", "/summary"))
            .child(RouteNode::new("metrics", "/metrics"))
            .child(RouteNode::new("configs", "/configs"))
            .child(RouteNode::new("audit", "/audit"))
    };

    let root = RouteNode::new("main", "/main")
        .index(RouteNode::new("index", "/").redirect("dashboard"))
        .child(RouteNode::new("dashboard", "/dashboard"))
        .child(host_tabs(RouteNode::new("hosts", "/hosts")))
        .child(host_tabs(RouteNode::new("hostDetails", "/hosts/:host_id")))
        .child(
            RouteNode::new("apps", "/apps")
                .index(RouteNode::new("index", "/"))
                .child(
                    RouteNode::new("showApp", "/:app_id")
                        .child(RouteNode::new("dag", "/dag"))
                        .child(RouteNode::new("jobs", "/jobs")),
                ),
        );

    RouteTree::build(root).unwrap()
}

fn literal_benchmark(c: &mut Criterion) {
    let tree = console_tree();
    let matcher = PathMatcher::new(&tree);

    c.bench_function("match_literal_path", |b| {
        b.iter(|| black_box(matcher.match_path("/main/hosts/metrics").unwrap()))
    });
}

fn backtracking_benchmark(c: &mut Criterion) {
    let tree = console_tree();
    let matcher = PathMatcher::new(&tree);

    c.bench_function("match_backtracking_path", |b| {
        b.iter(|| black_box(matcher.match_path("/main/hosts/c6401.ambari.apache.org/audit").unwrap()))
    });
}

fn settle_benchmark(c: &mut Criterion) {
    let tree = console_tree();
    let matcher = PathMatcher::new(&tree);
    let resolver = RedirectResolver::new(&tree, DEFAULT_MAX_REDIRECTS);

    c.bench_function("match_and_settle_index", |b| {
        b.iter(|| {
            let chain = matcher.match_path("/main/hosts/c6401/").unwrap();
            black_box(resolver.settle(chain.leaf()).unwrap())
        })
    });
}

criterion_group!(benches, literal_benchmark, backtracking_benchmark, settle_benchmark);
criterion_main!(benches);
