//! End-to-end walks over on-disk asset trees.

use rstest::rstest;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use usd_depgraph::layer::identifier_for;
use usd_depgraph::report::RecordingReporter;
use usd_depgraph::{DependencyGraph, DependencyWalker, Edge, EdgeType, NodeKind, WalkError, WalkOptions};

fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures").join(name)
}

fn fixture_id(name: &str) -> String {
    identifier_for(fixture_path(name))
}

fn walk_fixture(options: WalkOptions) -> DependencyGraph {
    DependencyWalker::new(fixture_path("shot/shot.usda"), options)
        .start()
        .expect("Failed to walk shot fixture")
}

fn edge(from: &str, to: &str, ty: EdgeType) -> Edge {
    Edge::new(fixture_id(from), fixture_id(to), ty)
}

#[rstest]
#[case("shot/shot.usda", NodeKind::Layer, true)]
#[case("shot/anim.usda", NodeKind::Sublayer, true)]
#[case("shot/lighting.usda", NodeKind::Sublayer, false)]
#[case("geo/chair.usd", NodeKind::Layer, true)]
#[case("geo/chair_low.usda", NodeKind::Layer, true)]
#[case("geo/chair_high.usda", NodeKind::Layer, false)]
#[case("geo/missing_set.usda", NodeKind::Layer, false)]
#[case("shot/clips/manifest.usda", NodeKind::Layer, true)]
fn fixture_nodes(#[case] name: &str, #[case] kind: NodeKind, #[case] online: bool) {
    let graph = walk_fixture(WalkOptions::default());
    let node = graph
        .node(&fixture_id(name))
        .unwrap_or_else(|| panic!("{name} not discovered"));
    assert_eq!(node.kind, kind, "kind of {name}");
    assert_eq!(node.online, online, "online flag of {name}");
    assert!(!node.muted);
}

#[test]
fn fixture_edges() {
    let graph = walk_fixture(WalkOptions::default());
    let edges: HashSet<&Edge> = graph.edges().iter().collect();

    let expected = [
        edge("shot/shot.usda", "geo/chair.usd", EdgeType::Reference),
        edge("shot/shot.usda", "geo/missing_set.usda", EdgeType::Payload),
        edge("geo/chair.usd", "geo/chair_high.usda", EdgeType::Payload),
        edge("geo/chair.usd", "geo/chair_low.usda", EdgeType::Payload),
        edge("shot/shot.usda", "shot/anim.usda", EdgeType::Sublayer),
        edge("shot/shot.usda", "shot/lighting.usda", EdgeType::Sublayer),
    ];
    for expected in &expected {
        assert!(edges.contains(expected), "missing edge {expected:?}");
    }

    let clip = Edge::new(fixture_id("shot/clips/manifest.usda"), "./clips/crowd.001-003.usda", EdgeType::Clip);
    assert!(edges.contains(&clip));
    assert_eq!(graph.edges().len(), expected.len() + 1);
}

#[test]
fn clip_sequence_is_offline_when_a_member_is_missing() {
    let graph = walk_fixture(WalkOptions::default());
    let clip = graph.node("./clips/crowd.001-003.usda").unwrap();
    assert_eq!(clip.kind, NodeKind::Clip);
    assert!(!clip.online);
}

#[test]
fn keys_and_edges_are_unique() {
    let graph = walk_fixture(WalkOptions::default());

    let keys: HashSet<&str> = graph.nodes().iter().map(|node| node.key.as_str()).collect();
    assert_eq!(keys.len(), graph.nodes().len());

    let edges: HashSet<&Edge> = graph.edges().iter().collect();
    assert_eq!(edges.len(), graph.edges().len());

    for edge in graph.edges() {
        assert!(keys.contains(edge.from.as_str()), "dangling source {}", edge.from);
        assert!(keys.contains(edge.to.as_str()), "dangling target {}", edge.to);
    }
}

#[test]
fn walking_twice_gives_the_same_graph() {
    let walker = DependencyWalker::new(fixture_path("shot/shot.usda"), WalkOptions::default());
    let first = walker.start().unwrap();
    let second = walker.reload().unwrap();

    let as_sets = |graph: &DependencyGraph| {
        let nodes: HashSet<_> = graph
            .nodes()
            .iter()
            .map(|node| (node.key.clone(), node.kind, node.online, node.muted))
            .collect();
        let edges: HashSet<_> = graph.edges().iter().cloned().collect();
        (nodes, edges)
    };
    assert_eq!(as_sets(&first), as_sets(&second));
}

#[test]
fn without_repair_layer_walk_nodes_stay_loose() {
    let options = WalkOptions {
        repair_connectivity: false,
        ..WalkOptions::default()
    };
    let graph = walk_fixture(options);

    let lighting = fixture_id("shot/lighting.usda");
    assert!(graph.edges().iter().all(|edge| edge.to != lighting));
    assert!(graph
        .init_edges()
        .iter()
        .any(|init| init.from == fixture_id("shot/shot.usda") && init.to == lighting));
}

#[test]
fn uncached_resolution_matches_cached() {
    let cached = walk_fixture(WalkOptions::default());
    let uncached = walk_fixture(WalkOptions {
        cache_resolution: false,
        ..WalkOptions::default()
    });
    assert_eq!(cached.nodes(), uncached.nodes());
    assert_eq!(cached.edges(), uncached.edges());
}

#[test]
fn skipped_arcs_are_reported() {
    let reporter = Arc::new(RecordingReporter::new());
    DependencyWalker::new(fixture_path("shot/shot.usda"), WalkOptions::default())
        .with_reporter(reporter.clone())
        .start()
        .unwrap();

    let skipped = reporter.matching("arc skipped");
    assert_eq!(skipped.len(), 1, "{skipped:?}");
    assert!(skipped[0].contains("prim=/Set"));
    assert!(skipped[0].contains("missing_set.usda"));
}

#[test]
fn find_and_view_nodes() {
    let graph = walk_fixture(WalkOptions::default());

    let found: Vec<&str> = graph
        .find_nodes("CHAIR")
        .unwrap()
        .into_iter()
        .map(|node| node.key.as_str())
        .collect();
    assert_eq!(
        found,
        [fixture_id("geo/chair.usd"), fixture_id("geo/chair_high.usda"), fixture_id("geo/chair_low.usda")]
    );

    let text = graph.read_ascii(&fixture_id("shot/anim.usda")).unwrap();
    assert!(text.starts_with("#usda 1.0"));
    assert!(graph.read_ascii(&fixture_id("geo/chair.usd")).is_err());
}

#[test]
fn dot_output_marks_offline_nodes() {
    let graph = walk_fixture(WalkOptions::default());
    let dot = graph.to_dot();
    assert!(dot.starts_with("digraph"));
    assert!(dot.contains("missing_set.usda\\nOFFLINE"));
    assert!(!dot.contains("anim.usda\\nOFFLINE"));
}

fn write(dir: &Path, name: &str, text: &str) {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, text).unwrap();
}

#[test]
fn sublayer_and_missing_reference() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "root.usda",
        "#usda 1.0\n(\n    subLayers = [@./sub.usda@]\n)\n\ndef \"Prop\" (\n    references = @./missing.usda@</Prop>\n)\n{\n}\n",
    );
    write(dir.path(), "sub.usda", "#usda 1.0\n");

    let graph = DependencyWalker::new(dir.path().join("root.usda"), WalkOptions::default())
        .start()
        .unwrap();

    let root = identifier_for(dir.path().join("root.usda"));
    let sub = identifier_for(dir.path().join("sub.usda"));
    let missing = identifier_for(dir.path().join("missing.usda"));

    assert_eq!(graph.nodes().len(), 3);
    assert!(graph.node(&sub).unwrap().online);
    assert!(!graph.node(&missing).unwrap().online);

    let edges: HashSet<Edge> = graph.edges().iter().cloned().collect();
    let expected: HashSet<Edge> = [
        Edge::new(root.clone(), sub, EdgeType::Sublayer),
        Edge::new(root, missing, EdgeType::Reference),
    ]
    .into_iter()
    .collect();
    assert_eq!(edges, expected);
}

#[test]
fn sublayer_cycle_terminates() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "a.usda", "#usda 1.0\n(\n    subLayers = [@./b.usda@]\n)\n");
    write(dir.path(), "b.usda", "#usda 1.0\n(\n    subLayers = [@./a.usda@]\n)\n");

    let graph = DependencyWalker::new(dir.path().join("a.usda"), WalkOptions::default())
        .start()
        .unwrap();

    let a = identifier_for(dir.path().join("a.usda"));
    let b = identifier_for(dir.path().join("b.usda"));
    let keys: Vec<&str> = graph.nodes().iter().map(|node| node.key.as_str()).collect();
    assert_eq!(keys, [a.as_str(), b.as_str()]);
    assert!(graph.edges().contains(&Edge::new(a, b, EdgeType::Sublayer)));
}

#[test]
fn ten_frame_clip_sequence() {
    let dir = tempfile::tempdir().unwrap();
    let paths: Vec<String> = (1..=10).map(|frame| format!("@./shot.{frame:03}.usd@")).collect();
    write(
        dir.path(),
        "crowd.usda",
        &format!(
            "#usda 1.0\n\ndef \"Crowd\" (\n    clips = {{\n        dictionary default = {{\n            asset[] assetPaths = [{}]\n        }}\n    }}\n)\n{{\n}}\n",
            paths.join(", ")
        ),
    );
    for frame in 1..=10 {
        write(dir.path(), &format!("shot.{frame:03}.usd"), "#usda 1.0\n");
    }

    let walker = DependencyWalker::new(dir.path().join("crowd.usda"), WalkOptions::default());
    let clip = walker.start().unwrap().node("./shot.001-010.usd").cloned().unwrap();
    assert!(clip.online);

    fs::remove_file(dir.path().join("shot.007.usd")).unwrap();
    let clip = walker.reload().unwrap().node("./shot.001-010.usd").cloned().unwrap();
    assert!(!clip.online);

    // Without a manifest the clip hangs off the layer that authored it.
    let graph = walker.start().unwrap();
    let crowd = identifier_for(dir.path().join("crowd.usda"));
    assert!(graph
        .edges()
        .contains(&Edge::new(crowd, "./shot.001-010.usd", EdgeType::Clip)));
}

#[test]
fn search_path_payloads_resolve_through_options() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "shot/shot.usda",
        "#usda 1.0\n\ndef \"Tree\" (\n    payload = @props/tree.usda@\n)\n{\n}\n",
    );
    write(
        dir.path(),
        "library/props/tree.usda",
        "#usda 1.0\n(\n    defaultPrim = \"Tree\"\n)\n\ndef \"Tree\" {}\n",
    );

    let options = WalkOptions::default().with_search_path(dir.path().join("library"));
    let graph = DependencyWalker::new(dir.path().join("shot/shot.usda"), options)
        .start()
        .unwrap();

    let tree = identifier_for(dir.path().join("library/props/tree.usda"));
    let node = graph.node(&tree).unwrap();
    assert_eq!(node.kind, NodeKind::Payload);
    assert!(node.online);
    assert!(graph.edges().contains(&Edge::new(
        identifier_for(dir.path().join("shot/shot.usda")),
        tree,
        EdgeType::Payload
    )));
}

#[test]
fn search_path_layers_bring_their_sublayers() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "shot/shot.usda",
        "#usda 1.0\n\ndef \"Tree\" (\n    payload = @props/tree.usda@\n)\n{\n}\n",
    );
    write(
        dir.path(),
        "library/props/tree.usda",
        "#usda 1.0\n(\n    defaultPrim = \"Tree\"\n    subLayers = [@./tree_geo.usda@]\n)\n\ndef \"Tree\" {}\n",
    );
    write(
        dir.path(),
        "library/props/tree_geo.usda",
        "#usda 1.0\n\nover \"Tree\" (\n    references = @./leaf.usda@\n)\n{\n}\n",
    );
    write(
        dir.path(),
        "library/props/leaf.usda",
        "#usda 1.0\n(\n    defaultPrim = \"Leaf\"\n)\n\ndef \"Leaf\" {}\n",
    );

    let options = WalkOptions::default().with_search_path(dir.path().join("library"));
    let graph = DependencyWalker::new(dir.path().join("shot/shot.usda"), options)
        .start()
        .unwrap();

    let tree = identifier_for(dir.path().join("library/props/tree.usda"));
    let tree_geo = identifier_for(dir.path().join("library/props/tree_geo.usda"));
    let leaf = identifier_for(dir.path().join("library/props/leaf.usda"));

    let geo = graph.node(&tree_geo).expect("composed sublayer is a node");
    assert_eq!(geo.kind, NodeKind::Sublayer);
    assert!(geo.online);

    let edges: HashSet<&Edge> = graph.edges().iter().collect();
    assert!(edges.contains(&Edge::new(tree_geo.clone(), leaf, EdgeType::Reference)));
    assert!(edges.contains(&Edge::new(tree, tree_geo, EdgeType::Sublayer)));

    for edge in graph.edges() {
        assert!(graph.contains_node(&edge.from), "dangling source {}", edge.from);
        assert!(graph.contains_node(&edge.to), "dangling target {}", edge.to);
    }
}

#[test]
fn missing_root_is_an_open_error() {
    let err = DependencyWalker::new(fixture_path("shot/nope.usda"), WalkOptions::default())
        .start()
        .unwrap_err();
    assert!(matches!(err, WalkError::Open { .. }));
    assert!(err.to_string().contains("nope.usda"));
}
