//! Dependency discovery for a root asset.
//!
//! A walk seeds the graph with the root layer, follows sublayers and external
//! layer references recursively, then inspects every composed prim for
//! reference, payload, variant payload and clip dependencies.

mod layers;
mod prims;

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::config::WalkOptions;
use crate::error::WalkError;
use crate::graph::{DependencyGraph, Edge, Node, NodeKind};
use crate::layer::{identifier_for, LayerRegistry};
use crate::report::{NullReporter, Reporter, WalkEvent};
use crate::resolver::{AssetResolver, CachingResolver, DefaultResolver};
use crate::stage::Stage;

pub struct DependencyWalker {
    root: PathBuf,
    options: WalkOptions,
    reporter: Box<dyn Reporter>,
    resolver: Option<Box<dyn AssetResolver>>,
}

impl DependencyWalker {
    pub fn new(root: impl Into<PathBuf>, options: WalkOptions) -> Self {
        Self {
            root: root.into(),
            options,
            reporter: Box::new(NullReporter),
            resolver: None,
        }
    }

    pub fn with_reporter(mut self, reporter: impl Reporter + 'static) -> Self {
        self.reporter = Box::new(reporter);
        self
    }

    /// Replace the file system resolver, e.g. with an asset management backed one.
    pub fn with_resolver(mut self, resolver: impl AssetResolver + 'static) -> Self {
        self.resolver = Some(Box::new(resolver));
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn options(&self) -> &WalkOptions {
        &self.options
    }

    /// Walk the root asset and build a fresh graph.
    pub fn start(&self) -> Result<DependencyGraph, WalkError> {
        let default_resolver;
        let base: &dyn AssetResolver = match &self.resolver {
            Some(resolver) => resolver.as_ref(),
            None => {
                default_resolver = DefaultResolver::new(self.options.resolver_context());
                &default_resolver
            }
        };
        let resolver: Box<dyn AssetResolver + '_> = if self.options.cache_resolution {
            Box::new(CachingResolver::new(base))
        } else {
            Box::new(base)
        };

        self.walk(resolver.as_ref())
    }

    /// Walk again from scratch, picking up any changes on disk.
    pub fn reload(&self) -> Result<DependencyGraph, WalkError> {
        self.start()
    }

    fn walk(&self, resolver: &dyn AssetResolver) -> Result<DependencyGraph, WalkError> {
        let root = identifier_for(&self.root);
        let reporter = self.reporter.as_ref();
        reporter.report(&WalkEvent::WalkStarted { root: &root });

        let mut registry = LayerRegistry::new();
        let stage = Stage::open_with(&self.root, &self.options, resolver, &mut registry)?;

        let mut walk = WalkContext {
            graph: DependencyGraph::new(root.clone()),
            stage: &stage,
            registry: &mut registry,
            resolver,
            reporter,
            walked: HashSet::new(),
        };

        let online = resolver.exists(&root);
        walk.add_node(Node::new(root, NodeKind::Layer, online));

        walk.walk_layer(stage.root_layer().clone(), 1);
        walk.walk_prims();

        let mut graph = walk.graph;
        let repaired = if self.options.repair_connectivity {
            graph.repair_connectivity()
        } else {
            0
        };

        reporter.report(&WalkEvent::WalkFinished {
            nodes: graph.nodes().len(),
            edges: graph.edges().len(),
            repaired,
        });
        Ok(graph)
    }
}

/// Mutable state shared by the layer and prim walks.
struct WalkContext<'a> {
    graph: DependencyGraph,
    stage: &'a Stage,
    registry: &'a mut LayerRegistry,
    resolver: &'a dyn AssetResolver,
    reporter: &'a dyn Reporter,
    /// Layers whose dependencies were already enumerated.
    walked: HashSet<String>,
}

impl WalkContext<'_> {
    fn add_node(&mut self, node: Node) -> bool {
        if self.graph.contains_node(&node.key) {
            return false;
        }
        self.reporter.report(&WalkEvent::NodeAdded { node: &node });
        self.graph.insert_node(node)
    }

    fn add_edge(&mut self, edge: Edge) -> bool {
        if !self.graph.insert_edge(edge.clone()) {
            return false;
        }
        self.reporter.report(&WalkEvent::EdgeAdded {
            from: &edge.from,
            to: &edge.to,
            ty: Some(edge.ty),
        });
        true
    }

    fn add_init_edge(&mut self, from: &str, to: &str) -> bool {
        if self.graph.insert_init_edge(from, to) {
            self.reporter.report(&WalkEvent::EdgeAdded { from, to, ty: None });
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::EdgeType;
    use crate::report::RecordingReporter;
    use std::fs;
    use std::sync::Arc;

    #[test]
    fn missing_root_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let walker = DependencyWalker::new(dir.path().join("nope.usda"), WalkOptions::default());
        assert!(matches!(walker.start(), Err(WalkError::Open { .. })));
    }

    #[test]
    fn walk_reports_lifecycle_events() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("root.usda");
        fs::write(&root, "#usda 1.0\n(\n    subLayers = [@./gone.usda@]\n)\n").unwrap();

        let reporter = Arc::new(RecordingReporter::new());
        let graph = DependencyWalker::new(&root, WalkOptions::default())
            .with_reporter(reporter.clone())
            .start()
            .unwrap();

        let events = reporter.events();
        assert!(events.first().unwrap().starts_with("walk started"));
        assert!(events.last().unwrap().starts_with("walk finished nodes=2 edges=1 repaired=1"));
        assert_eq!(reporter.matching("layer unavailable").len(), 1);

        let gone = identifier_for(dir.path().join("gone.usda"));
        assert_eq!(graph.node(&gone).map(|node| node.online), Some(false));
        assert_eq!(graph.edges(), [Edge::new(identifier_for(&root), gone, EdgeType::Sublayer)]);
    }

    struct LibraryResolver;

    impl AssetResolver for LibraryResolver {
        fn resolve(&self, _anchor: &str, asset_path: &str) -> String {
            format!("/library/{}", asset_path.trim_start_matches("asset:"))
        }

        fn exists(&self, path: &str) -> bool {
            path.starts_with("/library/") || Path::new(path).is_file()
        }
    }

    #[test]
    fn custom_resolver_drives_prim_dependencies() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("root.usda");
        fs::write(
            &root,
            "#usda 1.0\n\ndef \"Set\" (\n    payload = @asset:chair.usd@</Chair>\n)\n{\n}\n",
        )
        .unwrap();

        let graph = DependencyWalker::new(&root, WalkOptions::default().with_muted("unused"))
            .with_resolver(LibraryResolver)
            .start()
            .unwrap();

        let payload = graph.node("/library/chair.usd").unwrap();
        assert_eq!(payload.kind, NodeKind::Payload);
        assert!(payload.online);
        assert!(graph
            .edges()
            .contains(&Edge::new(identifier_for(&root), "/library/chair.usd", EdgeType::Payload)));
    }
}
