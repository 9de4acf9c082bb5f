use std::sync::Arc;

use super::WalkContext;
use crate::graph::{Node, NodeKind};
use crate::layer::{identifier_for, Layer};
use crate::report::WalkEvent;

impl WalkContext<'_> {
    /// Follow external layer references and sublayers of `layer`, depth first.
    ///
    /// Every layer is enumerated once per walk, which also breaks sublayer and
    /// reference cycles.
    pub(super) fn walk_layer(&mut self, layer: Arc<Layer>, depth: usize) {
        if !self.walked.insert(layer.identifier().to_owned()) {
            return;
        }
        self.reporter.report(&WalkEvent::LayerVisited {
            identifier: layer.identifier(),
            depth,
        });

        for authored in layer.external_references() {
            self.visit_layer_dependency(&layer, &authored, NodeKind::Layer, depth);
        }
        for authored in layer.sublayer_paths() {
            self.visit_layer_dependency(&layer, authored, NodeKind::Sublayer, depth);
        }
    }

    fn visit_layer_dependency(&mut self, layer: &Layer, authored: &str, kind: NodeKind, depth: usize) {
        if authored.is_empty() {
            return;
        }
        // Plain directory anchoring, search paths only apply to prim arcs.
        let path = identifier_for(layer.base_dir().join(authored));
        let muted = self.stage.is_layer_muted(authored) || self.stage.is_layer_muted(&path);

        if !muted {
            match self.registry.find_or_open(&path) {
                Some(child) => self.walk_layer(child, depth + 1),
                None => {
                    let reason = self.registry.failure(&path).unwrap_or("cannot open layer").to_owned();
                    self.reporter.report(&WalkEvent::LayerUnavailable {
                        identifier: &path,
                        reason: &reason,
                    });
                }
            }
        }

        let online = self.resolver.exists(&path);
        self.add_node(Node::new(path.clone(), kind, online).muted(muted));
        self.add_init_edge(layer.identifier(), &path);
    }
}

#[cfg(test)]
mod tests {
    use crate::config::WalkOptions;
    use crate::graph::{Edge, EdgeType, InitEdge, NodeKind};
    use crate::layer::identifier_for;
    use crate::walker::DependencyWalker;
    use std::fs;

    #[test]
    fn sublayer_chain_is_walked_depth_first() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("anim")).unwrap();
        fs::write(
            dir.path().join("shot.usda"),
            "#usda 1.0\n(\n    subLayers = [@./anim/anim.usda@, @./fx.usda@]\n)\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("anim/anim.usda"),
            "#usda 1.0\n(\n    subLayers = [@../cache.usda@]\n)\n",
        )
        .unwrap();
        fs::write(dir.path().join("cache.usda"), "#usda 1.0\n").unwrap();

        let graph = DependencyWalker::new(dir.path().join("shot.usda"), WalkOptions::default())
            .start()
            .unwrap();

        let id = |name: &str| identifier_for(dir.path().join(name));
        let keys: Vec<&str> = graph.nodes().iter().map(|node| node.key.as_str()).collect();
        assert_eq!(
            keys,
            [id("shot.usda"), id("cache.usda"), id("anim/anim.usda"), id("fx.usda")]
        );
        assert_eq!(
            graph.init_edges(),
            [
                InitEdge { from: id("anim/anim.usda"), to: id("cache.usda") },
                InitEdge { from: id("shot.usda"), to: id("anim/anim.usda") },
                InitEdge { from: id("shot.usda"), to: id("fx.usda") },
            ]
        );

        assert!(graph.nodes().iter().all(|node| node.kind != NodeKind::Reference));
        assert!(!graph.node(&id("fx.usda")).unwrap().online);
        assert!(graph
            .edges()
            .contains(&Edge::new(id("anim/anim.usda"), id("cache.usda"), EdgeType::Sublayer)));
    }

    #[test]
    fn muted_layers_are_registered_but_not_entered() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("shot.usda"),
            "#usda 1.0\n(\n    subLayers = [@./lighting.usda@]\n)\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("lighting.usda"),
            "#usda 1.0\n(\n    subLayers = [@./rig.usda@]\n)\n",
        )
        .unwrap();
        fs::write(dir.path().join("rig.usda"), "#usda 1.0\n").unwrap();

        let options = WalkOptions::default().with_muted("./lighting.usda");
        let graph = DependencyWalker::new(dir.path().join("shot.usda"), options).start().unwrap();

        let lighting = graph.node(&identifier_for(dir.path().join("lighting.usda"))).unwrap();
        assert!(lighting.muted);
        assert!(lighting.online);
        assert!(graph.node(&identifier_for(dir.path().join("rig.usda"))).is_none());
    }
}
