use super::WalkContext;
use crate::clips::ClipSequence;
use crate::graph::{Edge, EdgeType, Node, NodeKind};
use crate::report::WalkEvent;
use crate::sdf::{self, schema::FieldKey};
use crate::stage::{Prim, PrimSpecRef};

impl WalkContext<'_> {
    /// Collect reference, payload, variant payload and clip dependencies from
    /// every composed prim, including inactive and abstract ones.
    pub(super) fn walk_prims(&mut self) {
        let stage = self.stage;

        for arc in stage.skipped_arcs() {
            self.reporter.report(&WalkEvent::ArcSkipped {
                prim: &arc.prim,
                asset_path: &arc.asset_path,
                reason: &arc.reason,
            });
        }

        for prim in stage.traverse_all() {
            for spec_ref in &prim.stack {
                self.visit_spec(spec_ref);
                self.visit_variant_payloads(spec_ref);
            }
            self.visit_clips(prim);
        }
    }

    fn visit_spec(&mut self, spec_ref: &PrimSpecRef) {
        let Some(spec) = spec_ref.spec() else {
            return;
        };
        let anchor = spec_ref.layer_identifier();

        if let Some(payloads) = spec.get(FieldKey::Payload).and_then(sdf::Value::as_payload_list_op) {
            for (_, payload) in payloads.edit_items() {
                self.add_dependency(anchor, &payload.asset_path, NodeKind::Payload, EdgeType::Payload);
            }
        }

        if let Some(references) = spec.get(FieldKey::References).and_then(sdf::Value::as_reference_list_op) {
            for (_, reference) in references.edit_items() {
                // Internal references point back into the same layer stack.
                if reference.asset_path.is_empty() {
                    continue;
                }
                self.add_dependency(anchor, &reference.asset_path, NodeKind::Reference, EdgeType::Reference);
            }
        }
    }

    /// Payloads authored inside any variant, selected or not.
    fn visit_variant_payloads(&mut self, spec_ref: &PrimSpecRef) {
        let layer = &spec_ref.layer;
        let anchor = layer.identifier();

        for set in layer.variant_sets(&spec_ref.path) {
            for variant in layer.variants(&spec_ref.path, set) {
                let Ok(variant_path) = spec_ref.path.append_variant_selection(set, variant) else {
                    continue;
                };
                let Some(payloads) = layer
                    .prim_spec(&variant_path)
                    .and_then(|spec| spec.get(FieldKey::Payload))
                    .and_then(sdf::Value::as_payload_list_op)
                else {
                    continue;
                };
                for (_, payload) in payloads.edit_items() {
                    self.add_dependency(anchor, &payload.asset_path, NodeKind::Payload, EdgeType::Payload);
                }
            }
        }
    }

    fn visit_clips(&mut self, prim: &Prim) {
        for set in prim.clip_sets() {
            let sequence = match ClipSequence::from_clip_set(&set, self.resolver) {
                Ok(sequence) => sequence,
                Err(err) => {
                    self.reporter.report(&WalkEvent::ClipSkipped {
                        prim: &prim.path,
                        clip_set: &set.name,
                        reason: &err.to_string(),
                    });
                    continue;
                }
            };

            if !self.graph.contains_node(&sequence.source) {
                let online = self.resolver.exists(&sequence.source);
                self.add_node(Node::new(sequence.source.clone(), NodeKind::Layer, online));
            }
            self.add_node(Node::new(sequence.name.clone(), NodeKind::Clip, sequence.online));
            self.add_edge(Edge::new(sequence.source, sequence.name, EdgeType::Clip));
        }
    }

    /// Register the resolved asset and, unless it resolves back onto its own
    /// layer, an edge from the authoring layer.
    ///
    /// Layers the stage composed through the resolver (search paths, custom
    /// resolvers) are entered by the layer walk here, so their sublayers become
    /// nodes before any of their specs are visited.
    fn add_dependency(&mut self, anchor: &str, asset_path: &str, kind: NodeKind, ty: EdgeType) {
        let resolved = self.resolver.resolve(anchor, asset_path);
        let online = self.resolver.exists(&resolved);
        self.add_node(Node::new(resolved.clone(), kind, online));
        if anchor != resolved {
            self.add_edge(Edge::new(anchor, resolved.as_str(), ty));
        }

        if !self.stage.is_layer_muted(&resolved) {
            if let Some(layer) = self.registry.find(&resolved) {
                self.walk_layer(layer, 1);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::WalkOptions;
    use crate::graph::{Edge, EdgeType, NodeKind};
    use crate::layer::identifier_for;
    use crate::report::RecordingReporter;
    use crate::walker::DependencyWalker;
    use std::fs;
    use std::path::Path;
    use std::sync::Arc;

    fn write(dir: &Path, name: &str, text: &str) {
        fs::write(dir.join(name), text).unwrap();
    }

    #[test]
    fn unselected_variant_payloads_are_dependencies() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "asset.usda",
            r#"#usda 1.0
(
    defaultPrim = "Asset"
)

def "Asset" (
    variants = {
        string lod = "low"
    }
    prepend variantSets = "lod"
)
{
    variantSet "lod" = {
        "high" (
            prepend payload = @./high.usda@
        ) {
        }
        "low" (
            prepend payload = @./low.usda@
        ) {
        }
    }
}
"#,
        );
        write(dir.path(), "low.usda", "#usda 1.0\n(\n    defaultPrim = \"Geo\"\n)\n\ndef \"Geo\" {}\n");

        let graph = DependencyWalker::new(dir.path().join("asset.usda"), WalkOptions::default())
            .start()
            .unwrap();

        let asset = identifier_for(dir.path().join("asset.usda"));
        for (name, online) in [("high.usda", false), ("low.usda", true)] {
            let key = identifier_for(dir.path().join(name));
            // Already registered by the layer walk, which sees payloads as external layers.
            let node = graph.node(&key).unwrap();
            assert_eq!(node.kind, NodeKind::Layer);
            assert_eq!(node.online, online);
            assert!(graph.edges().contains(&Edge::new(asset.clone(), key, EdgeType::Payload)));
        }
    }

    #[test]
    fn references_anchor_to_the_authoring_layer() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("set/props")).unwrap();
        write(
            dir.path(),
            "shot.usda",
            "#usda 1.0\n\ndef \"World\" (\n    references = @./set/set.usda@</Set>\n)\n{\n}\n",
        );
        write(
            dir.path(),
            "set/set.usda",
            "#usda 1.0\n\ndef \"Set\" {\n    def \"Chair\" (\n        references = [@./props/chair.usda@, </Props>]\n    )\n    {\n    }\n}\n\ndef \"Props\" {\n}\n",
        );
        write(dir.path(), "set/props/chair.usda", "#usda 1.0\n(\n    defaultPrim = \"Chair\"\n)\n\ndef \"Chair\" {}\n");

        let graph = DependencyWalker::new(dir.path().join("shot.usda"), WalkOptions::default())
            .start()
            .unwrap();

        let shot = identifier_for(dir.path().join("shot.usda"));
        let set = identifier_for(dir.path().join("set/set.usda"));
        let chair = identifier_for(dir.path().join("set/props/chair.usda"));
        assert!(graph.edges().contains(&Edge::new(shot, set.clone(), EdgeType::Reference)));
        assert!(graph.edges().contains(&Edge::new(set, chair.clone(), EdgeType::Reference)));
        assert!(graph.node(&chair).unwrap().online);
        assert!(graph.edges().iter().all(|edge| edge.from != edge.to));

        // `</Props>` stays inside set.usda and adds no node of its own.
        assert_eq!(graph.nodes().len(), 3);
        assert!(graph.nodes().iter().all(|node| !Path::new(&node.key).is_dir()));
    }

    #[test]
    fn clip_sets_become_sequence_nodes() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "crowd.usda",
            r#"#usda 1.0

def "Crowd" (
    clips = {
        dictionary default = {
            asset[] assetPaths = [@./shot.001.usd@, @./shot.010.usd@]
            asset manifestAssetPath = @./manifest.usda@
            string primPath = "/Crowd"
        }
        dictionary broken = {
            asset[] assetPaths = [@./still.usd@]
        }
    }
)
{
}
"#,
        );
        write(dir.path(), "shot.001.usd", "#usda 1.0\n");

        let reporter = Arc::new(RecordingReporter::new());
        let graph = DependencyWalker::new(dir.path().join("crowd.usda"), WalkOptions::default())
            .with_reporter(reporter.clone())
            .start()
            .unwrap();

        let clip = graph.node("./shot.001-010.usd").unwrap();
        assert_eq!(clip.kind, NodeKind::Clip);
        assert!(!clip.online);

        let manifest = identifier_for(dir.path().join("manifest.usda"));
        assert_eq!(graph.node(&manifest).map(|node| node.kind), Some(NodeKind::Layer));
        assert!(graph
            .edges()
            .contains(&Edge::new(manifest, "./shot.001-010.usd", EdgeType::Clip)));

        let skipped = reporter.matching("clip skipped");
        assert_eq!(skipped.len(), 1);
        assert!(skipped[0].contains("set=broken"));
    }
}
