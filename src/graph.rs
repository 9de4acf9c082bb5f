//! The dependency graph produced by a walk.

use anyhow::{bail, Context, Result};
use regex::Regex;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Layer,
    Sublayer,
    Reference,
    Payload,
    Clip,
}

impl NodeKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Layer => "layer",
            NodeKind::Sublayer => "sublayer",
            NodeKind::Reference => "reference",
            NodeKind::Payload => "payload",
            NodeKind::Clip => "clip",
        }
    }

    /// Visual preset name for graph views.
    pub const fn preset(&self) -> &'static str {
        match self {
            NodeKind::Layer | NodeKind::Sublayer => "node_default",
            NodeKind::Reference => "node_reference",
            NodeKind::Payload => "node_payload",
            NodeKind::Clip => "node_clip",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeType {
    Sublayer,
    Reference,
    Payload,
    Clip,
}

impl EdgeType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            EdgeType::Sublayer => "sublayer",
            EdgeType::Reference => "reference",
            EdgeType::Payload => "payload",
            EdgeType::Clip => "clip",
        }
    }
}

/// A discovered asset or clip sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Node {
    /// Resolved absolute path, or the synthesized name of a clip sequence.
    pub key: String,
    pub kind: NodeKind,
    pub online: bool,
    pub muted: bool,
}

impl Node {
    pub fn new(key: impl Into<String>, kind: NodeKind, online: bool) -> Self {
        Node {
            key: key.into(),
            kind,
            online,
            muted: false,
        }
    }

    pub fn muted(mut self, muted: bool) -> Self {
        self.muted = muted;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Edge {
    pub from: String,
    pub to: String,
    #[serde(rename = "type")]
    pub ty: EdgeType,
}

impl Edge {
    pub fn new(from: impl Into<String>, to: impl Into<String>, ty: EdgeType) -> Self {
        Edge {
            from: from.into(),
            to: to.into(),
            ty,
        }
    }
}

/// Untyped layer-to-layer discovery edge, kept for connectivity repair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct InitEdge {
    pub from: String,
    pub to: String,
}

/// Marker attribute shown on nodes whose file is missing.
pub const OFFLINE_MARKER: &str = "OFFLINE";

#[derive(Debug, Clone, Default, Serialize)]
pub struct DependencyGraph {
    root: String,
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    init_edges: Vec<InitEdge>,
    #[serde(skip)]
    node_index: HashMap<String, usize>,
    #[serde(skip)]
    edge_set: HashSet<Edge>,
    #[serde(skip)]
    init_edge_set: HashSet<InitEdge>,
}

impl DependencyGraph {
    pub fn new(root: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    /// Nodes in discovery order.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn init_edges(&self) -> &[InitEdge] {
        &self.init_edges
    }

    pub fn node(&self, key: &str) -> Option<&Node> {
        self.node_index.get(key).map(|&index| &self.nodes[index])
    }

    pub fn contains_node(&self, key: &str) -> bool {
        self.node_index.contains_key(key)
    }

    /// Add a node unless its key is already known. The first discovery wins.
    pub fn insert_node(&mut self, node: Node) -> bool {
        if self.node_index.contains_key(&node.key) {
            return false;
        }
        self.node_index.insert(node.key.clone(), self.nodes.len());
        self.nodes.push(node);
        true
    }

    /// Add an edge unless the same `(from, to, type)` triple is present.
    pub fn insert_edge(&mut self, edge: Edge) -> bool {
        if self.edge_set.contains(&edge) {
            return false;
        }
        self.edge_set.insert(edge.clone());
        self.edges.push(edge);
        true
    }

    pub fn insert_init_edge(&mut self, from: impl Into<String>, to: impl Into<String>) -> bool {
        let edge = InitEdge {
            from: from.into(),
            to: to.into(),
        };
        if self.init_edge_set.contains(&edge) {
            return false;
        }
        self.init_edge_set.insert(edge.clone());
        self.init_edges.push(edge);
        true
    }

    /// Connect loose nodes to the layer that discovered them.
    ///
    /// A node is loose when no typed edge points at it. Each loose node other than
    /// the root gets a `sublayer` edge from the source of its first discovery edge.
    /// Returns the number of edges added.
    pub fn repair_connectivity(&mut self) -> usize {
        let targeted: HashSet<&str> = self.edges.iter().map(|edge| edge.to.as_str()).collect();

        let repairs: Vec<Edge> = self
            .nodes
            .iter()
            .filter(|node| node.key != self.root && !targeted.contains(node.key.as_str()))
            .filter_map(|node| {
                self.init_edges
                    .iter()
                    .find(|init| init.to == node.key)
                    .map(|init| Edge::new(init.from.clone(), node.key.clone(), EdgeType::Sublayer))
            })
            .collect();

        repairs.into_iter().filter(|edge| self.insert_edge(edge.clone())).count()
    }

    /// Nodes whose file did not exist at walk time.
    pub fn offline_nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(|node| !node.online)
    }

    /// Nodes whose label contains `pattern`, case-insensitively.
    ///
    /// `pattern` may use glob wildcards (`*`, `?`, `[...]`). Results are sorted by label.
    pub fn find_nodes(&self, pattern: &str) -> Result<Vec<&Node>> {
        if pattern.is_empty() {
            return Ok(Vec::new());
        }

        let regex = glob_to_regex(&format!("*{}*", pattern.to_lowercase()))?;
        let mut found: Vec<&Node> = self
            .nodes
            .iter()
            .filter(|node| regex.is_match(&display_label(&node.key).to_lowercase()))
            .collect();
        found.sort_by_key(|node| display_label(&node.key));
        Ok(found)
    }

    /// Resolved path behind a node.
    pub fn node_path(&self, key: &str) -> Option<&str> {
        self.node(key).map(|node| node.key.as_str())
    }

    pub fn display_label(&self, key: &str) -> String {
        display_label(key)
    }

    pub fn preset(&self, kind: NodeKind) -> &'static str {
        kind.preset()
    }

    pub fn offline_marker(&self, node: &Node) -> Option<&'static str> {
        (!node.online).then_some(OFFLINE_MARKER)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Graphviz rendering for external viewers.
    pub fn to_dot(&self) -> String {
        let mut out = String::from("digraph dependencies {\n    rankdir=LR;\n");
        for node in &self.nodes {
            let style = if node.online { "solid" } else { "dashed" };
            let marker = self
                .offline_marker(node)
                .map(|marker| format!("\\n{marker}"))
                .unwrap_or_default();
            let _ = writeln!(
                out,
                "    {} [label=\"{}{marker}\", class={}, style={style}];",
                dot_quote(&node.key),
                dot_escape(&display_label(&node.key)),
                node.kind.preset()
            );
        }
        for edge in &self.edges {
            let _ = writeln!(
                out,
                "    {} -> {} [label={}];",
                dot_quote(&edge.from),
                dot_quote(&edge.to),
                edge.ty.as_str()
            );
        }
        out.push_str("}\n");
        out
    }

    /// Raw text of a `.usda` node.
    pub fn read_ascii(&self, key: &str) -> Result<String> {
        let path = self
            .node_path(key)
            .with_context(|| format!("No node named {key}"))?;
        if !path.ends_with(".usda") {
            bail!("can only view usd ascii files: {path}");
        }
        std::fs::read_to_string(path).with_context(|| format!("Unable to read {path}"))
    }
}

/// File name of a node key, used as its label in views.
pub fn display_label(key: &str) -> String {
    Path::new(key)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| key.to_owned())
}

fn dot_escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

fn dot_quote(text: &str) -> String {
    format!("\"{}\"", dot_escape(text))
}

/// Translate a shell glob into an anchored regex.
fn glob_to_regex(glob: &str) -> Result<Regex> {
    let mut pattern = String::from("^");
    let mut chars = glob.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '*' => pattern.push_str(".*"),
            '?' => pattern.push('.'),
            '[' => {
                let mut class = String::new();
                let mut closed = false;
                for next in chars.by_ref() {
                    if next == ']' && !class.is_empty() {
                        closed = true;
                        break;
                    }
                    class.push(next);
                }
                if closed {
                    pattern.push('[');
                    if let Some(rest) = class.strip_prefix('!') {
                        pattern.push('^');
                        pattern.push_str(&rest.replace('\\', "\\\\"));
                    } else {
                        pattern.push_str(&class.replace('\\', "\\\\"));
                    }
                    pattern.push(']');
                } else {
                    pattern.push_str(&regex::escape(&format!("[{class}")));
                }
            }
            other => pattern.push_str(&regex::escape(&other.to_string())),
        }
    }
    pattern.push('$');
    Regex::new(&pattern).with_context(|| format!("Invalid search pattern {glob}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn sample() -> DependencyGraph {
        let mut graph = DependencyGraph::new("/show/shot.usda");
        graph.insert_node(Node::new("/show/shot.usda", NodeKind::Layer, true));
        graph.insert_node(Node::new("/show/anim.usda", NodeKind::Sublayer, true));
        graph.insert_node(Node::new("/show/chair.usda", NodeKind::Reference, false));
        graph.insert_node(Node::new("/show/clips/walk.001-010.usd", NodeKind::Clip, true));
        graph.insert_init_edge("/show/shot.usda", "/show/anim.usda");
        graph.insert_init_edge("/show/shot.usda", "/show/chair.usda");
        graph.insert_edge(Edge::new("/show/shot.usda", "/show/chair.usda", EdgeType::Reference));
        graph
    }

    #[test]
    fn first_seen_node_wins() {
        let mut graph = sample();
        assert!(!graph.insert_node(Node::new("/show/chair.usda", NodeKind::Payload, true)));
        let node = graph.node("/show/chair.usda").unwrap();
        assert_eq!(node.kind, NodeKind::Reference);
        assert!(!node.online);
        assert_eq!(graph.nodes().len(), 4);
    }

    #[test]
    fn edges_are_unique_per_triple() {
        let mut graph = sample();
        assert!(!graph.insert_edge(Edge::new("/show/shot.usda", "/show/chair.usda", EdgeType::Reference)));
        assert!(graph.insert_edge(Edge::new("/show/shot.usda", "/show/chair.usda", EdgeType::Payload)));
        assert!(!graph.insert_init_edge("/show/shot.usda", "/show/anim.usda"));
        assert_eq!(graph.edges().len(), 2);
        assert_eq!(graph.init_edges().len(), 2);
    }

    #[test]
    fn repair_attaches_loose_layer_nodes_only() {
        let mut graph = sample();
        assert_eq!(graph.repair_connectivity(), 1);
        assert!(graph
            .edges()
            .contains(&Edge::new("/show/shot.usda", "/show/anim.usda", EdgeType::Sublayer)));
        // The clip has no discovery edge and stays loose; running again adds nothing.
        assert_eq!(graph.repair_connectivity(), 0);
    }

    #[rstest]
    #[case("ANIM", vec!["anim.usda"])]
    #[case("*.usda", vec!["anim.usda", "chair.usda", "shot.usda"])]
    #[case("walk.0??-", vec!["walk.001-010.usd"])]
    #[case("[cs]h", vec!["chair.usda", "shot.usda"])]
    #[case("[!c]h", vec!["shot.usda"])]
    #[case("nothing", vec![])]
    fn find_nodes_by_label(#[case] pattern: &str, #[case] expected: Vec<&str>) {
        let graph = sample();
        let labels: Vec<String> = graph
            .find_nodes(pattern)
            .unwrap()
            .into_iter()
            .map(|node| display_label(&node.key))
            .collect();
        assert_eq!(labels, expected);
    }

    #[test]
    fn json_uses_lowercase_kinds_and_type_field() {
        let json: serde_json::Value = serde_json::from_str(&sample().to_json().unwrap()).unwrap();
        assert_eq!(json["root"], "/show/shot.usda");
        assert_eq!(json["nodes"][1]["kind"], "sublayer");
        assert_eq!(json["edges"][0]["type"], "reference");
        assert_eq!(json["init_edges"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn dot_marks_offline_nodes() {
        let dot = sample().to_dot();
        assert!(dot.starts_with("digraph dependencies {"));
        assert!(dot.contains("\"chair.usda\\nOFFLINE\""));
        assert!(dot.contains("\"/show/shot.usda\" -> \"/show/chair.usda\" [label=reference];"));
    }

    #[test]
    fn presets_and_markers() {
        let graph = sample();
        assert_eq!(graph.preset(NodeKind::Clip), "node_clip");
        assert_eq!(graph.preset(NodeKind::Sublayer), "node_default");
        let chair = graph.node("/show/chair.usda").unwrap();
        assert_eq!(graph.offline_marker(chair), Some(OFFLINE_MARKER));
        assert_eq!(graph.display_label("/show/chair.usda"), "chair.usda");
    }

    #[test]
    fn read_ascii_refuses_binary_names() {
        let dir = tempfile::tempdir().unwrap();
        let text = dir.path().join("layer.usda");
        std::fs::write(&text, "#usda 1.0\n").unwrap();
        let key = text.to_string_lossy().into_owned();

        let mut graph = DependencyGraph::new(key.clone());
        graph.insert_node(Node::new(key.clone(), NodeKind::Layer, true));
        graph.insert_node(Node::new("/show/model.usdc", NodeKind::Reference, false));

        assert_eq!(graph.read_ascii(&key).unwrap(), "#usda 1.0\n");
        assert!(graph.read_ascii("/show/model.usdc").is_err());
        assert!(graph.read_ascii("/nope.usda").is_err());
    }
}
