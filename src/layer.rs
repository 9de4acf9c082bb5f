//! File-backed layers and the per-walk layer registry.

use anyhow::{Context, Result};
use std::collections::{HashMap, HashSet};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use crate::sdf::{self, schema::ChildrenKey, schema::FieldKey};
use crate::usda::TextReader;

/// Lexically normalize a path, anchoring relative paths at the current directory.
///
/// `.` components are dropped and `..` pops the previous component. Symlinks are not followed.
pub fn normalize_path(path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };

    let mut out = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                // Popping past the root is a no-op, like `os.path.normpath("/..")`.
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}

/// Normalized identifier string for a path.
pub fn identifier_for(path: impl AsRef<Path>) -> String {
    normalize_path(path).to_string_lossy().into_owned()
}

/// A single parsed text layer.
#[derive(Debug)]
pub struct Layer {
    identifier: String,
    real_path: PathBuf,
    specs: HashMap<sdf::Path, sdf::Spec>,
}

impl Layer {
    /// Read a layer from disk. The identifier is the normalized absolute path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let real_path = normalize_path(path);
        let reader = TextReader::read(&real_path)
            .with_context(|| format!("Unable to open layer {}", real_path.display()))?;
        Ok(Layer {
            identifier: real_path.to_string_lossy().into_owned(),
            real_path,
            specs: reader.into_specs(),
        })
    }

    /// Parse layer text that is not backed by a file read.
    pub fn from_str(identifier: &str, text: &str) -> Result<Self> {
        let reader = TextReader::from_str(text).with_context(|| format!("Unable to parse layer {identifier}"))?;
        Ok(Layer {
            identifier: identifier.to_owned(),
            real_path: PathBuf::from(identifier),
            specs: reader.into_specs(),
        })
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn real_path(&self) -> &Path {
        &self.real_path
    }

    /// Directory relative layer paths are joined against.
    pub fn base_dir(&self) -> &Path {
        self.real_path.parent().unwrap_or_else(|| Path::new("/"))
    }

    pub fn spec(&self, path: &sdf::Path) -> Option<&sdf::Spec> {
        self.specs.get(path)
    }

    /// Prim or variant spec at `path`.
    pub fn prim_spec(&self, path: &sdf::Path) -> Option<&sdf::Spec> {
        self.spec(path).filter(|spec| spec.is_prim_like())
    }

    fn pseudo_root(&self) -> Option<&sdf::Spec> {
        self.specs.get(&sdf::Path::abs_root())
    }

    /// Sublayer paths as authored, strongest first.
    pub fn sublayer_paths(&self) -> &[String] {
        self.pseudo_root()
            .and_then(|root| root.get(FieldKey::SubLayers))
            .and_then(sdf::Value::as_string_vec)
            .unwrap_or_default()
    }

    pub fn default_prim(&self) -> Option<&str> {
        self.pseudo_root()
            .and_then(|root| root.get(FieldKey::DefaultPrim))
            .and_then(sdf::Value::as_str)
            .filter(|name| !name.is_empty())
    }

    /// Root prim names in authored order.
    pub fn root_prims(&self) -> &[String] {
        self.pseudo_root()
            .map(|root| root.children(ChildrenKey::PrimChildren))
            .unwrap_or_default()
    }

    /// Variant set names authored on the prim at `path`.
    pub fn variant_sets(&self, path: &sdf::Path) -> &[String] {
        self.prim_spec(path)
            .map(|spec| spec.children(ChildrenKey::VariantSetChildren))
            .unwrap_or_default()
    }

    /// Variant names of `set` on the prim at `path`.
    pub fn variants(&self, path: &sdf::Path, set: &str) -> &[String] {
        path.append_variant_set(set)
            .ok()
            .and_then(|set_path| self.specs.get(&set_path))
            .map(|spec| spec.children(ChildrenKey::VariantChildren))
            .unwrap_or_default()
    }

    /// Asset paths of every reference and payload authored in this layer, sublayers excluded.
    ///
    /// Paths are visited in spec path order and de-duplicated. An empty asset path
    /// (internal arc) is kept once so callers can skip it.
    pub fn external_references(&self) -> Vec<String> {
        let mut paths: Vec<&sdf::Path> = self
            .specs
            .iter()
            .filter(|(_, spec)| spec.is_prim_like())
            .map(|(path, _)| path)
            .collect();
        paths.sort();

        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for path in paths {
            let spec = &self.specs[path];

            let references = spec
                .get(FieldKey::References)
                .and_then(sdf::Value::as_reference_list_op)
                .into_iter()
                .flat_map(|op| op.edit_items().map(|(_, item)| item.asset_path.as_str()));
            let payloads = spec
                .get(FieldKey::Payload)
                .and_then(sdf::Value::as_payload_list_op)
                .into_iter()
                .flat_map(|op| op.edit_items().map(|(_, item)| item.asset_path.as_str()));

            for asset in references.chain(payloads) {
                if seen.insert(asset) {
                    out.push(asset.to_owned());
                }
            }
        }
        out
    }
}

/// Per-walk cache of opened layers keyed by identifier.
///
/// Each file is parsed at most once per walk. Failures are remembered with their reason.
#[derive(Debug, Default)]
pub struct LayerRegistry {
    layers: HashMap<String, std::result::Result<Arc<Layer>, String>>,
}

impl LayerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the layer for `identifier`, opening it on first request.
    pub fn find_or_open(&mut self, identifier: &str) -> Option<Arc<Layer>> {
        let entry = self
            .layers
            .entry(identifier.to_owned())
            .or_insert_with(|| match Layer::open(identifier) {
                Ok(layer) => Ok(Arc::new(layer)),
                Err(err) => {
                    log::debug!(target: "usd_depgraph", "layer {identifier} unavailable: {err:#}");
                    Err(format!("{err:#}"))
                }
            });
        entry.as_ref().ok().cloned()
    }

    /// Layer already opened during this walk, without touching the file system.
    pub fn find(&self, identifier: &str) -> Option<Arc<Layer>> {
        self.layers.get(identifier).and_then(|entry| entry.as_ref().ok().cloned())
    }

    /// Why `identifier` could not be opened, if an attempt failed.
    pub fn failure(&self, identifier: &str) -> Option<&str> {
        self.layers
            .get(identifier)
            .and_then(|entry| entry.as_ref().err())
            .map(String::as_str)
    }

    /// Register an in-memory layer so later lookups find it.
    pub fn insert(&mut self, layer: Layer) -> Arc<Layer> {
        let layer = Arc::new(layer);
        self.layers.insert(layer.identifier().to_owned(), Ok(layer.clone()));
        layer
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}
