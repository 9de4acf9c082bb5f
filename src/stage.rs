//! Composed stage.
//!
//! Prims are indexed in LIVRPS strength order for every contributing site:
//! - **L**ocal opinions across the layer stack (sublayers are flattened first)
//! - **I**nherits
//! - **V**ariant sets, using the strongest selection
//! - **R**eferences
//! - **P**ayloads (always loaded)
//! - **S**pecializes
//!
//! The result is a prim stack per prim, strongest spec first, which is all the
//! dependency walk needs.

use anyhow::{anyhow, Result};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use crate::clips::ClipSet;
use crate::config::WalkOptions;
use crate::error::WalkError;
use crate::layer::{identifier_for, Layer, LayerRegistry};
use crate::resolver::{AssetResolver, DefaultResolver};
use crate::sdf::{self, schema::ChildrenKey, schema::FieldKey};

/// One spec contributing to a composed prim.
#[derive(Debug, Clone)]
pub struct PrimSpecRef {
    pub layer: Arc<Layer>,
    pub path: sdf::Path,
}

impl PrimSpecRef {
    pub fn spec(&self) -> Option<&sdf::Spec> {
        self.layer.prim_spec(&self.path)
    }

    pub fn layer_identifier(&self) -> &str {
        self.layer.identifier()
    }
}

/// A composed prim and its prim stack, strongest first.
#[derive(Debug, Clone)]
pub struct Prim {
    pub path: sdf::Path,
    pub stack: Vec<PrimSpecRef>,
}

impl Prim {
    pub fn name(&self) -> &str {
        self.path.name()
    }

    pub fn clip_sets(&self) -> Vec<ClipSet> {
        ClipSet::collect(&self.stack)
    }
}

/// A composition arc that could not be followed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedArc {
    pub prim: sdf::Path,
    pub asset_path: String,
    pub reason: String,
}

/// Root layer plus its sublayers, strongest first.
#[derive(Debug)]
struct LayerStack {
    layers: Vec<Arc<Layer>>,
}

impl LayerStack {
    fn identifier(&self) -> &str {
        self.layers.first().map(|layer| layer.identifier()).unwrap_or_default()
    }

    fn root(&self) -> Option<&Arc<Layer>> {
        self.layers.first()
    }
}

/// A path within a layer stack contributing opinions to a prim.
#[derive(Debug, Clone)]
struct Site {
    stack: Arc<LayerStack>,
    path: sdf::Path,
}

#[derive(Debug)]
pub struct Stage {
    root_layer: Arc<Layer>,
    layer_stack: Arc<LayerStack>,
    muted: HashSet<String>,
    prims: Vec<Prim>,
    skipped_arcs: Vec<SkippedArc>,
}

impl Stage {
    /// Open and compose `root` with a resolver built from `options`.
    pub fn open(root: impl AsRef<Path>, options: &WalkOptions) -> Result<Self, WalkError> {
        let resolver = DefaultResolver::new(options.resolver_context());
        let mut registry = LayerRegistry::new();
        Self::open_with(root, options, &resolver, &mut registry)
    }

    /// Open and compose `root`, sharing an existing resolver and layer registry.
    pub fn open_with(
        root: impl AsRef<Path>,
        options: &WalkOptions,
        resolver: &dyn AssetResolver,
        registry: &mut LayerRegistry,
    ) -> Result<Self, WalkError> {
        let root = root.as_ref();
        let identifier = identifier_for(root);
        let root_layer = registry.find_or_open(&identifier).ok_or_else(|| {
            let reason = registry.failure(&identifier).unwrap_or("unable to open layer");
            WalkError::open(root, anyhow!("{reason}"))
        })?;

        let muted: HashSet<String> = options
            .muted_layers
            .iter()
            .flat_map(|entry| [entry.clone(), identifier_for(entry)])
            .collect();

        let mut composer = Composer {
            resolver,
            registry,
            muted: &muted,
            max_depth: options.max_namespace_depth,
            stacks: HashMap::new(),
            skipped: Vec::new(),
        };

        let layer_stack = composer.layer_stack(root_layer.clone());
        let pseudo_root = Site {
            stack: layer_stack.clone(),
            path: sdf::Path::abs_root(),
        };
        let mut prims = Vec::new();
        composer
            .compose_children(&sdf::Path::abs_root(), &[pseudo_root], &mut prims)
            .map_err(|err| WalkError::Internal(format!("{err:#}")))?;
        let skipped_arcs = composer.skipped;

        Ok(Stage {
            root_layer,
            layer_stack,
            muted,
            prims,
            skipped_arcs,
        })
    }

    pub fn root_layer(&self) -> &Arc<Layer> {
        &self.root_layer
    }

    /// Layers of the root layer stack, strongest first. Muted layers are absent.
    pub fn layer_stack(&self) -> &[Arc<Layer>] {
        &self.layer_stack.layers
    }

    /// Whether a layer is muted, by authored path or normalized identifier.
    pub fn is_layer_muted(&self, path: &str) -> bool {
        !path.is_empty() && (self.muted.contains(path) || self.muted.contains(&identifier_for(path)))
    }

    /// Every composed prim in depth-first order, inactive and abstract prims included.
    pub fn traverse_all(&self) -> &[Prim] {
        &self.prims
    }

    pub fn prim(&self, path: &sdf::Path) -> Option<&Prim> {
        self.prims.iter().find(|prim| &prim.path == path)
    }

    pub fn skipped_arcs(&self) -> &[SkippedArc] {
        &self.skipped_arcs
    }
}

/// Composition state for one stage open.
struct Composer<'a> {
    resolver: &'a dyn AssetResolver,
    registry: &'a mut LayerRegistry,
    muted: &'a HashSet<String>,
    max_depth: usize,
    stacks: HashMap<String, Arc<LayerStack>>,
    skipped: Vec<SkippedArc>,
}

impl Composer<'_> {
    fn is_muted(&self, authored: &str, identifier: &str) -> bool {
        self.muted.contains(authored) || self.muted.contains(identifier)
    }

    fn layer_stack(&mut self, root: Arc<Layer>) -> Arc<LayerStack> {
        if let Some(stack) = self.stacks.get(root.identifier()) {
            return stack.clone();
        }

        let mut layers = Vec::new();
        let mut visited = HashSet::new();
        self.collect_sublayers(root.clone(), &mut layers, &mut visited);

        let stack = Arc::new(LayerStack { layers });
        self.stacks.insert(root.identifier().to_owned(), stack.clone());
        stack
    }

    fn collect_sublayers(&mut self, layer: Arc<Layer>, layers: &mut Vec<Arc<Layer>>, visited: &mut HashSet<String>) {
        if !visited.insert(layer.identifier().to_owned()) {
            return;
        }
        layers.push(layer.clone());

        for authored in layer.sublayer_paths() {
            if authored.is_empty() {
                continue;
            }
            let identifier = identifier_for(layer.base_dir().join(authored));
            if self.is_muted(authored, &identifier) {
                continue;
            }
            if let Some(sublayer) = self.registry.find_or_open(&identifier) {
                self.collect_sublayers(sublayer, layers, visited);
            }
        }
    }

    /// Compose the namespace children of a prim given its contributing sites.
    fn compose_children(&mut self, parent: &sdf::Path, parent_sites: &[Site], out: &mut Vec<Prim>) -> Result<()> {
        let mut names: Vec<String> = Vec::new();
        for site in parent_sites {
            for layer in &site.stack.layers {
                let Some(spec) = layer.spec(&site.path) else {
                    continue;
                };
                for name in spec.children(ChildrenKey::PrimChildren) {
                    if !names.contains(name) {
                        names.push(name.clone());
                    }
                }
            }
        }

        for name in names {
            let prim_path = parent.append_path(&name)?;
            let mut initial = Vec::with_capacity(parent_sites.len());
            for site in parent_sites {
                initial.push(Site {
                    stack: site.stack.clone(),
                    path: site.path.append_path(&name)?,
                });
            }

            let sites = self.index_prim(&prim_path, initial);
            let stack = prim_stack(&sites);
            if stack.is_empty() {
                continue;
            }

            out.push(Prim {
                path: prim_path.clone(),
                stack,
            });
            self.compose_children(&prim_path, &sites, out)?;
        }
        Ok(())
    }

    /// Expand the initial sites of a prim into every contributing site, strongest first.
    fn index_prim(&mut self, prim: &sdf::Path, initial: Vec<Site>) -> Vec<Site> {
        let mut visited = HashSet::new();
        let mut sites = Vec::new();
        for site in initial {
            self.expand(prim, site, 0, &mut visited, &mut sites);
        }
        sites
    }

    fn expand(
        &mut self,
        prim: &sdf::Path,
        site: Site,
        depth: usize,
        visited: &mut HashSet<(String, sdf::Path)>,
        sites: &mut Vec<Site>,
    ) {
        if depth > self.max_depth {
            self.skip(prim, site.path.as_str(), "composition depth limit reached");
            return;
        }
        if !visited.insert((site.stack.identifier().to_owned(), site.path.clone())) {
            return;
        }
        sites.push(site.clone());

        let stack = site.stack.clone();
        let specs: Vec<(&Arc<Layer>, &sdf::Spec)> = stack
            .layers
            .iter()
            .filter_map(|layer| layer.prim_spec(&site.path).map(|spec| (layer, spec)))
            .collect();
        if specs.is_empty() {
            return;
        }

        for path in composed_paths(&specs, FieldKey::InheritPaths) {
            self.expand_internal(prim, &stack, path, depth, visited, sites);
        }

        for set in variant_set_names(&specs) {
            let Some(selection) = variant_selection(sites.as_slice(), &set) else {
                continue;
            };
            if let Ok(path) = site.path.append_variant_selection(&set, &selection) {
                let target = Site {
                    stack: stack.clone(),
                    path,
                };
                self.expand(prim, target, depth + 1, visited, sites);
            }
        }

        let mut seen = HashSet::new();
        for (layer, spec) in &specs {
            let Some(references) = spec.get(FieldKey::References).and_then(sdf::Value::as_reference_list_op) else {
                continue;
            };
            for reference in references.composed_items() {
                if seen.insert((reference.asset_path.as_str(), &reference.prim_path)) {
                    self.follow_arc(prim, &stack, layer, &reference.asset_path, &reference.prim_path, depth, visited, sites);
                }
            }
        }

        let mut seen = HashSet::new();
        for (layer, spec) in &specs {
            let Some(payloads) = spec.get(FieldKey::Payload).and_then(sdf::Value::as_payload_list_op) else {
                continue;
            };
            for payload in payloads.composed_items() {
                if seen.insert((payload.asset_path.as_str(), &payload.prim_path)) {
                    self.follow_arc(prim, &stack, layer, &payload.asset_path, &payload.prim_path, depth, visited, sites);
                }
            }
        }

        for path in composed_paths(&specs, FieldKey::Specializes) {
            self.expand_internal(prim, &stack, path, depth, visited, sites);
        }
    }

    fn expand_internal(
        &mut self,
        prim: &sdf::Path,
        stack: &Arc<LayerStack>,
        path: sdf::Path,
        depth: usize,
        visited: &mut HashSet<(String, sdf::Path)>,
        sites: &mut Vec<Site>,
    ) {
        let target = Site {
            stack: stack.clone(),
            path,
        };
        self.expand(prim, target, depth + 1, visited, sites);
    }

    /// Follow a reference or payload authored in `anchor`.
    #[allow(clippy::too_many_arguments)]
    fn follow_arc(
        &mut self,
        prim: &sdf::Path,
        stack: &Arc<LayerStack>,
        anchor: &Layer,
        asset_path: &str,
        target_prim: &sdf::Path,
        depth: usize,
        visited: &mut HashSet<(String, sdf::Path)>,
        sites: &mut Vec<Site>,
    ) {
        let target_stack = if asset_path.is_empty() {
            stack.clone()
        } else {
            let identifier = self.resolver.resolve(anchor.identifier(), asset_path);
            if self.is_muted(asset_path, &identifier) {
                self.skip(prim, asset_path, "layer is muted");
                return;
            }
            let Some(layer) = self.registry.find_or_open(&identifier) else {
                let reason = self
                    .registry
                    .failure(&identifier)
                    .unwrap_or("unable to open layer")
                    .to_owned();
                self.skip(prim, asset_path, &reason);
                return;
            };
            self.layer_stack(layer)
        };

        let path = if target_prim.is_empty() {
            let default_prim = target_stack
                .root()
                .and_then(|layer| layer.default_prim())
                .and_then(|name| sdf::Path::abs_root().append_path(name).ok());
            match default_prim {
                Some(path) => path,
                None => {
                    self.skip(prim, asset_path, "no prim path and no defaultPrim");
                    return;
                }
            }
        } else {
            target_prim.clone()
        };

        let target = Site {
            stack: target_stack,
            path,
        };
        self.expand(prim, target, depth + 1, visited, sites);
    }

    fn skip(&mut self, prim: &sdf::Path, asset_path: &str, reason: &str) {
        let skipped = SkippedArc {
            prim: prim.clone(),
            asset_path: asset_path.to_owned(),
            reason: reason.to_owned(),
        };
        if !self.skipped.contains(&skipped) {
            self.skipped.push(skipped);
        }
    }
}

/// Specs of every site in order, each `(layer, path)` pair once.
fn prim_stack(sites: &[Site]) -> Vec<PrimSpecRef> {
    let mut seen = HashSet::new();
    let mut stack = Vec::new();
    for site in sites {
        for layer in &site.stack.layers {
            if layer.prim_spec(&site.path).is_some() && seen.insert((layer.identifier().to_owned(), site.path.clone())) {
                stack.push(PrimSpecRef {
                    layer: layer.clone(),
                    path: site.path.clone(),
                });
            }
        }
    }
    stack
}

/// Union of a path list op field across specs, strongest first.
fn composed_paths(specs: &[(&Arc<Layer>, &sdf::Spec)], key: FieldKey) -> Vec<sdf::Path> {
    let mut paths: Vec<sdf::Path> = Vec::new();
    for (_, spec) in specs {
        if let Some(op) = spec.get(key).and_then(sdf::Value::as_path_list_op) {
            for path in op.composed_items() {
                if !path.is_empty() && !paths.contains(path) {
                    paths.push(path.clone());
                }
            }
        }
    }
    paths
}

fn variant_set_names(specs: &[(&Arc<Layer>, &sdf::Spec)]) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for (_, spec) in specs {
        let listed: Vec<String> = match spec.get(FieldKey::VariantSetNames) {
            Some(sdf::Value::StringListOp(op)) => op.composed_items().into_iter().cloned().collect(),
            _ => Vec::new(),
        };
        for name in listed.iter().chain(spec.children(ChildrenKey::VariantSetChildren)) {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
    }
    names
}

/// Strongest selection for `set` among the sites gathered so far.
fn variant_selection(sites: &[Site], set: &str) -> Option<String> {
    sites
        .iter()
        .flat_map(|site| site.stack.layers.iter().filter_map(|layer| layer.prim_spec(&site.path)))
        .filter_map(|spec| spec.get(FieldKey::VariantSelection).and_then(sdf::Value::as_variant_selection))
        .find_map(|selections| selections.get(set))
        .filter(|selection| !selection.is_empty())
        .cloned()
}
