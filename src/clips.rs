//! Value clip sets and the sequence nodes synthesized from them.

use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;
use thiserror::Error;

use crate::resolver::AssetResolver;
use crate::sdf::{self, schema::FieldKey};
use crate::stage::PrimSpecRef;

/// Name of the clip set populated by the legacy `clip*` prim fields.
pub const DEFAULT_CLIP_SET: &str = "default";

static FRAME_NUMBER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").expect("valid frame number regex"));

/// Composed clip metadata for one clip set on a prim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipSet {
    pub name: String,
    /// Asset paths as authored, in list order.
    pub asset_paths: Vec<String>,
    pub manifest_asset_path: Option<String>,
    pub prim_path: Option<String>,
    /// Identifier of the layer holding the winning opinion, used to anchor the paths.
    pub anchor: String,
}

impl ClipSet {
    fn from_dictionary(name: &str, dict: &std::collections::HashMap<String, sdf::Value>, anchor: &str) -> Self {
        ClipSet {
            name: name.to_owned(),
            asset_paths: dict
                .get("assetPaths")
                .and_then(sdf::Value::as_asset_paths)
                .map(<[String]>::to_vec)
                .unwrap_or_default(),
            manifest_asset_path: dict
                .get("manifestAssetPath")
                .and_then(sdf::Value::as_str)
                .map(str::to_owned),
            prim_path: dict.get("primPath").and_then(sdf::Value::as_str).map(str::to_owned),
            anchor: anchor.to_owned(),
        }
    }

    fn from_legacy_fields(spec: &sdf::Spec, anchor: &str) -> Option<Self> {
        let asset_paths = spec.get(FieldKey::ClipAssetPaths).and_then(sdf::Value::as_asset_paths)?;
        Some(ClipSet {
            name: DEFAULT_CLIP_SET.to_owned(),
            asset_paths: asset_paths.to_vec(),
            manifest_asset_path: spec
                .get(FieldKey::ClipManifestAssetPath)
                .and_then(sdf::Value::as_str)
                .map(str::to_owned),
            prim_path: spec.get(FieldKey::ClipPrimPath).and_then(sdf::Value::as_str).map(str::to_owned),
            anchor: anchor.to_owned(),
        })
    }

    /// Clip sets of a prim stack, strongest opinion per set, sorted by set name.
    ///
    /// The `clips` dictionary takes precedence over the legacy fields for the
    /// `default` set.
    pub fn collect(stack: &[PrimSpecRef]) -> Vec<ClipSet> {
        let mut sets: BTreeMap<String, ClipSet> = BTreeMap::new();

        for spec_ref in stack {
            let Some(spec) = spec_ref.spec() else {
                continue;
            };
            let anchor = spec_ref.layer.identifier();

            if let Some(clips) = spec.get(FieldKey::Clips).and_then(sdf::Value::as_dictionary) {
                for (name, value) in clips {
                    if let Some(dict) = value.as_dictionary() {
                        sets.entry(name.clone())
                            .or_insert_with(|| ClipSet::from_dictionary(name, dict, anchor));
                    }
                }
            }
        }

        if !sets.contains_key(DEFAULT_CLIP_SET) {
            let legacy = stack
                .iter()
                .find_map(|spec_ref| ClipSet::from_legacy_fields(spec_ref.spec()?, spec_ref.layer.identifier()));
            if let Some(set) = legacy {
                sets.insert(DEFAULT_CLIP_SET.to_owned(), set);
            }
        }

        sets.into_values().collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClipError {
    #[error("clip set has no asset paths")]
    NoAssetPaths,
    #[error("no frame number in {0}")]
    NoFrameNumber(String),
}

/// A numbered clip sequence collapsed into a single dependency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipSequence {
    /// Synthesized name such as `shot.001-010.usd`.
    pub name: String,
    /// Every member file exists.
    pub online: bool,
    /// Resolved manifest, or the anchor layer when none is authored.
    pub source: String,
}

impl ClipSequence {
    pub fn from_clip_set(set: &ClipSet, resolver: &dyn AssetResolver) -> Result<Self, ClipError> {
        if set.asset_paths.is_empty() {
            return Err(ClipError::NoAssetPaths);
        }
        let name = frame_range_name(&set.asset_paths).ok_or_else(|| {
            let offending = set
                .asset_paths
                .iter()
                .find(|path| !FRAME_NUMBER.is_match(path))
                .unwrap_or(&set.asset_paths[0]);
            ClipError::NoFrameNumber(offending.clone())
        })?;

        let online = set
            .asset_paths
            .iter()
            .all(|path| resolver.exists(&resolver.resolve(&set.anchor, path)));

        let source = match set.manifest_asset_path.as_deref() {
            Some(manifest) if !manifest.is_empty() => resolver.resolve(&set.anchor, manifest),
            _ => set.anchor.clone(),
        };

        Ok(ClipSequence { name, online, source })
    }
}

/// Collapse the first and last path of a numbered sequence into one name.
///
/// The last digit run of the first path is replaced with `<first>-<last>`, where
/// `<last>` is the last digit run of the last path.
pub fn frame_range_name(paths: &[String]) -> Option<String> {
    let first = paths.first()?;
    let last = paths.last()?;
    let first_frame = FRAME_NUMBER.find_iter(first).last()?;
    let last_frame = FRAME_NUMBER.find_iter(last).last()?;

    Some(format!(
        "{}{}-{}{}",
        &first[..first_frame.start()],
        first_frame.as_str(),
        last_frame.as_str(),
        &first[first_frame.end()..]
    ))
}
