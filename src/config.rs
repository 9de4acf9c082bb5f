//! Walk options, loadable from TOML and overridable from the environment.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::resolver::ResolverContext;

/// Set to anything but `0` or `false` to disable connectivity repair.
pub const NO_REPAIR_ENV: &str = "USD_DEPGRAPH_NO_REPAIR";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WalkOptions {
    /// Layer identifiers (or authored paths) to treat as muted.
    pub muted_layers: Vec<String>,
    /// Directories consulted for search-relative asset paths.
    pub search_paths: Vec<PathBuf>,
    /// Attach loose nodes to the layer that discovered them.
    pub repair_connectivity: bool,
    /// Memoize resolution and existence checks within a walk.
    pub cache_resolution: bool,
    /// Nesting limit when following composition arcs for one prim.
    pub max_namespace_depth: usize,
}

impl Default for WalkOptions {
    fn default() -> Self {
        Self {
            muted_layers: Vec::new(),
            search_paths: Vec::new(),
            repair_connectivity: true,
            cache_resolution: true,
            max_namespace_depth: 256,
        }
    }
}

impl WalkOptions {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
        toml::from_str(&contents).with_context(|| format!("failed to parse {}", path.display()))
    }

    /// Append search paths from the environment and honour the repair switch.
    pub fn apply_env_overrides(&mut self) {
        for dir in ResolverContext::from_env().search_paths {
            if !self.search_paths.contains(&dir) {
                self.search_paths.push(dir);
            }
        }

        if let Ok(value) = std::env::var(NO_REPAIR_ENV) {
            if !matches!(value.trim(), "" | "0" | "false") {
                self.repair_connectivity = false;
            }
        }
    }

    pub fn resolver_context(&self) -> ResolverContext {
        ResolverContext::new(self.search_paths.clone())
    }

    pub fn with_muted(mut self, identifier: impl Into<String>) -> Self {
        self.muted_layers.push(identifier.into());
        self
    }

    pub fn with_search_path(mut self, dir: impl Into<PathBuf>) -> Self {
        self.search_paths.push(dir.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_enable_repair_and_caching() {
        let options = WalkOptions::default();
        assert!(options.repair_connectivity);
        assert!(options.cache_resolution);
        assert_eq!(options.max_namespace_depth, 256);
    }

    #[test]
    fn load_partial_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("depgraph.toml");
        fs::write(
            &path,
            r#"
muted_layers = ["/show/anim.usda"]
search_paths = ["/library"]
repair_connectivity = false
"#,
        )
        .unwrap();

        let options = WalkOptions::load(&path).unwrap();
        assert_eq!(options.muted_layers, vec!["/show/anim.usda".to_owned()]);
        assert_eq!(options.search_paths, vec![PathBuf::from("/library")]);
        assert!(!options.repair_connectivity);
        assert!(options.cache_resolution);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("depgraph.toml");
        fs::write(&path, "mute = true\n").unwrap();
        assert!(WalkOptions::load(&path).is_err());
    }
}
