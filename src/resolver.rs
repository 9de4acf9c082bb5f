//! Asset path resolution anchored to the layer that authored the path.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::layer::identifier_for;

/// Environment variable holding default search paths, in the platform path-list format.
pub const SEARCH_PATH_ENV: &str = "PXR_AR_DEFAULT_SEARCH_PATH";

pub trait AssetResolver {
    /// Resolve `asset_path` relative to the layer identified by `anchor`.
    ///
    /// Never fails: an unresolvable path yields a best-effort absolute path.
    fn resolve(&self, anchor: &str, asset_path: &str) -> String;

    /// Whether `path` currently exists as a file.
    fn exists(&self, path: &str) -> bool;
}

/// Search locations used for paths that are neither absolute nor `./`/`../` relative.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolverContext {
    pub search_paths: Vec<PathBuf>,
}

impl ResolverContext {
    pub fn new(search_paths: Vec<PathBuf>) -> Self {
        Self { search_paths }
    }

    pub fn from_env() -> Self {
        let search_paths = std::env::var_os(SEARCH_PATH_ENV)
            .map(|value| std::env::split_paths(&value).filter(|p| !p.as_os_str().is_empty()).collect())
            .unwrap_or_default();
        Self { search_paths }
    }
}

/// File system resolver bound to a [`ResolverContext`].
#[derive(Debug, Clone, Default)]
pub struct DefaultResolver {
    context: ResolverContext,
}

impl DefaultResolver {
    pub fn new(context: ResolverContext) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &ResolverContext {
        &self.context
    }

    fn is_file_relative(asset_path: &str) -> bool {
        asset_path == "."
            || asset_path == ".."
            || asset_path.starts_with("./")
            || asset_path.starts_with("../")
            || asset_path.starts_with(".\\")
            || asset_path.starts_with("..\\")
    }
}

impl AssetResolver for DefaultResolver {
    fn resolve(&self, anchor: &str, asset_path: &str) -> String {
        if asset_path.is_empty() {
            return anchor.to_owned();
        }

        let asset = Path::new(asset_path);
        if asset.is_absolute() {
            return identifier_for(asset);
        }

        let anchor_dir = Path::new(anchor).parent().unwrap_or_else(|| Path::new("/"));
        let anchored = identifier_for(anchor_dir.join(asset));
        if Self::is_file_relative(asset_path) || self.exists(&anchored) {
            return anchored;
        }

        self.context
            .search_paths
            .iter()
            .map(|dir| identifier_for(dir.join(asset)))
            .find(|candidate| self.exists(candidate))
            .unwrap_or(anchored)
    }

    fn exists(&self, path: &str) -> bool {
        Path::new(path).is_file()
    }
}

/// Memoizes another resolver for the duration of a walk.
#[derive(Debug, Default)]
pub struct CachingResolver<R> {
    inner: R,
    resolved: RefCell<HashMap<(String, String), String>>,
    existing: RefCell<HashMap<String, bool>>,
}

impl<R: AssetResolver> CachingResolver<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            resolved: RefCell::default(),
            existing: RefCell::default(),
        }
    }

    pub fn inner(&self) -> &R {
        &self.inner
    }

    /// Forget everything, e.g. before walking again after files changed.
    pub fn clear(&self) {
        self.resolved.borrow_mut().clear();
        self.existing.borrow_mut().clear();
    }
}

impl<R: AssetResolver> AssetResolver for CachingResolver<R> {
    fn resolve(&self, anchor: &str, asset_path: &str) -> String {
        let key = (anchor.to_owned(), asset_path.to_owned());
        if let Some(hit) = self.resolved.borrow().get(&key) {
            return hit.clone();
        }
        let resolved = self.inner.resolve(anchor, asset_path);
        self.resolved.borrow_mut().insert(key, resolved.clone());
        resolved
    }

    fn exists(&self, path: &str) -> bool {
        if let Some(hit) = self.existing.borrow().get(path) {
            return *hit;
        }
        let exists = self.inner.exists(path);
        self.existing.borrow_mut().insert(path.to_owned(), exists);
        exists
    }
}

impl<T: AssetResolver + ?Sized> AssetResolver for &T {
    fn resolve(&self, anchor: &str, asset_path: &str) -> String {
        (**self).resolve(anchor, asset_path)
    }

    fn exists(&self, path: &str) -> bool {
        (**self).exists(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::cell::Cell;
    use std::fs;

    #[rstest]
    #[case("/show/shot/shot.usda", "../geo/model.usd", "/show/geo/model.usd")]
    #[case("/show/shot/shot.usda", "./anim.usda", "/show/shot/anim.usda")]
    #[case("/show/shot/shot.usda", "/lib/chair.usd", "/lib/chair.usd")]
    #[case("/show/shot/shot.usda", "/lib/./props/../chair.usd", "/lib/chair.usd")]
    #[case("/show/shot/shot.usda", "", "/show/shot/shot.usda")]
    #[case("/show/shot/shot.usda", "cache/sim.usd", "/show/shot/cache/sim.usd")]
    #[case("/show/shot.usda", "../../x.usd", "/x.usd")]
    #[case("/show/shot.usda", "/x.usd", "/x.usd")]
    fn anchors_relative_paths(#[case] anchor: &str, #[case] asset: &str, #[case] expected: &str) {
        let resolver = DefaultResolver::default();
        assert_eq!(resolver.resolve(anchor, asset), expected);
    }

    #[test]
    fn search_paths_apply_to_search_relative_assets_only() {
        let library = tempfile::tempdir().unwrap();
        fs::create_dir_all(library.path().join("props")).unwrap();
        fs::write(library.path().join("props/chair.usda"), "#usda 1.0\n").unwrap();

        let resolver = DefaultResolver::new(ResolverContext::new(vec![library.path().to_path_buf()]));
        let found = resolver.resolve("/show/shot/shot.usda", "props/chair.usda");
        assert_eq!(found, identifier_for(library.path().join("props/chair.usda")));
        assert!(resolver.exists(&found));

        // Explicitly relative paths never consult the search paths.
        let anchored = resolver.resolve("/show/shot/shot.usda", "./props/chair.usda");
        assert_eq!(anchored, "/show/shot/props/chair.usda");
        assert!(!resolver.exists(&anchored));
    }

    struct CountingResolver {
        calls: Cell<usize>,
    }

    impl AssetResolver for CountingResolver {
        fn resolve(&self, _anchor: &str, asset_path: &str) -> String {
            self.calls.set(self.calls.get() + 1);
            format!("/resolved/{asset_path}")
        }

        fn exists(&self, _path: &str) -> bool {
            self.calls.set(self.calls.get() + 1);
            true
        }
    }

    #[test]
    fn caching_resolver_calls_through_once() {
        let resolver = CachingResolver::new(CountingResolver { calls: Cell::new(0) });
        for _ in 0..3 {
            assert_eq!(resolver.resolve("/a.usda", "b.usda"), "/resolved/b.usda");
            assert!(resolver.exists("/resolved/b.usda"));
        }
        assert_eq!(resolver.inner().calls.get(), 2);

        resolver.clear();
        resolver.resolve("/a.usda", "b.usda");
        assert_eq!(resolver.inner().calls.get(), 3);
    }
}
