//! Offline asset cache.
//!
//! On install every asset in the manifest is fetched and stored under the
//! manifest's versioned cache name. If any fetch fails the install is
//! abandoned and logged. On activation every cache whose name is not in the
//! whitelist is deleted.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};

use crate::error::{Result, WalkError};

pub const CACHE_NAME: &str = "walkr-cache-v1";

pub const ASSETS: [&str; 5] = ["/", "/index.html", "/styles.css", "/script.js", "/map.html"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheManifest {
    pub name: String,
    pub assets: Vec<String>,
    pub whitelist: Vec<String>,
}

impl Default for CacheManifest {
    fn default() -> Self {
        Self {
            name: CACHE_NAME.to_string(),
            assets: ASSETS.iter().map(|s| s.to_string()).collect(),
            whitelist: vec![CACHE_NAME.to_string()],
        }
    }
}

pub trait AssetFetcher {
    fn fetch(&self, path: &str) -> Result<Vec<u8>>;
}

pub trait CacheStorage {
    fn cache_names(&self) -> Result<Vec<String>>;
    fn put(&self, cache: &str, path: &str, body: &[u8]) -> Result<()>;
    fn get(&self, cache: &str, path: &str) -> Result<Option<Vec<u8>>>;
    fn delete(&self, cache: &str) -> Result<()>;
}

/// Serves assets from a local directory; `/` maps to `index.html`
#[derive(Debug, Clone)]
pub struct DirFetcher {
    root: PathBuf,
}

impl DirFetcher {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }
}

impl AssetFetcher for DirFetcher {
    fn fetch(&self, path: &str) -> Result<Vec<u8>> {
        let file = self.root.join(asset_file_name(path));
        fs::read(&file).map_err(|e| WalkError::AssetFetch {
            path: path.to_string(),
            reason: e.to_string(),
        })
    }
}

/// One directory per cache, one file per asset
#[derive(Debug, Clone)]
pub struct FsCacheStorage {
    root: PathBuf,
}

impl FsCacheStorage {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }
}

impl CacheStorage for FsCacheStorage {
    fn cache_names(&self) -> Result<Vec<String>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    fn put(&self, cache: &str, path: &str, body: &[u8]) -> Result<()> {
        let dir = self.root.join(cache);
        fs::create_dir_all(&dir)?;
        fs::write(dir.join(asset_file_name(path)), body)?;
        Ok(())
    }

    fn get(&self, cache: &str, path: &str) -> Result<Option<Vec<u8>>> {
        let file = self.root.join(cache).join(asset_file_name(path));
        if file.exists() {
            Ok(Some(fs::read(file)?))
        } else {
            Ok(None)
        }
    }

    fn delete(&self, cache: &str) -> Result<()> {
        fs::remove_dir_all(self.root.join(cache))?;
        Ok(())
    }
}

fn asset_file_name(path: &str) -> String {
    match path.trim_start_matches('/') {
        "" => "index.html".to_string(),
        rest => rest.replace('/', "__"),
    }
}

/// Fetch every asset first, then store them; a failed fetch stores nothing
pub fn install(
    manifest: &CacheManifest,
    fetcher: &dyn AssetFetcher,
    storage: &dyn CacheStorage,
) -> Result<()> {
    info!(cache = %manifest.name, "installing offline cache");

    let fetched = manifest
        .assets
        .iter()
        .map(|path| fetcher.fetch(path).map(|body| (path, body)))
        .collect::<Result<Vec<_>>>()
        .map_err(|e| {
            error!("offline cache install failed: {e}");
            e
        })?;

    for (path, body) in fetched {
        storage.put(&manifest.name, path, &body)?;
    }
    Ok(())
}

/// Delete every cache outside the whitelist; returns the deleted names
pub fn activate(manifest: &CacheManifest, storage: &dyn CacheStorage) -> Result<Vec<String>> {
    let mut purged = Vec::new();
    for name in storage.cache_names()? {
        if !manifest.whitelist.contains(&name) {
            info!(cache = %name, "deleting stale cache");
            storage.delete(&name)?;
            purged.push(name);
        }
    }
    Ok(purged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use tempfile::tempdir;

    fn site(dir: &Path) {
        for (name, body) in [
            ("index.html", "<html>"),
            ("styles.css", "body{}"),
            ("script.js", "main()"),
            ("map.html", "<map>"),
        ] {
            fs::write(dir.join(name), body).unwrap();
        }
    }

    #[test]
    fn test_asset_file_name() {
        assert_eq!(asset_file_name("/"), "index.html");
        assert_eq!(asset_file_name("/styles.css"), "styles.css");
        assert_eq!(asset_file_name("/img/logo.png"), "img__logo.png");
    }

    #[test]
    fn test_install_caches_every_asset() {
        let src = tempdir().unwrap();
        let cache = tempdir().unwrap();
        site(src.path());

        let storage = FsCacheStorage::new(cache.path());
        install(
            &CacheManifest::default(),
            &DirFetcher::new(src.path()),
            &storage,
        )
        .unwrap();

        assert_eq!(storage.cache_names().unwrap(), vec![CACHE_NAME]);
        assert_eq!(
            storage.get(CACHE_NAME, "/script.js").unwrap().as_deref(),
            Some("main()".as_bytes())
        );
    }

    #[test]
    fn test_failed_fetch_stores_nothing() {
        let src = tempdir().unwrap();
        let cache = tempdir().unwrap();
        fs::write(src.path().join("index.html"), "<html>").unwrap();

        let storage = FsCacheStorage::new(cache.path());
        let result = install(
            &CacheManifest::default(),
            &DirFetcher::new(src.path()),
            &storage,
        );

        assert_matches!(result, Err(WalkError::AssetFetch { .. }));
        assert!(storage.cache_names().unwrap().is_empty());
    }

    #[test]
    fn test_activate_purges_only_stale_caches() {
        let cache = tempdir().unwrap();
        let storage = FsCacheStorage::new(cache.path());
        storage.put("my-cache", "/", b"old").unwrap();
        storage.put("walkr-cache-v0", "/", b"older").unwrap();
        storage.put(CACHE_NAME, "/", b"current").unwrap();

        let purged = activate(&CacheManifest::default(), &storage).unwrap();
        assert_eq!(purged, vec!["my-cache", "walkr-cache-v0"]);
        assert_eq!(storage.cache_names().unwrap(), vec![CACHE_NAME]);
    }

    #[test]
    fn test_activate_on_empty_root() {
        let cache = tempdir().unwrap();
        let storage = FsCacheStorage::new(cache.path().join("missing"));
        assert!(activate(&CacheManifest::default(), &storage).unwrap().is_empty());
    }
}
