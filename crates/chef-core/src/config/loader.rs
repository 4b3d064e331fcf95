//! Manifest discovery across search directories

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use super::manifest::ClusterManifest;
use crate::error::Result;
use crate::registry::ClusterRegistry;

/// Finds and loads cluster manifests
///
/// Every `*.toml` file directly inside a search directory is one cluster.
/// Directories are searched in order:
/// 1. The explicit directories given to [`ManifestLoader::new`]
/// 2. Global clusters (`<config_dir>/cluster-chef/clusters/`)
///
/// When two files declare the same cluster (case-insensitive), the first
/// one found wins.
#[derive(Debug, Clone)]
pub struct ManifestLoader {
    dirs: Vec<PathBuf>,

    /// Override for the global config directory (used for testing).
    /// When `None`, the platform directory from `dirs::config_dir()` is used.
    global_config_dir_override: Option<PathBuf>,

    include_global: bool,
}

impl ManifestLoader {
    /// Create a loader for the given directories plus the global clusters
    /// directory
    ///
    /// The global directory is platform dependent:
    /// - Linux: `~/.config/cluster-chef/clusters/`
    /// - macOS: `~/Library/Application Support/cluster-chef/clusters/`
    /// - Windows: `%APPDATA%\cluster-chef\clusters\`
    pub fn new(dirs: Vec<PathBuf>) -> Self {
        Self {
            dirs,
            global_config_dir_override: None,
            include_global: true,
        }
    }

    /// Use a custom global config directory instead of the platform one.
    pub fn with_global_config_dir(mut self, global_config_dir: PathBuf) -> Self {
        self.global_config_dir_override = Some(global_config_dir);
        self
    }

    /// Skip the global clusters directory entirely.
    pub fn without_global(mut self) -> Self {
        self.include_global = false;
        self
    }

    fn global_clusters_dir(&self) -> Option<PathBuf> {
        if !self.include_global {
            return None;
        }
        let config_dir = match &self.global_config_dir_override {
            Some(dir) => Some(dir.clone()),
            None => dirs::config_dir().map(|d| d.join("cluster-chef")),
        };
        config_dir.map(|d| d.join("clusters"))
    }

    /// Directories searched, in priority order
    pub fn search_dirs(&self) -> Vec<PathBuf> {
        let mut dirs = self.dirs.clone();
        dirs.extend(self.global_clusters_dir());
        dirs
    }

    /// List manifest files, directory by directory, sorted within each
    ///
    /// A missing explicit directory is logged and skipped; a missing global
    /// directory is normal.
    pub fn discover(&self) -> Result<Vec<PathBuf>> {
        let global = self.global_clusters_dir();
        let mut found = Vec::new();
        for dir in self.search_dirs() {
            if !dir.is_dir() {
                if Some(&dir) == global.as_ref() {
                    tracing::debug!(?dir, "No global clusters directory, skipping");
                } else {
                    tracing::warn!(?dir, "Cluster directory does not exist, skipping");
                }
                continue;
            }

            let mut files = Vec::new();
            for entry in fs::read_dir(&dir)? {
                let path = entry?.path();
                if path.is_file() && path.extension().is_some_and(|ext| ext == "toml") {
                    files.push(path);
                }
            }
            files.sort();
            found.extend(files);
        }
        Ok(found)
    }

    /// Load every discovered manifest
    ///
    /// Invalid files are an error; shadowed clusters are dropped.
    pub fn load(&self) -> Result<Vec<ClusterManifest>> {
        let mut seen: HashMap<String, PathBuf> = HashMap::new();
        let mut manifests = Vec::new();
        for path in self.discover()? {
            let manifest = ClusterManifest::load(&path)?;
            let key = manifest.name().to_lowercase();
            if let Some(winner) = seen.get(&key) {
                tracing::debug!(
                    cluster = %manifest.name(),
                    shadowed = ?path,
                    by = ?winner,
                    "Cluster manifest shadowed"
                );
                continue;
            }
            tracing::debug!(cluster = %manifest.name(), ?path, "Loaded cluster manifest");
            seen.insert(key, path);
            manifests.push(manifest);
        }
        Ok(manifests)
    }

    /// A registry that builds the discovered clusters on demand
    pub fn registry(&self) -> Result<ClusterRegistry> {
        Ok(ClusterRegistry::new().with_manifests(self.load()?))
    }
}
