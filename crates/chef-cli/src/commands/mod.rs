//! Command implementations for chef-cli

pub mod list;
pub mod plan;
pub mod show;

use std::path::PathBuf;

use chef_core::ManifestLoader;

pub use list::run_list;
pub use plan::run_plan;
pub use show::run_show;

/// Searched when no `--path` is given
pub const DEFAULT_CLUSTERS_DIR: &str = "clusters";

/// Build the manifest loader for the given search options.
pub fn manifest_loader(paths: &[PathBuf], no_global: bool) -> ManifestLoader {
    let dirs = if paths.is_empty() {
        vec![PathBuf::from(DEFAULT_CLUSTERS_DIR)]
    } else {
        paths.to_vec()
    };
    let loader = ManifestLoader::new(dirs);
    if no_global { loader.without_global() } else { loader }
}
