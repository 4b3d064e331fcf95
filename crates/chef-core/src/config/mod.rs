//! Cluster definitions on disk
//!
//! Clusters can be declared in TOML manifests, one cluster per file. A
//! manifest is turned into a [`Cluster`](crate::Cluster) by calling the same
//! operations a programmatic caller would.
//!
//! # Search path
//!
//! Manifests are discovered from these directories, first match wins:
//!
//! 1. **Explicit directories** - passed by the caller, in order
//! 2. **Global clusters** - `<config_dir>/cluster-chef/clusters/`
//!
//! # Example
//!
//! ```ignore
//! use chef_core::config::ManifestLoader;
//! use chef_core::ClusterSource;
//!
//! let registry = ManifestLoader::new(vec!["clusters".into()]).registry()?;
//! let demo = registry.load_cluster("demo")?;
//! ```

mod loader;
mod manifest;

pub use loader::ManifestLoader;
pub use manifest::{CloudSection, ClusterManifest, ClusterSection, FacetSection};
