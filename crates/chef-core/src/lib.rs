//! Cluster resolution engine for cluster-chef
//!
//! This crate turns declarative cluster definitions into one finalized
//! configuration per server:
//!
//! - **Topology**: clusters own facets, facets own numbered servers
//! - **Inheritance**: `use` and `reverse_merge` pull in other clusters'
//!   settings without overriding anything already declared
//! - **Resolution**: every server's settings are layered server over facet
//!   over cluster, with `run_list` concatenated and `chef_attributes` merged
//! - **Slicing**: ordered views over servers by facet and index
//! - **Manifests**: clusters declared in TOML files and loaded on demand
//!
//! # Architecture
//!
//! ```text
//!               chef-cli
//!                  |
//!              chef-core
//!   registry -> cluster -> facet -> server
//!      |           |
//!    config     provision
//!                  |
//!            chef-settings
//! ```
//!
//! # Example
//!
//! ```
//! use chef_core::{Cluster, RoleRegistry, SliceIndexes};
//! use chef_settings::SettingsTree;
//!
//! let mut roles = RoleRegistry::new();
//! let mut cluster = Cluster::new("demo", &mut roles);
//! cluster.set("region", "us-east-1");
//! cluster
//!     .facet("web", &SettingsTree::new().with("flavor", "m1.small"))?
//!     .instances(2);
//! cluster.resolve()?;
//!
//! let web = cluster.slice(Some("web"), SliceIndexes::All)?;
//! assert_eq!(web.fullnames(), vec!["demo-web-0", "demo-web-1"]);
//! let first = web.get(0).and_then(|s| s.resolved()).unwrap();
//! assert_eq!(first.get("region").and_then(|v| v.as_str()), Some("us-east-1"));
//! # Ok::<(), chef_core::Error>(())
//! ```

pub mod cluster;
pub mod config;
pub mod error;
pub mod facet;
pub mod provision;
pub mod registry;
pub mod role;
pub mod server;
pub mod slice;

pub use cluster::Cluster;
pub use config::{ClusterManifest, ManifestLoader};
pub use error::{Error, Result};
pub use facet::{DEFAULT_INSTANCES, Facet};
pub use provision::{CloudProvisioner, ProvisionIntent, ProvisionPlan, RecordingProvisioner, provision};
pub use registry::{ClusterRegistry, ClusterSource};
pub use role::{Role, RoleHandle, RoleRegistry};
pub use server::{ResolvedServer, Server};
pub use slice::{MAX_SLICE_INDEXES, ServerSlice, SliceIndexes};
