//! Settings and cloud resource descriptors for cluster-chef.
//!
//! This crate is the leaf of the workspace. It provides the two mergeable
//! structures every cluster, facet and server is made of:
//!
//! - [`SettingsTree`]: a recursive key/value tree with reverse-merge and
//!   overlay-merge rules, where `run_list` concatenates and
//!   `chef_attributes` merges recursively
//! - [`CloudSpec`]: keypair, security groups, provider attributes and tags,
//!   merged fill-only

pub mod cloud;
pub mod error;
pub mod tree;

pub use cloud::{CloudSpec, PortRange, Protocol, SecurityGroup};
pub use error::{Error, Result};
pub use tree::{CHEF_ATTRIBUTES_KEY, RUN_LIST_KEY, SettingValue, SettingsTree};
