//! Roles and the role registry
//!
//! A role is a named, reusable configuration layer: its own run list plus
//! default and override attributes. Clusters and facets reference roles by
//! name through a [`RoleHandle`]; the handle's run-list form is `role[name]`.

use std::collections::BTreeMap;
use std::fmt;

use chef_settings::SettingsTree;
use serde::{Deserialize, Serialize};

/// Non-owning reference to a role by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleHandle(String);

impl RoleHandle {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }

    /// The run-list entry for this role, e.g. `role[demo_cluster]`.
    pub fn run_list_item(&self) -> String {
        format!("role[{}]", self.0)
    }
}

impl fmt::Display for RoleHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A named configuration layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Role {
    name: String,
    cluster: String,
    description: String,
    run_list: Vec<String>,
    default_attributes: SettingsTree,
    override_attributes: SettingsTree,
}

impl Role {
    fn new(name: String, cluster: String) -> Self {
        let description = format!("{name} role for the {cluster} cluster");
        Self {
            name,
            cluster,
            description,
            run_list: Vec::new(),
            default_attributes: SettingsTree::new(),
            override_attributes: SettingsTree::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the cluster that created the role.
    pub fn cluster(&self) -> &str {
        &self.cluster
    }

    pub fn handle(&self) -> RoleHandle {
        RoleHandle::new(self.name.clone())
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn set_description(&mut self, description: impl Into<String>) -> &mut Self {
        self.description = description.into();
        self
    }

    pub fn run_list(&self) -> &[String] {
        &self.run_list
    }

    pub fn recipe(&mut self, recipe: &str) -> &mut Self {
        self.run_list.push(format!("recipe[{recipe}]"));
        self
    }

    pub fn role(&mut self, role: &str) -> &mut Self {
        self.run_list.push(format!("role[{role}]"));
        self
    }

    pub fn default_attributes(&self) -> &SettingsTree {
        &self.default_attributes
    }

    pub fn default_attributes_mut(&mut self) -> &mut SettingsTree {
        &mut self.default_attributes
    }

    pub fn override_attributes(&self) -> &SettingsTree {
        &self.override_attributes
    }

    pub fn override_attributes_mut(&mut self) -> &mut SettingsTree {
        &mut self.override_attributes
    }
}

/// In-memory registry of roles keyed by name.
#[derive(Debug, Clone, Default)]
pub struct RoleRegistry {
    roles: BTreeMap<String, Role>,
}

impl RoleRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            roles: BTreeMap::new(),
        }
    }

    /// Get or create the role `name`, owned by `cluster`.
    ///
    /// Asking for an existing role returns its handle and leaves the role as
    /// it was.
    pub fn new_role(&mut self, name: impl Into<String>, cluster: &str) -> RoleHandle {
        let name = name.into();
        self.roles.entry(name.clone()).or_insert_with(|| {
            tracing::debug!(role = %name, cluster, "Creating role");
            Role::new(name.clone(), cluster.to_string())
        });
        RoleHandle::new(name)
    }

    pub fn get(&self, handle: &RoleHandle) -> Option<&Role> {
        self.roles.get(handle.name())
    }

    pub fn role_mut(&mut self, handle: &RoleHandle) -> Option<&mut Role> {
        self.roles.get_mut(handle.name())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.roles.contains_key(name)
    }

    /// List all role names (sorted).
    pub fn names(&self) -> Vec<&str> {
        self.roles.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.roles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }
}
