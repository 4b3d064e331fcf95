//! Facets: named, homogeneous groups of servers within a cluster
//!
//! A facet owns its settings overlay, its cloud overlay and its member
//! servers. Explicit facet settings always beat inherited cluster settings:
//! the cluster layer is only consulted, never written into the facet, and
//! only at resolve time.

use chef_settings::{CloudSpec, SettingValue, SettingsTree};

use crate::error::{Error, Result};
use crate::role::RoleHandle;
use crate::server::{Layer, ResolvedServer, Server};
use crate::slice::{ServerSlice, SliceIndexes};

/// Default member count of a freshly declared facet.
pub const DEFAULT_INSTANCES: usize = 1;

#[derive(Debug, Clone, PartialEq)]
pub struct Facet {
    cluster_name: String,
    name: String,
    settings: SettingsTree,
    cloud: CloudSpec,
    servers: Vec<Server>,
    roles: Vec<RoleHandle>,
}

impl Facet {
    pub(crate) fn new(cluster_name: &str, name: &str) -> Self {
        tracing::debug!(cluster = cluster_name, facet = name, "Declaring facet");
        let mut facet = Self {
            cluster_name: cluster_name.to_string(),
            name: name.to_string(),
            settings: SettingsTree::new(),
            cloud: CloudSpec::new(),
            servers: Vec::new(),
            roles: Vec::new(),
        };
        facet.instances(DEFAULT_INSTANCES);
        facet
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cluster_name(&self) -> &str {
        &self.cluster_name
    }

    /// The facet's explicit settings, without anything inherited.
    pub fn settings(&self) -> &SettingsTree {
        &self.settings
    }

    pub fn cloud(&self) -> &CloudSpec {
        &self.cloud
    }

    pub fn cloud_mut(&mut self) -> &mut CloudSpec {
        &mut self.cloud
    }

    /// Roles attached to this facet, in attachment order.
    pub fn roles(&self) -> &[RoleHandle] {
        &self.roles
    }

    /// Merge an explicit settings declaration into the facet.
    ///
    /// Declarations accumulate: later keys override earlier explicit facet
    /// keys, `run_list` concatenates, and nested trees merge.
    pub fn configure(&mut self, settings: &SettingsTree) -> Result<&mut Self> {
        let context = format!("facet '{}' of cluster '{}'", self.name, self.cluster_name);
        self.settings.merge(settings).map_err(Error::merge(context))?;
        Ok(self)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<SettingValue>) -> &mut Self {
        self.settings.set(key, value);
        self
    }

    /// Set the number of servers in this facet.
    ///
    /// Growing appends fresh servers; shrinking drops the highest indexes.
    pub fn instances(&mut self, count: usize) -> &mut Self {
        if count < self.servers.len() {
            self.servers.truncate(count);
        } else {
            let start = self.servers.len();
            for index in start..count {
                self.servers
                    .push(Server::new(&self.cluster_name, &self.name, index));
            }
        }
        self
    }

    pub fn instance_count(&self) -> usize {
        self.servers.len()
    }

    /// Attach a role; its `role[...]` entry is appended to the run list.
    pub fn role(&mut self, name: &str) -> Result<&mut Self> {
        let handle = RoleHandle::new(name);
        self.settings.push_run_list(handle.run_list_item())?;
        if !self.roles.contains(&handle) {
            self.roles.push(handle);
        }
        Ok(self)
    }

    /// Append a `recipe[...]` entry to the run list.
    pub fn recipe(&mut self, name: &str) -> Result<&mut Self> {
        self.settings.push_run_list(format!("recipe[{name}]"))?;
        Ok(self)
    }

    pub fn server(&self, index: usize) -> Option<&Server> {
        self.servers.get(index)
    }

    pub fn server_mut(&mut self, index: usize) -> Option<&mut Server> {
        self.servers.get_mut(index)
    }

    /// All servers of this facet, in index order.
    pub fn servers(&self) -> ServerSlice<'_> {
        ServerSlice::new(&self.cluster_name, self.servers.iter().collect())
    }

    /// Select servers by position; [`SliceIndexes::All`] returns every server.
    pub fn slice(&self, indexes: impl Into<SliceIndexes>) -> Result<ServerSlice<'_>> {
        let scope = format!("facet '{}'", self.name);
        self.servers().select_in_scope(&indexes.into(), &scope)
    }

    /// Compute every member's resolved configuration without committing it.
    pub(crate) fn resolution(&self, cluster: Layer<'_>) -> Result<Vec<ResolvedServer>> {
        let facet = Layer {
            settings: &self.settings,
            cloud: &self.cloud,
        };
        self.servers
            .iter()
            .map(|server| server.resolution(facet, cluster))
            .collect()
    }

    pub(crate) fn apply_resolution(&mut self, resolved: Vec<ResolvedServer>) {
        for (server, record) in self.servers.iter_mut().zip(resolved) {
            server.apply_resolution(record);
        }
    }

    /// Resolve every member against the given cluster settings and cloud.
    ///
    /// Either every server is updated or, on a merge failure, none is.
    pub fn resolve(&mut self, cluster_settings: &SettingsTree, cluster_cloud: &CloudSpec) -> Result<()> {
        let resolved = self.resolution(Layer {
            settings: cluster_settings,
            cloud: cluster_cloud,
        })?;
        self.apply_resolution(resolved);
        Ok(())
    }
}
