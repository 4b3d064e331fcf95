//! Clusters: the top-level aggregate of facets
//!
//! A cluster has many facets. Any setting applied at the cluster level is
//! layered under each facet at resolve time; if the facet explicitly sets an
//! attribute, the facet wins.
//!
//! # Lifecycle
//!
//! 1. [`Cluster::new`] creates the cluster and its cluster role
//! 2. `facet`, `role`, `use_clusters`, `reverse_merge` declare the topology
//! 3. [`Cluster::resolve`] declares baseline cloud resources and resolves
//!    every server; it can be called again at any time with the same result
//!
//! Any later change through a `&mut` accessor marks the cluster unresolved
//! until the next `resolve`.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use chef_settings::{CHEF_ATTRIBUTES_KEY, CloudSpec, RUN_LIST_KEY, SecurityGroup, SettingValue, SettingsTree};

use crate::error::{Error, Result};
use crate::facet::Facet;
use crate::registry::ClusterSource;
use crate::role::{RoleHandle, RoleRegistry};
use crate::server::{Layer, ResolvedServer};
use crate::slice::{ServerSlice, SliceIndexes};

#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    name: String,
    settings: SettingsTree,
    cloud: CloudSpec,
    /// Keyed by lowercased facet name
    facets: HashMap<String, Facet>,
    cluster_role: RoleHandle,
    roles: Vec<RoleHandle>,
    used: Vec<String>,
    resolved: bool,
}

fn facet_key(name: &str) -> String {
    name.to_lowercase()
}

impl Cluster {
    /// Create a cluster and its `<name>_cluster` role.
    ///
    /// The cluster role is created eagerly and is the first entry of the
    /// cluster run list, so every facet and server inherits it.
    pub fn new(name: impl Into<String>, roles: &mut RoleRegistry) -> Self {
        let name = name.into();
        let cluster_role = roles.new_role(format!("{name}_cluster"), &name);
        let settings = SettingsTree::new()
            .with(RUN_LIST_KEY, vec![cluster_role.run_list_item()])
            .with(CHEF_ATTRIBUTES_KEY, SettingsTree::new());
        tracing::debug!(cluster = %name, role = %cluster_role, "Creating cluster");
        Self {
            name,
            settings,
            cloud: CloudSpec::new(),
            facets: HashMap::new(),
            cluster_role: cluster_role.clone(),
            roles: vec![cluster_role],
            used: Vec::new(),
            resolved: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Cluster-wide settings inherited by every facet.
    pub fn settings(&self) -> &SettingsTree {
        &self.settings
    }

    /// Merge an explicit settings declaration into the cluster layer.
    pub fn configure(&mut self, settings: &SettingsTree) -> Result<&mut Self> {
        self.mark_changed();
        let context = format!("cluster '{}'", self.name);
        self.settings.merge(settings).map_err(Error::merge(context))?;
        Ok(self)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<SettingValue>) -> &mut Self {
        self.mark_changed();
        self.settings.set(key, value);
        self
    }

    pub fn run_list(&self) -> Result<Vec<String>> {
        Ok(self.settings.run_list()?)
    }

    pub fn chef_attributes(&self) -> Option<&SettingsTree> {
        self.settings.chef_attributes()
    }

    pub fn chef_attributes_mut(&mut self) -> Result<&mut SettingsTree> {
        self.mark_changed();
        Ok(self.settings.chef_attributes_mut()?)
    }

    pub fn cloud(&self) -> &CloudSpec {
        &self.cloud
    }

    pub fn cloud_mut(&mut self) -> &mut CloudSpec {
        self.mark_changed();
        &mut self.cloud
    }

    /// The implicit role carrying cluster-wide configuration.
    pub fn cluster_role(&self) -> &RoleHandle {
        &self.cluster_role
    }

    /// Roles attached to the cluster, the cluster role first.
    pub fn roles(&self) -> &[RoleHandle] {
        &self.roles
    }

    /// Names of the clusters merged in through [`Cluster::use_clusters`].
    pub fn used_clusters(&self) -> &[String] {
        &self.used
    }

    /// True once [`Cluster::resolve`] has run, nothing was changed since,
    /// and every server carries a resolved record.
    pub fn is_resolved(&self) -> bool {
        self.resolved && self.servers().iter().all(|server| server.is_resolved())
    }

    fn mark_changed(&mut self) {
        self.resolved = false;
    }

    /// Attach a role to the whole cluster.
    pub fn role(&mut self, name: &str) -> Result<&mut Self> {
        self.mark_changed();
        let handle = RoleHandle::new(name);
        self.settings.push_run_list(handle.run_list_item())?;
        if !self.roles.contains(&handle) {
            self.roles.push(handle);
        }
        Ok(self)
    }

    /// Append a recipe to the cluster run list.
    pub fn recipe(&mut self, name: &str) -> Result<&mut Self> {
        self.mark_changed();
        self.settings.push_run_list(format!("recipe[{name}]"))?;
        Ok(self)
    }

    /// Get or create the facet `name` and configure it with `settings`.
    ///
    /// Facet names are unique per cluster, compared case-insensitively.
    /// Declaring an existing facet again accumulates settings rather than
    /// replacing them.
    pub fn facet(&mut self, name: &str, settings: &SettingsTree) -> Result<&mut Facet> {
        self.mark_changed();
        let cluster_name = &self.name;
        let facet = self
            .facets
            .entry(facet_key(name))
            .or_insert_with(|| Facet::new(cluster_name, name));
        facet.configure(settings)?;
        Ok(facet)
    }

    /// [`Cluster::facet`] followed by an imperative configuration step.
    ///
    /// # Example
    ///
    /// ```
    /// use chef_core::{Cluster, RoleRegistry};
    /// use chef_settings::SettingsTree;
    ///
    /// let mut roles = RoleRegistry::new();
    /// let mut cluster = Cluster::new("demo", &mut roles);
    /// cluster
    ///     .facet_with("web", &SettingsTree::new(), |facet| {
    ///         facet.instances(3).role("webserver")?;
    ///         Ok(())
    ///     })
    ///     .unwrap();
    /// assert_eq!(cluster.find_facet("web").unwrap().instance_count(), 3);
    /// ```
    pub fn facet_with<F>(&mut self, name: &str, settings: &SettingsTree, configure: F) -> Result<&mut Facet>
    where
        F: FnOnce(&mut Facet) -> Result<()>,
    {
        let facet = self.facet(name, settings)?;
        configure(&mut *facet)?;
        Ok(facet)
    }

    pub fn has_facet(&self, name: &str) -> bool {
        self.facets.contains_key(&facet_key(name))
    }

    pub fn find_facet(&self, name: &str) -> Result<&Facet> {
        self.facets.get(&facet_key(name)).ok_or_else(|| Error::FacetNotFound {
            cluster: self.name.clone(),
            facet: name.to_string(),
        })
    }

    pub fn find_facet_mut(&mut self, name: &str) -> Result<&mut Facet> {
        self.mark_changed();
        let cluster = &self.name;
        self.facets
            .get_mut(&facet_key(name))
            .ok_or_else(|| Error::FacetNotFound {
                cluster: cluster.clone(),
                facet: name.to_string(),
            })
    }

    /// Facets sorted by name.
    pub fn facets(&self) -> Vec<&Facet> {
        let mut facets: Vec<(&String, &Facet)> = self.facets.iter().collect();
        facets.sort_by(|a, b| a.0.cmp(b.0));
        facets.into_iter().map(|(_, facet)| facet).collect()
    }

    /// Facet names (sorted).
    pub fn facet_names(&self) -> Vec<&str> {
        self.facets().into_iter().map(Facet::name).collect()
    }

    /// Every server of the cluster, facets in name order, servers in index
    /// order within each facet.
    pub fn servers(&self) -> ServerSlice<'_> {
        ServerSlice::flatten(&self.name, self.facets().into_iter().map(Facet::servers))
    }

    /// A slice of the cluster.
    ///
    /// Without a facet, returns all servers; selecting indexes then requires
    /// naming a facet. With a facet, takes `indexes` from that facet.
    pub fn slice(&self, facet_name: Option<&str>, indexes: impl Into<SliceIndexes>) -> Result<ServerSlice<'_>> {
        let indexes = indexes.into();
        match facet_name {
            None if indexes.is_all() => Ok(self.servers()),
            None => Err(Error::InvalidSliceIndexes {
                spec: indexes.to_string(),
                reason: "a facet must be named to select server indexes".to_string(),
            }),
            Some(name) => self.find_facet(name)?.slice(indexes),
        }
    }

    /// Security groups declared at the cluster level.
    pub fn security_groups(&self) -> &BTreeMap<String, SecurityGroup> {
        self.cloud.security_groups()
    }

    /// Load each named cluster and reverse-merge it into this one, in order.
    ///
    /// Values already present here always win; among the used clusters the
    /// first listed wins.
    pub fn use_clusters<S, I>(&mut self, source: &S, names: I) -> Result<&mut Self>
    where
        S: ClusterSource + ?Sized,
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        for name in names {
            let name = name.as_ref();
            if name.eq_ignore_ascii_case(&self.name) {
                return Err(Error::CircularUse {
                    chain: format!("{} -> {}", self.name, name),
                });
            }
            let other = source.load_cluster(name)?;
            tracing::debug!(cluster = %self.name, using = %other.name, "Using cluster");
            self.reverse_merge(&other)?;
            self.used.push(other.name.clone());
        }
        Ok(self)
    }

    /// Merge another cluster's settings and cloud spec into this one.
    ///
    /// Existing keys win, `run_list` becomes `self + other`, and
    /// `chef_attributes` merge recursively. Facets are not copied: inheriting
    /// settings does not clone topology.
    pub fn reverse_merge(&mut self, other: &Cluster) -> Result<&mut Self> {
        let context = format!("cluster '{}' from '{}'", self.name, other.name);
        let mut settings = self.settings.clone();
        settings
            .reverse_merge(&other.settings)
            .map_err(Error::merge(context.clone()))?;
        let mut cloud = self.cloud.clone();
        cloud.reverse_merge(&other.cloud).map_err(Error::merge(context))?;

        self.settings = settings;
        self.cloud = cloud;
        self.mark_changed();
        for role in &other.roles {
            if !self.roles.contains(role) {
                self.roles.push(role.clone());
            }
        }
        Ok(self)
    }

    /// Finalize the cluster. Safe to call any number of times.
    ///
    /// 1. declares a security group named after the cluster that authorizes
    ///    traffic from its own members
    /// 2. assigns a keypair named after the cluster if none is set
    /// 3. resolves every facet against the cluster layer
    ///
    /// If any server fails to merge, nothing is changed.
    pub fn resolve(&mut self) -> Result<()> {
        let name = self.name.clone();
        let mut cloud = self.cloud.clone();
        cloud.security_group(&name, |group| {
            group.authorize_group(name.as_str());
        });
        if cloud.keypair().is_none() {
            cloud.set_keypair(name.as_str());
        }

        let cluster = Layer {
            settings: &self.settings,
            cloud: &cloud,
        };
        let mut resolved = Vec::with_capacity(self.facets.len());
        for (key, facet) in &self.facets {
            resolved.push((key.clone(), facet.resolution(cluster)?));
        }

        let mut server_count = 0;
        for (key, servers) in resolved {
            server_count += servers.len();
            if let Some(facet) = self.facets.get_mut(&key) {
                facet.apply_resolution(servers);
            }
        }
        self.cloud = cloud;
        self.resolved = true;

        tracing::info!(
            cluster = %self.name,
            facets = self.facets.len(),
            servers = server_count,
            "Resolved cluster"
        );
        Ok(())
    }

    /// Resolved records of every server, in [`Cluster::servers`] order.
    pub fn resolved_servers(&self) -> Vec<&ResolvedServer> {
        self.servers().resolved()
    }
}

impl fmt::Display for Cluster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Cluster {} facets=[{}]", self.name, self.facet_names().join(", "))
    }
}
