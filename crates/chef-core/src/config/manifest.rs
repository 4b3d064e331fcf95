//! Manifest parsing for cluster definition files

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chef_settings::{CloudSpec, SettingsTree};
use serde::{Deserialize, Serialize};

use crate::cluster::Cluster;
use crate::error::{Error, Result};
use crate::registry::ClusterSource;
use crate::role::RoleRegistry;

/// Cloud declarations for a cluster or facet
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CloudSection {
    /// Cloud provider name, e.g. "ec2"
    #[serde(default)]
    pub provider: Option<String>,

    /// Keypair to launch with; defaults to the cluster name at resolve time
    #[serde(default)]
    pub keypair: Option<String>,

    /// Extra security groups to ensure
    #[serde(default)]
    pub security_groups: Vec<String>,

    /// Provider attributes (image, flavor, availability zone...)
    #[serde(default)]
    pub attributes: SettingsTree,

    /// Discovery tags
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

impl CloudSection {
    fn apply_to(&self, cloud: &mut CloudSpec) -> Result<()> {
        if let Some(provider) = &self.provider {
            cloud.set_provider(provider.as_str());
        }
        if let Some(keypair) = &self.keypair {
            cloud.set_keypair(keypair.as_str());
        }
        for group in &self.security_groups {
            cloud.security_group(group, |_| {});
        }
        cloud.attributes_mut().merge(&self.attributes)?;
        for (key, value) in &self.tags {
            cloud.set_tag(key.as_str(), value.as_str());
        }
        Ok(())
    }
}

/// The `[cluster]` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClusterSection {
    /// Cluster name, unique case-insensitively
    pub name: String,

    /// Clusters to reverse-merge into this one, strongest first
    #[serde(default, rename = "use")]
    pub uses: Vec<String>,

    /// Roles appended to the run list
    #[serde(default)]
    pub roles: Vec<String>,

    /// Recipes appended to the run list
    #[serde(default)]
    pub recipes: Vec<String>,

    /// Arbitrary cluster-wide settings
    #[serde(default)]
    pub settings: SettingsTree,

    /// Node attributes, merged recursively
    #[serde(default)]
    pub chef_attributes: SettingsTree,

    #[serde(default)]
    pub cloud: CloudSection,
}

/// A `[facets.<name>]` table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FacetSection {
    /// Number of servers; one when omitted
    #[serde(default)]
    pub instances: Option<usize>,

    #[serde(default)]
    pub roles: Vec<String>,

    #[serde(default)]
    pub recipes: Vec<String>,

    #[serde(default)]
    pub settings: SettingsTree,

    #[serde(default)]
    pub chef_attributes: SettingsTree,

    #[serde(default)]
    pub cloud: CloudSection,
}

/// Settings and node attributes folded into a single declaration.
fn settings_layer(settings: &SettingsTree, chef_attributes: &SettingsTree) -> Result<SettingsTree> {
    let mut layer = settings.clone();
    if !chef_attributes.is_empty() {
        layer.chef_attributes_mut()?.merge(chef_attributes)?;
    }
    Ok(layer)
}

/// A cluster definition parsed from one TOML file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClusterManifest {
    pub cluster: ClusterSection,

    /// Facets keyed by name
    #[serde(default)]
    pub facets: BTreeMap<String, FacetSection>,

    /// File the manifest was read from (not serialized)
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

impl ClusterManifest {
    /// Parse a manifest from TOML content
    ///
    /// # Example
    ///
    /// ```
    /// use chef_core::config::ClusterManifest;
    ///
    /// let manifest = ClusterManifest::parse(r#"
    /// [cluster]
    /// name = "demo"
    ///
    /// [facets.web]
    /// instances = 2
    /// "#).unwrap();
    ///
    /// assert_eq!(manifest.name(), "demo");
    /// assert_eq!(manifest.facets["web"].instances, Some(2));
    /// ```
    pub fn parse(content: &str) -> Result<Self> {
        let manifest: ClusterManifest = toml::from_str(content)?;
        if manifest.cluster.name.trim().is_empty() {
            return Err(Error::InvalidManifest {
                message: "cluster name must not be empty".to_string(),
            });
        }
        Ok(manifest)
    }

    /// Read and parse a manifest file
    ///
    /// Parse failures are reported with the offending path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let mut manifest = Self::parse(&content).map_err(|e| Error::ManifestParse {
            path: path.to_path_buf(),
            message: match e {
                Error::InvalidManifest { message } => message,
                other => other.to_string(),
            },
        })?;
        manifest.source = Some(path.to_path_buf());
        Ok(manifest)
    }

    pub fn name(&self) -> &str {
        &self.cluster.name
    }

    /// Names of the clusters this one uses, in order
    pub fn uses(&self) -> &[String] {
        &self.cluster.uses
    }

    /// Build the cluster this manifest declares
    ///
    /// Used clusters are merged first, then the cluster's own settings,
    /// roles, recipes and cloud declarations, then each facet.
    pub fn build<S>(&self, roles: &mut RoleRegistry, source: &S) -> Result<Cluster>
    where
        S: ClusterSource + ?Sized,
    {
        let section = &self.cluster;
        let mut cluster = Cluster::new(section.name.as_str(), roles);
        cluster.use_clusters(source, &section.uses)?;
        cluster.configure(&settings_layer(&section.settings, &section.chef_attributes)?)?;
        for role in &section.roles {
            cluster.role(role)?;
        }
        for recipe in &section.recipes {
            cluster.recipe(recipe)?;
        }
        section.cloud.apply_to(cluster.cloud_mut())?;

        for (name, declared) in &self.facets {
            let layer = settings_layer(&declared.settings, &declared.chef_attributes)?;
            let facet = cluster.facet(name, &layer)?;
            if let Some(count) = declared.instances {
                facet.instances(count);
            }
            for role in &declared.roles {
                facet.role(role)?;
            }
            for recipe in &declared.recipes {
                facet.recipe(recipe)?;
            }
            declared.cloud.apply_to(facet.cloud_mut())?;
        }
        Ok(cluster)
    }
}
