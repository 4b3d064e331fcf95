//! Single-node identity and its resolved configuration
//!
//! Resolution stamps `cluster_name`, `facet_name`, `facet_index` and
//! `node_name` into each server's `chef_attributes`. These keys are reserved:
//! a declared value under any of them is replaced.

use chef_settings::{CloudSpec, SettingValue, SettingsTree};
use serde::Serialize;

use crate::error::{Error, Result};

/// A settings and cloud layer inherited by a server during resolution.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Layer<'a> {
    pub settings: &'a SettingsTree,
    pub cloud: &'a CloudSpec,
}

/// The finalized configuration of one server.
///
/// This is the record a converge or provisioning stage consumes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedServer {
    pub fullname: String,
    pub cluster: String,
    pub facet: String,
    pub index: usize,
    pub settings: SettingsTree,
    pub cloud: CloudSpec,
}

impl ResolvedServer {
    /// The merged run list.
    pub fn run_list(&self) -> Result<Vec<String>> {
        Ok(self.settings.run_list()?)
    }

    pub fn get(&self, key: &str) -> Option<&SettingValue> {
        self.settings.get(key)
    }
}

/// One member of a facet, identified by cluster, facet and position.
#[derive(Debug, Clone, PartialEq)]
pub struct Server {
    cluster_name: String,
    facet_name: String,
    index: usize,
    settings: SettingsTree,
    cloud: CloudSpec,
    resolved: Option<ResolvedServer>,
}

impl Server {
    pub(crate) fn new(cluster_name: &str, facet_name: &str, index: usize) -> Self {
        Self {
            cluster_name: cluster_name.to_string(),
            facet_name: facet_name.to_string(),
            index,
            settings: SettingsTree::new(),
            cloud: CloudSpec::new(),
            resolved: None,
        }
    }

    pub fn cluster_name(&self) -> &str {
        &self.cluster_name
    }

    pub fn facet_name(&self) -> &str {
        &self.facet_name
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Node name, `<cluster>-<facet>-<index>`.
    pub fn fullname(&self) -> String {
        format!("{}-{}-{}", self.cluster_name, self.facet_name, self.index)
    }

    /// Settings pinned on this server alone.
    pub fn settings(&self) -> &SettingsTree {
        &self.settings
    }

    /// Pin a per-server value; it wins over facet and cluster values.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<SettingValue>) -> &mut Self {
        self.settings.set(key, value);
        self
    }

    pub fn cloud(&self) -> &CloudSpec {
        &self.cloud
    }

    pub fn cloud_mut(&mut self) -> &mut CloudSpec {
        &mut self.cloud
    }

    /// The output of the last resolution, if any.
    pub fn resolved(&self) -> Option<&ResolvedServer> {
        self.resolved.as_ref()
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved.is_some()
    }

    /// Compute this server's configuration from its own, facet and cluster
    /// layers, strongest first.
    ///
    /// The computation starts from the unmerged layers every time, so the
    /// result only depends on the current declarations.
    pub(crate) fn resolution(&self, facet: Layer<'_>, cluster: Layer<'_>) -> Result<ResolvedServer> {
        let fullname = self.fullname();

        let mut settings = self.settings.clone();
        settings
            .reverse_merge(facet.settings)
            .map_err(Error::merge(format!("server '{fullname}' from facet '{}'", self.facet_name)))?;
        settings
            .reverse_merge(cluster.settings)
            .map_err(Error::merge(format!("server '{fullname}' from cluster '{}'", self.cluster_name)))?;

        let attributes = settings
            .chef_attributes_mut()
            .map_err(Error::merge(format!("server '{fullname}'")))?;
        let identity: [(&str, SettingValue); 4] = [
            ("cluster_name", self.cluster_name.as_str().into()),
            ("facet_name", self.facet_name.as_str().into()),
            ("facet_index", (self.index as i64).into()),
            ("node_name", fullname.as_str().into()),
        ];
        for (key, value) in identity {
            if let Some(previous) = attributes.set(key, value.clone()) {
                if previous != value {
                    tracing::debug!(
                        server = %fullname,
                        key,
                        %previous,
                        replacement = %value,
                        "Replacing declared identity attribute"
                    );
                }
            }
        }

        let mut cloud = self.cloud.clone();
        cloud
            .reverse_merge(facet.cloud)
            .map_err(Error::merge(format!("cloud of server '{fullname}' from facet '{}'", self.facet_name)))?;
        cloud
            .reverse_merge(cluster.cloud)
            .map_err(Error::merge(format!("cloud of server '{fullname}' from cluster '{}'", self.cluster_name)))?;
        cloud
            .set_tag("cluster", self.cluster_name.as_str())
            .set_tag("facet", self.facet_name.as_str())
            .set_tag("index", self.index.to_string());

        Ok(ResolvedServer {
            fullname,
            cluster: self.cluster_name.clone(),
            facet: self.facet_name.clone(),
            index: self.index,
            settings,
            cloud,
        })
    }

    pub(crate) fn apply_resolution(&mut self, resolved: ResolvedServer) {
        self.resolved = Some(resolved);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fullname() {
        let server = Server::new("demo", "web", 2);
        assert_eq!(server.fullname(), "demo-web-2");
    }

    #[test]
    fn test_resolution_priority_server_facet_cluster() {
        let mut server = Server::new("demo", "web", 0);
        server.set("flavor", "server");

        let facet_settings = SettingsTree::new()
            .with("flavor", "facet")
            .with("image", "facet");
        let cluster_settings = SettingsTree::new()
            .with("flavor", "cluster")
            .with("image", "cluster")
            .with("region", "cluster");
        let cloud = CloudSpec::new();

        let resolved = server
            .resolution(
                Layer {
                    settings: &facet_settings,
                    cloud: &cloud,
                },
                Layer {
                    settings: &cluster_settings,
                    cloud: &cloud,
                },
            )
            .unwrap();

        assert_eq!(resolved.get("flavor").unwrap().as_str(), Some("server"));
        assert_eq!(resolved.get("image").unwrap().as_str(), Some("facet"));
        assert_eq!(resolved.get("region").unwrap().as_str(), Some("cluster"));
        assert_eq!(resolved.cloud.tag("facet"), Some("web"));
        assert_eq!(
            resolved
                .settings
                .get_path("chef_attributes.facet_index")
                .unwrap()
                .as_i64(),
            Some(0)
        );
    }

    #[test]
    fn test_identity_attributes_replace_declared_values() {
        let mut server = Server::new("demo", "web", 1);
        server.set(
            "chef_attributes",
            SettingsTree::new()
                .with("cluster_name", "other")
                .with("node_name", "custom")
                .with("owner", "ops"),
        );
        let empty = SettingsTree::new();
        let cloud = CloudSpec::new();
        let layer = Layer {
            settings: &empty,
            cloud: &cloud,
        };

        let resolved = server.resolution(layer, layer).unwrap();

        let attribute = |key: &str| {
            resolved
                .settings
                .get_path(&format!("chef_attributes.{key}"))
                .cloned()
        };
        assert_eq!(attribute("cluster_name"), Some(SettingValue::from("demo")));
        assert_eq!(attribute("node_name"), Some(SettingValue::from("demo-web-1")));
        assert_eq!(attribute("facet_index"), Some(SettingValue::from(1i64)));
        assert_eq!(attribute("owner"), Some(SettingValue::from("ops")));
    }
}
