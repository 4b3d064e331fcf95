//! Cloud provisioning intents
//!
//! Resolution only declares what a cluster needs. [`provision`] walks a
//! resolved cluster and hands each distinct security group and keypair to a
//! [`CloudProvisioner`] exactly once. Groups declared under the same name by
//! several servers are sent as the union of their authorizations.

use std::collections::{HashMap, HashSet};

use chef_settings::{CloudSpec, SecurityGroup};
use serde::Serialize;

use crate::cluster::Cluster;
use crate::error::{Error, Result};

/// A backend able to create cloud resources.
pub trait CloudProvisioner {
    /// Create the group, or bring its authorizations up to date.
    fn ensure_security_group(&mut self, group: &SecurityGroup) -> Result<()>;

    /// Create the keypair if it does not exist.
    fn ensure_keypair(&mut self, name: &str) -> Result<()>;
}

/// Summary of the resources handed to a provisioner
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProvisionPlan {
    pub cluster: String,
    /// Security groups, first-seen order; same-named groups are merged
    pub security_groups: Vec<SecurityGroup>,
    /// Keypair names, first-seen order
    pub keypairs: Vec<String>,
    /// Fullnames of the servers covered
    pub servers: Vec<String>,
}

impl ProvisionPlan {
    fn collect(&mut self, cloud: &CloudSpec, groups: &mut HashMap<String, usize>, keypairs: &mut HashSet<String>) {
        for group in cloud.security_groups().values() {
            match groups.get(group.name()) {
                Some(&position) => {
                    self.security_groups[position].merge_authorizations(group);
                }
                None => {
                    groups.insert(group.name().to_string(), self.security_groups.len());
                    self.security_groups.push(group.clone());
                }
            }
        }
        if let Some(keypair) = cloud.keypair() {
            if keypairs.insert(keypair.to_string()) {
                self.keypairs.push(keypair.to_string());
            }
        }
    }
}

/// Ensure every cloud resource a resolved cluster declares.
///
/// The cluster's own cloud spec is visited first, then each resolved server
/// in [`Cluster::servers`] order. Fails with [`Error::NotResolved`] before
/// touching the provisioner if the cluster was never resolved, or was
/// changed after its last resolve.
pub fn provision<P>(cluster: &Cluster, provisioner: &mut P) -> Result<ProvisionPlan>
where
    P: CloudProvisioner + ?Sized,
{
    if !cluster.is_resolved() {
        return Err(Error::NotResolved {
            cluster: cluster.name().to_string(),
        });
    }

    let mut plan = ProvisionPlan {
        cluster: cluster.name().to_string(),
        ..ProvisionPlan::default()
    };
    let mut groups = HashMap::new();
    let mut keypairs = HashSet::new();
    plan.collect(cluster.cloud(), &mut groups, &mut keypairs);
    for server in cluster.resolved_servers() {
        plan.collect(&server.cloud, &mut groups, &mut keypairs);
        plan.servers.push(server.fullname.clone());
    }

    for group in &plan.security_groups {
        tracing::debug!(cluster = %plan.cluster, group = %group.name(), "Ensuring security group");
        provisioner.ensure_security_group(group)?;
    }
    for keypair in &plan.keypairs {
        tracing::debug!(cluster = %plan.cluster, %keypair, "Ensuring keypair");
        provisioner.ensure_keypair(keypair)?;
    }

    tracing::info!(
        cluster = %plan.cluster,
        security_groups = plan.security_groups.len(),
        keypairs = plan.keypairs.len(),
        "Provisioned cluster"
    );
    Ok(plan)
}

/// One request received by a [`RecordingProvisioner`]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProvisionIntent {
    SecurityGroup { group: SecurityGroup },
    Keypair { name: String },
}

/// In-memory provisioner that records what it was asked to do
///
/// Used for dry runs and tests. [`RecordingProvisioner::fail_on`] makes a
/// named resource fail.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RecordingProvisioner {
    intents: Vec<ProvisionIntent>,
    #[serde(skip)]
    failing: HashSet<String>,
}

impl RecordingProvisioner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_on(mut self, resource: impl Into<String>) -> Self {
        self.failing.insert(resource.into());
        self
    }

    pub fn intents(&self) -> &[ProvisionIntent] {
        &self.intents
    }

    fn check(&self, resource: &str) -> Result<()> {
        if self.failing.contains(resource) {
            return Err(Error::Provision {
                resource: resource.to_string(),
                message: "rejected by recording provisioner".to_string(),
            });
        }
        Ok(())
    }
}

impl CloudProvisioner for RecordingProvisioner {
    fn ensure_security_group(&mut self, group: &SecurityGroup) -> Result<()> {
        self.check(group.name())?;
        self.intents.push(ProvisionIntent::SecurityGroup { group: group.clone() });
        Ok(())
    }

    fn ensure_keypair(&mut self, name: &str) -> Result<()> {
        self.check(name)?;
        self.intents.push(ProvisionIntent::Keypair { name: name.to_string() });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::role::RoleRegistry;
    use chef_settings::{Protocol, SettingsTree};

    fn demo() -> Cluster {
        let mut roles = RoleRegistry::new();
        let mut cluster = Cluster::new("demo", &mut roles);
        cluster.cloud_mut().security_group("ssh", |_| {});
        cluster
            .facet("web", &SettingsTree::new())
            .unwrap()
            .instances(2)
            .cloud_mut()
            .security_group("http", |_| {});
        cluster
    }

    #[test]
    fn test_unresolved_cluster_is_rejected() {
        let mut provisioner = RecordingProvisioner::new();
        let err = provision(&demo(), &mut provisioner).unwrap_err();
        assert!(matches!(err, Error::NotResolved { .. }));
        assert!(provisioner.intents().is_empty());
    }

    #[test]
    fn test_each_resource_is_ensured_once() {
        let mut cluster = demo();
        cluster.resolve().unwrap();

        let mut provisioner = RecordingProvisioner::new();
        let plan = provision(&cluster, &mut provisioner).unwrap();

        let names: Vec<&str> = plan.security_groups.iter().map(|g| g.name()).collect();
        assert_eq!(names, vec!["demo", "ssh", "http"]);
        assert_eq!(plan.keypairs, vec!["demo"]);
        assert_eq!(plan.servers, vec!["demo-web-0", "demo-web-1"]);
        assert_eq!(provisioner.intents().len(), 4);
    }

    #[test]
    fn test_servers_declared_after_resolve_block_provisioning() {
        let mut cluster = demo();
        cluster.resolve().unwrap();
        cluster
            .facet("db", &SettingsTree::new())
            .unwrap()
            .instances(2);

        let mut provisioner = RecordingProvisioner::new();
        let err = provision(&cluster, &mut provisioner).unwrap_err();
        assert!(matches!(err, Error::NotResolved { .. }));
        assert!(provisioner.intents().is_empty());

        cluster.resolve().unwrap();
        let plan = provision(&cluster, &mut provisioner).unwrap();
        assert_eq!(
            plan.servers,
            vec!["demo-db-0", "demo-db-1", "demo-web-0", "demo-web-1"]
        );
    }

    #[test]
    fn test_shared_group_carries_every_facets_rules() {
        let mut cluster = demo();
        cluster
            .find_facet_mut("web")
            .unwrap()
            .cloud_mut()
            .security_group("edge", |group| {
                group.authorize_port_range(80, 80, Protocol::Tcp);
            });
        cluster
            .facet("api", &SettingsTree::new())
            .unwrap()
            .cloud_mut()
            .security_group("edge", |group| {
                group.authorize_port_range(443, 443, Protocol::Tcp);
            });
        cluster.resolve().unwrap();

        let mut provisioner = RecordingProvisioner::new();
        let plan = provision(&cluster, &mut provisioner).unwrap();

        let edge: Vec<&SecurityGroup> = plan
            .security_groups
            .iter()
            .filter(|group| group.name() == "edge")
            .collect();
        assert_eq!(edge.len(), 1);
        let ports: Vec<(u16, u16)> = edge[0]
            .authorized_ports()
            .iter()
            .map(|range| (range.from, range.to))
            .collect();
        assert_eq!(ports, vec![(80, 80), (443, 443)]);
        let sent = provisioner
            .intents()
            .iter()
            .filter(|intent| matches!(intent, ProvisionIntent::SecurityGroup { group } if group.name() == "edge"))
            .count();
        assert_eq!(sent, 1);
    }

    #[test]
    fn test_provisioner_failure_surfaces() {
        let mut cluster = demo();
        cluster.resolve().unwrap();

        let mut provisioner = RecordingProvisioner::new().fail_on("ssh");
        let err = provision(&cluster, &mut provisioner).unwrap_err();
        assert!(matches!(err, Error::Provision { ref resource, .. } if resource == "ssh"));
    }
}
