//! Cloud resource descriptors
//!
//! A [`CloudSpec`] records provisioning *intent*: which keypair a node uses,
//! which security groups must exist and what they authorize, plus free-form
//! provider attributes and discovery tags. Nothing here talks to a cloud API;
//! a provisioner reads the finalized spec after resolution.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::tree::SettingsTree;

/// Network protocol for a port authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Tcp,
    Udp,
    Icmp,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp => write!(f, "tcp"),
            Self::Udp => write!(f, "udp"),
            Self::Icmp => write!(f, "icmp"),
        }
    }
}

/// An inclusive port range opened to the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PortRange {
    pub from: u16,
    pub to: u16,
    #[serde(default)]
    pub protocol: Protocol,
}

impl fmt::Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.from == self.to {
            write!(f, "{}/{}", self.from, self.protocol)
        } else {
            write!(f, "{}-{}/{}", self.from, self.to, self.protocol)
        }
    }
}

/// A named security group and the traffic it authorizes.
///
/// Authorizations are sets, so authorizing the same group or port range
/// twice leaves the group unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityGroup {
    name: String,
    #[serde(default)]
    authorized_groups: BTreeSet<String>,
    #[serde(default)]
    authorized_ports: BTreeSet<PortRange>,
}

impl SecurityGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            authorized_groups: BTreeSet::new(),
            authorized_ports: BTreeSet::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Allow all traffic from members of another group.
    pub fn authorize_group(&mut self, group: impl Into<String>) -> &mut Self {
        self.authorized_groups.insert(group.into());
        self
    }

    /// Open an inclusive port range.
    pub fn authorize_port_range(&mut self, from: u16, to: u16, protocol: Protocol) -> &mut Self {
        let (from, to) = if from <= to { (from, to) } else { (to, from) };
        self.authorized_ports.insert(PortRange { from, to, protocol });
        self
    }

    pub fn authorized_groups(&self) -> &BTreeSet<String> {
        &self.authorized_groups
    }

    pub fn authorized_ports(&self) -> &BTreeSet<PortRange> {
        &self.authorized_ports
    }

    pub fn authorizes_group(&self, group: &str) -> bool {
        self.authorized_groups.contains(group)
    }

    /// Add every authorization of `other` to this group.
    ///
    /// The name is left as is; callers decide which groups are the same.
    pub fn merge_authorizations(&mut self, other: &SecurityGroup) -> &mut Self {
        self.authorized_groups
            .extend(other.authorized_groups.iter().cloned());
        self.authorized_ports.extend(other.authorized_ports.iter().copied());
        self
    }
}

/// Per-entity cloud resource descriptor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CloudSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    keypair: Option<String>,
    #[serde(default)]
    security_groups: BTreeMap<String, SecurityGroup>,
    #[serde(default)]
    attributes: SettingsTree,
    #[serde(default)]
    tags: BTreeMap<String, String>,
}

impl CloudSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn provider(&self) -> Option<&str> {
        self.provider.as_deref()
    }

    pub fn set_provider(&mut self, provider: impl Into<String>) -> &mut Self {
        self.provider = Some(provider.into());
        self
    }

    pub fn keypair(&self) -> Option<&str> {
        self.keypair.as_deref()
    }

    pub fn set_keypair(&mut self, keypair: impl Into<String>) -> &mut Self {
        self.keypair = Some(keypair.into());
        self
    }

    /// Ensure a security group is declared and apply `configure` to it.
    ///
    /// Declaring a group that already exists reuses it, so repeated calls do
    /// not duplicate provisioning intent.
    pub fn security_group<F>(&mut self, name: &str, configure: F) -> &mut SecurityGroup
    where
        F: FnOnce(&mut SecurityGroup),
    {
        let group = self
            .security_groups
            .entry(name.to_string())
            .or_insert_with(|| {
                tracing::debug!(group = name, "Declaring security group");
                SecurityGroup::new(name)
            });
        configure(&mut *group);
        group
    }

    pub fn security_groups(&self) -> &BTreeMap<String, SecurityGroup> {
        &self.security_groups
    }

    pub fn find_security_group(&self, name: &str) -> Option<&SecurityGroup> {
        self.security_groups.get(name)
    }

    pub fn has_security_group(&self, name: &str) -> bool {
        self.security_groups.contains_key(name)
    }

    /// Provider-specific attributes (image, flavor, availability zone...).
    pub fn attributes(&self) -> &SettingsTree {
        &self.attributes
    }

    pub fn attributes_mut(&mut self) -> &mut SettingsTree {
        &mut self.attributes
    }

    pub fn tags(&self) -> &BTreeMap<String, String> {
        &self.tags
    }

    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    pub fn set_tag(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Fill every unset slot from `other`; nothing already set is replaced.
    ///
    /// Security groups and tags are filled by name. Provider attributes use
    /// [`SettingsTree::reverse_merge`], so a shape mismatch there is an error.
    pub fn reverse_merge(&mut self, other: &CloudSpec) -> Result<()> {
        let mut attributes = self.attributes.clone();
        attributes.reverse_merge(&other.attributes)?;
        self.attributes = attributes;

        if self.provider.is_none() {
            self.provider.clone_from(&other.provider);
        }
        if self.keypair.is_none() {
            self.keypair.clone_from(&other.keypair);
        }
        for (name, group) in &other.security_groups {
            self.security_groups
                .entry(name.clone())
                .or_insert_with(|| group.clone());
        }
        for (key, value) in &other.tags {
            self.tags.entry(key.clone()).or_insert_with(|| value.clone());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_security_group_is_declared_once() {
        let mut cloud = CloudSpec::new();
        cloud.security_group("demo", |g| {
            g.authorize_group("demo");
        });
        cloud.security_group("demo", |g| {
            g.authorize_group("demo");
        });

        assert_eq!(cloud.security_groups().len(), 1);
        let group = cloud.find_security_group("demo").unwrap();
        assert_eq!(group.authorized_groups().len(), 1);
        assert!(group.authorizes_group("demo"));
    }

    #[test]
    fn test_merge_authorizations_is_a_union() {
        let mut web = SecurityGroup::new("edge");
        web.authorize_port_range(80, 80, Protocol::Tcp)
            .authorize_group("lb");
        let mut api = SecurityGroup::new("edge");
        api.authorize_port_range(443, 443, Protocol::Tcp)
            .authorize_group("lb");

        web.merge_authorizations(&api);

        let ports: Vec<String> = web.authorized_ports().iter().map(ToString::to_string).collect();
        assert_eq!(ports, vec!["80/tcp", "443/tcp"]);
        assert_eq!(web.authorized_groups().len(), 1);
        assert_eq!(api.authorized_ports().len(), 1);
    }

    #[test]
    fn test_port_range_is_normalized() {
        let mut group = SecurityGroup::new("web");
        group.authorize_port_range(443, 80, Protocol::Tcp);

        let range = group.authorized_ports().iter().next().unwrap();
        assert_eq!((range.from, range.to), (80, 443));
        assert_eq!(range.to_string(), "80-443/tcp");
    }

    #[test]
    fn test_reverse_merge_only_fills_unset_slots() {
        let mut mine = CloudSpec::new();
        mine.set_keypair("mine");
        mine.security_group("shared", |g| {
            g.authorize_group("mine");
        });

        let mut theirs = CloudSpec::new();
        theirs.set_keypair("theirs").set_provider("ec2");
        theirs.security_group("shared", |g| {
            g.authorize_group("theirs");
        });
        theirs.security_group("ssh", |g| {
            g.authorize_port_range(22, 22, Protocol::Tcp);
        });

        mine.reverse_merge(&theirs).unwrap();

        assert_eq!(mine.keypair(), Some("mine"));
        assert_eq!(mine.provider(), Some("ec2"));
        assert!(mine.find_security_group("shared").unwrap().authorizes_group("mine"));
        assert!(!mine.find_security_group("shared").unwrap().authorizes_group("theirs"));
        assert!(mine.has_security_group("ssh"));
    }
}
