//! End-to-end integration test across the workspace
//!
//! Exercises the complete flow: manifests on disk -> registry -> use ->
//! resolve -> slice -> provisioning plan.

use chef_core::{
    Cluster, ClusterRegistry, ClusterSource, ManifestLoader, ProvisionIntent, RecordingProvisioner, SliceIndexes,
    provision,
};
use chef_settings::{Protocol, SettingValue, SettingsTree};
use pretty_assertions::assert_eq;
use std::fs;
use tempfile::TempDir;

/// Write a small estate of clusters into a temporary directory
fn setup_clusters() -> TempDir {
    let temp = TempDir::new().unwrap();
    fs::write(
        temp.path().join("org.toml"),
        r#"
[cluster]
name = "org"
recipes = ["users"]

[cluster.settings]
image_name = "natty"
flavor = "t1.micro"

[cluster.cloud]
provider = "ec2"
security_groups = ["ssh"]
"#,
    )
    .unwrap();
    fs::write(
        temp.path().join("hadoop.toml"),
        r#"
[cluster]
name = "hadoop"
use = ["org"]
roles = ["hadoop"]

[cluster.chef_attributes.hadoop]
heap_size = 1024

[facets.master]
roles = ["namenode", "jobtracker"]

[facets.master.settings]
flavor = "m1.large"

[facets.worker]
instances = 4
roles = ["datanode", "tasktracker"]

[facets.worker.chef_attributes.hadoop]
heap_size = 2048
"#,
    )
    .unwrap();
    temp
}

#[test]
fn test_full_flow_from_manifests() {
    let temp = setup_clusters();
    let registry = ManifestLoader::new(vec![temp.path().to_path_buf()])
        .without_global()
        .registry()
        .unwrap();

    let hadoop = registry.resolve_cluster("hadoop").unwrap();
    assert_eq!(hadoop.facet_names(), vec!["master", "worker"]);

    // Master: facet flavor beats the inherited org flavor
    let master = hadoop.slice(Some("master"), SliceIndexes::All).unwrap().resolved()[0].clone();
    assert_eq!(master.fullname, "hadoop-master-0");
    assert_eq!(master.get("flavor"), Some(&SettingValue::from("m1.large")));
    assert_eq!(master.get("image_name"), Some(&SettingValue::from("natty")));
    assert_eq!(
        master.run_list().unwrap(),
        vec![
            "role[namenode]",
            "role[jobtracker]",
            "role[hadoop_cluster]",
            "role[org_cluster]",
            "recipe[users]",
            "role[hadoop]",
        ]
    );

    // Workers: attributes merge recursively, facet wins
    let workers = hadoop.slice(Some("worker"), 1usize..=2).unwrap();
    assert_eq!(workers.fullnames(), vec!["hadoop-worker-1", "hadoop-worker-2"]);
    for record in workers.resolved() {
        assert_eq!(record.get("flavor"), Some(&SettingValue::from("t1.micro")));
        assert_eq!(
            record.settings.get_path("chef_attributes.hadoop.heap_size").and_then(SettingValue::as_i64),
            Some(2048)
        );
    }

    // Provisioning plan
    let mut provisioner = RecordingProvisioner::new();
    let plan = provision(&hadoop, &mut provisioner).unwrap();
    let groups: Vec<&str> = plan.security_groups.iter().map(|g| g.name()).collect();
    assert_eq!(groups, vec!["hadoop", "ssh"]);
    assert_eq!(plan.keypairs, vec!["hadoop"]);
    assert_eq!(plan.servers.len(), 5);
    assert!(provisioner
        .intents()
        .contains(&ProvisionIntent::Keypair { name: "hadoop".to_string() }));
}

#[test]
fn test_programmatic_and_manifest_clusters_share_a_registry() {
    let temp = setup_clusters();
    let registry = ManifestLoader::new(vec![temp.path().to_path_buf()])
        .without_global()
        .registry()
        .unwrap();

    let sandbox = registry
        .get_or_create("sandbox", |cluster| {
            cluster.use_clusters(&registry, ["org"])?;
            cluster.set("flavor", "m1.small");
            cluster
                .facet("shell", &SettingsTree::new())?
                .cloud_mut()
                .security_group("shell", |group| {
                    group.authorize_port_range(22, 22, Protocol::Tcp);
                });
            Ok(())
        })
        .unwrap();

    assert_eq!(registry.cluster_names(), vec!["hadoop", "org", "sandbox"]);
    assert_eq!(sandbox.used_clusters(), ["org"]);
    assert!(Cluster::clone(&sandbox).resolve().is_ok());

    let mut resolved = registry.resolve_cluster("sandbox").unwrap();
    let record = resolved.resolved_servers()[0].clone();
    assert_eq!(record.get("flavor"), Some(&SettingValue::from("m1.small")));
    assert!(record.cloud.has_security_group("shell"));
    assert!(record.cloud.has_security_group("ssh"));

    // Resolving again gives the same records
    resolved.resolve().unwrap();
    assert_eq!(resolved.resolved_servers()[0], &record);
}

#[test]
fn test_resolved_records_serialize_to_json() {
    let registry = ClusterRegistry::new();
    let demo = registry
        .get_or_create("demo", |cluster| {
            cluster.set("region", "us-east-1");
            cluster
                .facet("web", &SettingsTree::new().with("instance_type", "m1.small"))?
                .instances(2);
            Ok(())
        })
        .unwrap();
    let mut demo = Cluster::clone(&demo);
    demo.resolve().unwrap();

    let json = serde_json::to_value(demo.resolved_servers()).unwrap();
    assert_eq!(json[1]["fullname"], "demo-web-1");
    assert_eq!(json[1]["settings"]["region"], "us-east-1");
    assert_eq!(json[1]["settings"]["run_list"], serde_json::json!(["role[demo_cluster]"]));
    assert_eq!(json[1]["cloud"]["keypair"], "demo");
    assert!(registry.load_cluster("demo").is_ok());
}
