//! Plan command: the cloud resources a cluster needs

use chef_core::{RecordingProvisioner, provision};
use colored::Colorize;

use crate::error::Result;

/// Run the plan command
///
/// Nothing is created; intents go to a [`RecordingProvisioner`].
pub fn run_plan(loader: &chef_core::ManifestLoader, cluster_name: &str, json: bool) -> Result<()> {
    let registry = loader.registry()?;
    let cluster = registry.resolve_cluster(cluster_name)?;

    let mut provisioner = RecordingProvisioner::new();
    let plan = provision(&cluster, &mut provisioner)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(());
    }

    println!("{} {}", "Provisioning plan for".bold(), plan.cluster.cyan().bold());
    println!();

    println!("{}:", "Security groups".bold());
    for group in &plan.security_groups {
        let mut grants: Vec<String> = group
            .authorized_groups()
            .iter()
            .map(|g| format!("group {g}"))
            .collect();
        grants.extend(group.authorized_ports().iter().map(|p| format!("ports {p}")));
        if grants.is_empty() {
            println!("  {} {}", "+".green(), group.name().cyan());
        } else {
            println!("  {} {} ({})", "+".green(), group.name().cyan(), grants.join(", ").dimmed());
        }
    }
    println!();

    println!("{}:", "Keypairs".bold());
    for keypair in &plan.keypairs {
        println!("  {} {}", "+".green(), keypair.cyan());
    }
    println!();

    println!("{} {} servers", "Covers:".dimmed(), plan.servers.len());
    Ok(())
}
