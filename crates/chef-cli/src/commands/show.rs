//! Show command: resolve a cluster and print the selected servers

use chef_core::{ResolvedServer, SliceIndexes};
use chef_settings::{CHEF_ATTRIBUTES_KEY, RUN_LIST_KEY};
use colored::Colorize;

use crate::error::Result;

/// Run the show command
pub fn run_show(
    loader: &chef_core::ManifestLoader,
    cluster_name: &str,
    facet: Option<&str>,
    indexes: Option<SliceIndexes>,
    json: bool,
) -> Result<()> {
    let registry = loader.registry()?;
    tracing::debug!(cluster = cluster_name, ?facet, "Resolving cluster for display");
    let cluster = registry.resolve_cluster(cluster_name)?;
    let slice = cluster.slice(facet, indexes)?;
    let servers = slice.resolved();

    if json {
        println!("{}", serde_json::to_string_pretty(&servers)?);
        return Ok(());
    }

    println!(
        "{} {} ({} servers)",
        "Cluster".bold(),
        cluster.name().cyan().bold(),
        servers.len()
    );
    for server in servers {
        print_server(server)?;
    }
    Ok(())
}

fn print_server(server: &ResolvedServer) -> Result<()> {
    println!();
    println!("  {}", server.fullname.green().bold());
    println!("    {:<16} {}", "run_list:".dimmed(), server.run_list()?.join(", "));

    for (key, value) in &server.settings {
        if key == RUN_LIST_KEY || key == CHEF_ATTRIBUTES_KEY {
            continue;
        }
        println!("    {:<16} {}", format!("{key}:").dimmed(), value);
    }

    let groups: Vec<&str> = server.cloud.security_groups().keys().map(String::as_str).collect();
    println!("    {:<16} {}", "security_groups:".dimmed(), groups.join(", "));
    if let Some(keypair) = server.cloud.keypair() {
        println!("    {:<16} {}", "keypair:".dimmed(), keypair);
    }
    Ok(())
}
