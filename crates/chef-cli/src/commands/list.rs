//! List command

use colored::Colorize;

use crate::error::Result;

/// Run the list command
pub fn run_list(loader: &chef_core::ManifestLoader) -> Result<()> {
    let registry = loader.registry()?;
    let names = registry.cluster_names();

    if names.is_empty() {
        println!("{}", "No clusters found".yellow());
        println!();
        println!("Searched:");
        for dir in loader.search_dirs() {
            println!("  {}", dir.display().to_string().dimmed());
        }
        return Ok(());
    }

    println!("{}", "Clusters".bold());
    for name in &names {
        println!("  {}", name.green());
    }
    println!();
    println!("{} {} clusters", "Total:".dimmed(), names.len());
    Ok(())
}
