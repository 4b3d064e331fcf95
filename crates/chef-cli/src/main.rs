//! cluster-chef CLI
//!
//! Loads cluster manifests, resolves them and prints what each server gets.

mod cli;
mod commands;
mod error;
mod logging;

use clap::Parser;
use colored::Colorize;

use cli::{Cli, Commands};
use error::{CliError, Result};

fn main() {
    if let Err(e) = run() {
        eprintln!("{}: {}", "error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    logging::init(cli.verbose).map_err(|e| CliError::user(format!("cannot set up logging: {e}")))?;
    tracing::debug!(paths = ?cli.paths, no_global = cli.no_global, "Starting");

    let loader = commands::manifest_loader(&cli.paths, cli.no_global);
    match cli.command {
        Commands::List => commands::run_list(&loader),
        Commands::Show {
            cluster,
            facet,
            indexes,
            json,
        } => commands::run_show(&loader, &cluster, facet.as_deref(), indexes, json),
        Commands::Plan { cluster, json } => commands::run_plan(&loader, &cluster, json),
    }
}
