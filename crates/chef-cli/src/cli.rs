//! CLI argument parsing using clap derive

use std::path::PathBuf;

use chef_core::SliceIndexes;
use clap::{Parser, Subcommand};

/// cluster-chef - Resolve cluster definitions into per-server configuration
#[derive(Parser, Debug)]
#[command(name = "cluster-chef")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Directory of cluster manifests; repeat to search several, first wins
    ///
    /// Defaults to ./clusters when not given.
    #[arg(short = 'p', long = "path", global = true, env = "CLUSTER_CHEF_PATH")]
    pub paths: Vec<PathBuf>,

    /// Do not search the global clusters directory
    #[arg(long, global = true)]
    pub no_global: bool,

    /// The command to run
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// List every cluster found in the manifest directories
    List,

    /// Resolve a cluster and show its servers
    ///
    /// Examples:
    ///   cluster-chef show demo              # every server
    ///   cluster-chef show demo web          # the web facet
    ///   cluster-chef show demo web 0-1,3    # selected web servers
    Show {
        /// Cluster name
        cluster: String,

        /// Facet to narrow to
        facet: Option<String>,

        /// Server indexes within the facet, e.g. "0-2,5"
        indexes: Option<SliceIndexes>,

        /// Output resolved records as JSON for scripting
        #[arg(long)]
        json: bool,
    },

    /// Show the security groups and keypairs a cluster needs
    Plan {
        /// Cluster name
        cluster: String,

        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_show_with_indexes() {
        let cli = Cli::try_parse_from(["cluster-chef", "show", "demo", "web", "0-1,3", "--json"]).unwrap();
        assert_eq!(
            cli.command,
            Commands::Show {
                cluster: "demo".to_string(),
                facet: Some("web".to_string()),
                indexes: Some(SliceIndexes::List(vec![0, 1, 3])),
                json: true,
            }
        );
    }

    #[test]
    fn parse_repeated_paths() {
        let cli = Cli::try_parse_from(["cluster-chef", "-p", "a", "--path", "b", "list"]).unwrap();
        assert_eq!(cli.paths, vec![PathBuf::from("a"), PathBuf::from("b")]);
        assert!(!cli.no_global);
    }

    #[test]
    fn parse_rejects_bad_indexes() {
        assert!(Cli::try_parse_from(["cluster-chef", "show", "demo", "web", "x"]).is_err());
    }
}
