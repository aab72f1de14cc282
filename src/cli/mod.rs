//! CLI interface and argument parsing
//!
//! This module provides the command-line interface for Cartograph using clap.

pub mod commands;

use clap::{Parser, Subcommand};

/// Cartograph - Neo4j to BigQuery export
#[derive(Parser, Debug)]
#[command(name = "cartograph")]
#[command(version, about, long_about = None)]
#[command(author = "Cartograph Contributors")]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "cartograph.toml", env = "CARTOGRAPH_CONFIG")]
    pub config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "CARTOGRAPH_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Export every graph category into a BigQuery dataset
    Export(commands::export::ExportArgs),

    /// Validate configuration file
    ValidateConfig(commands::validate::ValidateArgs),

    /// Initialize a new configuration file
    Init(commands::init::InitArgs),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_export() {
        let cli = Cli::parse_from(["cartograph", "export"]);
        assert_eq!(cli.config, "cartograph.toml");
        assert!(matches!(cli.command, Commands::Export(_)));
    }

    #[test]
    fn test_cli_parse_with_config() {
        let cli = Cli::parse_from(["cartograph", "--config", "custom.toml", "export"]);
        assert_eq!(cli.config, "custom.toml");
    }

    #[test]
    fn test_cli_parse_with_log_level() {
        let cli = Cli::parse_from(["cartograph", "--log-level", "debug", "export"]);
        assert_eq!(cli.log_level, Some("debug".to_string()));
    }

    #[test]
    fn test_cli_parse_export_overrides() {
        let cli = Cli::parse_from([
            "cartograph",
            "export",
            "--yes",
            "--dry-run",
            "--concurrency",
            "6",
            "--page-size",
            "2500",
            "--dataset",
            "graph_snapshot",
            "--staging-dir",
            "/data/stage",
        ]);
        let Commands::Export(args) = cli.command else {
            panic!("expected export");
        };
        assert!(args.yes && args.dry_run);
        assert_eq!(args.concurrency, Some(6));
        assert_eq!(args.page_size, Some(2500));
        assert_eq!(args.dataset.as_deref(), Some("graph_snapshot"));
        assert_eq!(args.staging_dir.as_deref(), Some("/data/stage"));
    }

    #[test]
    fn test_cli_parse_validate_config() {
        let cli = Cli::parse_from(["cartograph", "validate-config"]);
        assert!(matches!(cli.command, Commands::ValidateConfig(_)));
    }

    #[test]
    fn test_cli_parse_init() {
        let cli = Cli::parse_from(["cartograph", "init"]);
        assert!(matches!(cli.command, Commands::Init(_)));
    }
}
