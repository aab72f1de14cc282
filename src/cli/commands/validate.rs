//! Validate config command implementation
//!
//! This module implements the `validate-config` command for validating
//! the Cartograph configuration file.

use crate::config::{load_config, mask, CartographConfig};
use clap::Args;

/// Arguments for the validate-config command
#[derive(Args, Debug)]
pub struct ValidateArgs {}

impl ValidateArgs {
    /// Execute the validate-config command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(config_path = %config_path, "Validating configuration");

        println!("🔍 Validating configuration file: {config_path}");
        println!();

        // load_config validates as well
        match load_config(config_path) {
            Ok(config) => {
                println!("✅ Configuration is valid");
                println!();
                for line in summary_lines(&config) {
                    println!("{line}");
                }
                println!();
                Ok(0)
            }
            Err(e) => {
                println!("❌ Configuration validation failed");
                println!("   Error: {e}");
                println!();
                Ok(2)
            }
        }
    }
}

/// Human-readable summary; credentials are masked
fn summary_lines(config: &CartographConfig) -> Vec<String> {
    let password = config
        .source
        .password
        .as_ref()
        .map(mask)
        .unwrap_or_else(|| "(none)".to_string());
    let token = config
        .sink
        .access_token
        .as_ref()
        .map(mask)
        .unwrap_or_else(|| "(none)".to_string());

    vec![
        "Configuration Summary:".to_string(),
        format!("  Environment: {:?}", config.environment),
        format!("  Log Level: {}", config.application.log_level),
        format!("  Neo4j URI: {}", config.source.uri),
        format!("  Neo4j Database: {}", config.source.database),
        format!("  Neo4j User: {}", config.source.username),
        format!("  Neo4j Password: {password}"),
        format!("  BigQuery Project: {}", config.sink.project_id),
        format!(
            "  BigQuery Dataset: {}",
            config.sink.dataset_name.as_deref().unwrap_or("(generated)")
        ),
        format!("  BigQuery Token: {token}"),
        format!("  Concurrency: {}", config.export.concurrency),
        format!("  Page Size: {}", config.export.page_size),
        format!("  Staging Dir: {}", config.export.staging_dir),
        format!("  Dry Run: {}", config.export.dry_run),
    ]
}
