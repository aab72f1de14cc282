//! Init command implementation
//!
//! This module implements the `init` command for generating a sample
//! configuration file.

use clap::Args;
use std::fs;
use std::path::Path;

/// Arguments for the init command
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Path where to create the configuration file
    #[arg(short, long, default_value = "cartograph.toml")]
    pub output: String,

    /// Include example values and comments
    #[arg(long)]
    pub with_examples: bool,

    /// Overwrite existing file
    #[arg(long)]
    pub force: bool,
}

impl InitArgs {
    /// Execute the init command
    pub async fn execute(&self) -> anyhow::Result<i32> {
        tracing::info!(output = %self.output, "Initializing configuration file");

        println!("📝 Initializing Cartograph configuration");
        println!();

        if Path::new(&self.output).exists() && !self.force {
            println!("❌ Configuration file already exists: {}", self.output);
            println!("   Use --force to overwrite");
            return Ok(2);
        }

        let config_content = if self.with_examples {
            Self::generate_config_with_examples()
        } else {
            Self::generate_minimal_config()
        };

        match fs::write(&self.output, config_content) {
            Ok(_) => {
                println!("✅ Configuration file created: {}", self.output);
                println!();
                println!("Next steps:");
                println!("  1. Edit {} with your settings", self.output);
                println!("  2. Create a .env file with your credentials:");
                println!("     - NEO4J_PASSWORD for the graph source");
                println!("     - GOOGLE_OAUTH_ACCESS_TOKEN for BigQuery");
                println!("  3. Validate configuration: cartograph validate-config");
                println!("  4. Try a dry run: cartograph export --dry-run");
                println!("  5. Run export: cartograph export");
                println!();
                Ok(0)
            }
            Err(e) => {
                println!("❌ Failed to write configuration file");
                println!("   Error: {e}");
                Ok(5)
            }
        }
    }

    /// Generate minimal configuration
    fn generate_minimal_config() -> String {
        r#"# Cartograph Configuration File
# Neo4j to BigQuery batch export

environment = "development"

[application]
log_level = "info"

[source]
uri = "http://localhost:7474"
database = "neo4j"
username = "neo4j"
password = "${NEO4J_PASSWORD}"
tls_verify = true

[sink]
project_id = "my-gcp-project"
# dataset_name = "graph_snapshot"
access_token = "${GOOGLE_OAUTH_ACCESS_TOKEN}"

[export]
concurrency = 3
page_size = 10000
staging_dir = "/tmp/csv"
dry_run = false

[logging]
local_enabled = true
local_path = "/var/log/cartograph"
local_rotation = "daily"
"#
        .to_string()
    }

    /// Generate configuration with examples and comments
    fn generate_config_with_examples() -> String {
        r#"# Cartograph Configuration File
# Neo4j to BigQuery batch export
#
# Every node label combination and every (from, type, to) relationship shape
# is exported into its own BigQuery table. Values of the form ${VAR} are read
# from the environment; CARTOGRAPH_<SECTION>_<KEY> variables override any key.

# development | staging | production
# TLS verification cannot be disabled in production
environment = "development"

# ============================================================================
# Application Settings
# ============================================================================
[application]
# trace | debug | info | warn | error
log_level = "info"

# ============================================================================
# Graph Source (Neo4j HTTP API)
# ============================================================================
[source]
# Base URI of the HTTP endpoint; statements go to {uri}/db/{database}/tx/commit
uri = "http://localhost:7474"
database = "neo4j"

# Basic authentication (legacy NEO4J_USERNAME / NEO4J_PASSWORD also work)
username = "neo4j"
password = "${NEO4J_PASSWORD}"

tls_verify = true
request_timeout_seconds = 60

# Budget for retrying Neo.TransientError and connection failures
max_transaction_retry_ms = 30000

[source.retry]
max_retries = 3
initial_delay_ms = 1000
max_delay_ms = 30000
backoff_multiplier = 2.0

# ============================================================================
# Warehouse Sink (BigQuery REST API)
# ============================================================================
[sink]
# Legacy PROJECT also works
project_id = "my-gcp-project"

# Omit to create a fresh neo4j_export_<N> dataset on every run
# dataset_name = "graph_snapshot"
# location = "US"

# OAuth access token, e.g. from `gcloud auth print-access-token`
access_token = "${GOOGLE_OAUTH_ACCESS_TOKEN}"

request_timeout_seconds = 60

# How long to wait for a load job to reach DONE
load_timeout_seconds = 600
poll_interval_ms = 1000

# Failed load jobs are retried, then the category stops
[sink.retry]
max_retries = 3
initial_delay_ms = 1000
max_delay_ms = 30000
backoff_multiplier = 2.0

# ============================================================================
# Export Settings
# ============================================================================
[export]
# Categories exported at once; pages within a category are always sequential
concurrency = 3

# Entities fetched per page and loaded per batch
page_size = 10000

# One CSV file per batch: {staging_dir}/{table}-batch-{n}.csv (kept after the run)
staging_dir = "/tmp/csv"

# Per-page deadline; 0 disables it
page_timeout_seconds = 0

# Stage CSV files but skip every BigQuery call
dry_run = false

# ============================================================================
# Logging
# ============================================================================
[logging]
# JSON log files next to console output
local_enabled = true
local_path = "/var/log/cartograph"

# daily | hourly
local_rotation = "daily"
"#
        .to_string()
    }
}
