//! Configuration management for Cartograph.
//!
//! This module provides TOML-based configuration loading, parsing, and validation.
//!
//! # Overview
//!
//! Cartograph reads a TOML configuration file with support for:
//! - Environment variable substitution (`${VAR_NAME}`)
//! - Default values for every optional setting (a missing file means "all defaults")
//! - `CARTOGRAPH_*` environment overrides, plus the legacy `NEO4J_URI`,
//!   `NEO4J_USERNAME`, `NEO4J_PASSWORD`, `PROJECT` and `CONCURRENCY` variables
//! - Validation of every section before an export starts
//!
//! # Configuration Structure
//!
//! - [`ApplicationConfig`] - Log level
//! - [`SourceConfig`] - Neo4j HTTP endpoint, credentials, timeouts and retries
//! - [`SinkConfig`] - BigQuery project, dataset, token, load timeouts and retries
//! - [`ExportConfig`] - Concurrency budget, page size, staging directory, dry run
//! - [`LoggingConfig`] - File logging
//!
//! # Example Configuration
//!
//! ```toml
//! [source]
//! uri = "http://localhost:7474"
//! username = "neo4j"
//! password = "${NEO4J_PASSWORD}"
//!
//! [sink]
//! project_id = "analytics-prod"
//! access_token = "${GOOGLE_OAUTH_ACCESS_TOKEN}"
//!
//! [export]
//! concurrency = 3
//! page_size = 10000
//! staging_dir = "/tmp/csv"
//! ```

pub mod loader;
pub mod schema;
pub mod secret;

// Re-export commonly used types
pub use loader::load_config;
pub use schema::{
    ApplicationConfig, CartographConfig, Environment, ExportConfig, LoggingConfig, RetryConfig,
    SinkConfig, SourceConfig,
};
pub use secret::{mask, secret_string, secret_string_opt, SecretString, SecretValue};
