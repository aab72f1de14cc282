//! Configuration schema types
//!
//! This module defines the configuration structure for Cartograph.

use crate::config::SecretString;
use serde::{Deserialize, Serialize};
use url::Url;

/// Default number of records requested per page
pub const DEFAULT_PAGE_SIZE: u64 = 10_000;

/// Default number of categories drained at once
pub const DEFAULT_CONCURRENCY: usize = 3;

/// Upper bound for the global concurrency budget
pub const MAX_CONCURRENCY: usize = 64;

/// Upper bound for the page size
pub const MAX_PAGE_SIZE: u64 = 1_000_000;

/// Runtime environment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Development environment
    #[default]
    Development,
    /// Staging environment
    Staging,
    /// Production environment
    Production,
}

/// Main Cartograph configuration
///
/// This is the root configuration structure that maps to the TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CartographConfig {
    /// Application-level settings
    #[serde(default)]
    pub application: ApplicationConfig,

    /// Runtime environment (development, staging, production)
    #[serde(default)]
    pub environment: Environment,

    /// Graph source configuration
    #[serde(default)]
    pub source: SourceConfig,

    /// Warehouse sink configuration
    #[serde(default)]
    pub sink: SinkConfig,

    /// Export settings
    #[serde(default)]
    pub export: ExportConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl CartographConfig {
    /// Validates the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid
    pub fn validate(&self) -> Result<(), String> {
        self.application.validate()?;
        self.source.validate(&self.environment)?;
        self.sink.validate(self.export.dry_run)?;
        self.export.validate()?;
        self.logging.validate()?;
        Ok(())
    }
}

/// Application-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl ApplicationConfig {
    fn validate(&self) -> Result<(), String> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.as_str()) {
            return Err(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            ));
        }
        Ok(())
    }
}

/// Retry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the first)
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    /// Initial delay in milliseconds
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    /// Maximum delay in milliseconds
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Backoff multiplier
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

impl RetryConfig {
    /// Delay before the given retry attempt (1-based), capped at `max_delay_ms`
    pub fn delay_ms(&self, attempt: usize) -> u64 {
        let factor = self
            .backoff_multiplier
            .powf(attempt.saturating_sub(1) as f64);
        let delay = (self.initial_delay_ms as f64 * factor) as u64;
        delay.min(self.max_delay_ms)
    }

    fn validate(&self, section: &str) -> Result<(), String> {
        if self.max_retries == 0 || self.max_retries > 10 {
            return Err(format!(
                "{section}.retry.max_retries must be between 1 and 10, got {}",
                self.max_retries
            ));
        }
        if self.backoff_multiplier < 1.0 {
            return Err(format!("{section}.retry.backoff_multiplier must be >= 1.0"));
        }
        Ok(())
    }
}

/// Graph source (Neo4j HTTP API) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Base URI of the Neo4j HTTP endpoint
    #[serde(default = "default_source_uri")]
    pub uri: String,

    /// Database name
    #[serde(default = "default_source_database")]
    pub database: String,

    /// Username for basic authentication
    #[serde(default = "default_source_username")]
    pub username: String,

    /// Password for basic authentication
    /// Stored securely in memory and automatically zeroized on drop
    #[serde(default)]
    pub password: Option<SecretString>,

    /// TLS certificate verification enabled
    #[serde(default = "default_true")]
    pub tls_verify: bool,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_seconds")]
    pub request_timeout_seconds: u64,

    /// Total time budget for retrying transient transaction failures
    #[serde(default = "default_max_transaction_retry_ms")]
    pub max_transaction_retry_ms: u64,

    /// Retry backoff settings
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            uri: default_source_uri(),
            database: default_source_database(),
            username: default_source_username(),
            password: None,
            tls_verify: true,
            request_timeout_seconds: default_timeout_seconds(),
            max_transaction_retry_ms: default_max_transaction_retry_ms(),
            retry: RetryConfig::default(),
        }
    }
}

impl SourceConfig {
    fn validate(&self, environment: &Environment) -> Result<(), String> {
        let url = Url::parse(&self.uri)
            .map_err(|e| format!("source.uri '{}' is not a valid URL: {e}", self.uri))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(format!(
                "source.uri must use http or https, got '{}'",
                url.scheme()
            ));
        }

        if self.database.trim().is_empty() {
            return Err("source.database cannot be empty".to_string());
        }

        if self.request_timeout_seconds == 0 {
            return Err("source.request_timeout_seconds must be > 0".to_string());
        }

        if *environment == Environment::Production && !self.tls_verify {
            return Err(
                "TLS certificate verification cannot be disabled in production".to_string(),
            );
        }

        self.retry.validate("source")
    }
}

/// Warehouse sink (BigQuery REST API) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    /// Cloud project that owns the dataset
    #[serde(default)]
    pub project_id: String,

    /// Dataset to create; a random `neo4j_export_N` name is used when absent
    #[serde(default)]
    pub dataset_name: Option<String>,

    /// Dataset location (e.g. "US", "EU")
    #[serde(default)]
    pub location: Option<String>,

    /// OAuth2 bearer token used for every API call
    /// Stored securely in memory and automatically zeroized on drop
    #[serde(default)]
    pub access_token: Option<SecretString>,

    /// REST API base URL
    #[serde(default = "default_sink_api_base_url")]
    pub api_base_url: String,

    /// Media upload base URL
    #[serde(default = "default_sink_upload_base_url")]
    pub upload_base_url: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_seconds")]
    pub request_timeout_seconds: u64,

    /// Maximum time to wait for one load job to finish
    #[serde(default = "default_load_timeout_seconds")]
    pub load_timeout_seconds: u64,

    /// Interval between load job status polls
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Retry settings for failed loads
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            project_id: String::new(),
            dataset_name: None,
            location: None,
            access_token: None,
            api_base_url: default_sink_api_base_url(),
            upload_base_url: default_sink_upload_base_url(),
            request_timeout_seconds: default_timeout_seconds(),
            load_timeout_seconds: default_load_timeout_seconds(),
            poll_interval_ms: default_poll_interval_ms(),
            retry: RetryConfig::default(),
        }
    }
}

impl SinkConfig {
    fn validate(&self, dry_run: bool) -> Result<(), String> {
        if self.project_id.trim().is_empty() {
            return Err("sink.project_id cannot be empty".to_string());
        }

        if let Some(ref name) = self.dataset_name {
            crate::domain::DatasetId::new(name.clone())
                .map_err(|e| format!("sink.dataset_name is invalid: {e}"))?;
        }

        for (field, value) in [
            ("sink.api_base_url", &self.api_base_url),
            ("sink.upload_base_url", &self.upload_base_url),
        ] {
            Url::parse(value).map_err(|e| format!("{field} '{value}' is not a valid URL: {e}"))?;
        }

        if !dry_run && self.access_token.is_none() {
            return Err("sink.access_token is required unless export.dry_run is set".to_string());
        }

        if self.load_timeout_seconds == 0 {
            return Err("sink.load_timeout_seconds must be > 0".to_string());
        }

        if self.poll_interval_ms == 0 {
            return Err("sink.poll_interval_ms must be > 0".to_string());
        }

        self.retry.validate("sink")
    }
}

/// Export settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Global concurrency budget: categories prepared and drained at once
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Records requested per page
    #[serde(default = "default_page_size")]
    pub page_size: u64,

    /// Directory receiving staged CSV batches
    #[serde(default = "default_staging_dir")]
    pub staging_dir: String,

    /// Per-page fetch timeout in seconds (0 disables it)
    #[serde(default)]
    pub page_timeout_seconds: u64,

    /// Stage batches but skip every sink write
    #[serde(default)]
    pub dry_run: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            page_size: default_page_size(),
            staging_dir: default_staging_dir(),
            page_timeout_seconds: 0,
            dry_run: false,
        }
    }
}

impl ExportConfig {
    fn validate(&self) -> Result<(), String> {
        if self.concurrency == 0 || self.concurrency > MAX_CONCURRENCY {
            return Err(format!(
                "export.concurrency must be between 1 and {MAX_CONCURRENCY}, got {}",
                self.concurrency
            ));
        }

        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(format!(
                "export.page_size must be between 1 and {MAX_PAGE_SIZE}, got {}",
                self.page_size
            ));
        }

        if self.staging_dir.trim().is_empty() {
            return Err("export.staging_dir cannot be empty".to_string());
        }

        Ok(())
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Enable local file logging
    #[serde(default = "default_true")]
    pub local_enabled: bool,

    /// Local log file path
    #[serde(default = "default_local_path")]
    pub local_path: String,

    /// Log rotation strategy
    #[serde(default = "default_local_rotation")]
    pub local_rotation: String,
}

impl LoggingConfig {
    fn validate(&self) -> Result<(), String> {
        let valid_rotations = ["daily", "hourly"];
        if !valid_rotations.contains(&self.local_rotation.as_str()) {
            return Err(format!(
                "Invalid logging.local_rotation '{}'. Must be one of: {}",
                self.local_rotation,
                valid_rotations.join(", ")
            ));
        }

        if self.local_enabled && self.local_path.trim().is_empty() {
            return Err("logging.local_path cannot be empty when file logging is enabled".into());
        }

        Ok(())
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            local_enabled: true,
            local_path: default_local_path(),
            local_rotation: default_local_rotation(),
        }
    }
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_source_uri() -> String {
    "http://localhost:7474".to_string()
}

fn default_source_database() -> String {
    "neo4j".to_string()
}

fn default_source_username() -> String {
    "neo4j".to_string()
}

fn default_timeout_seconds() -> u64 {
    60
}

fn default_max_transaction_retry_ms() -> u64 {
    30_000
}

fn default_initial_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    30000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_max_retries() -> usize {
    3
}

fn default_sink_api_base_url() -> String {
    "https://bigquery.googleapis.com/bigquery/v2".to_string()
}

fn default_sink_upload_base_url() -> String {
    "https://bigquery.googleapis.com/upload/bigquery/v2".to_string()
}

fn default_load_timeout_seconds() -> u64 {
    600
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

fn default_page_size() -> u64 {
    DEFAULT_PAGE_SIZE
}

fn default_staging_dir() -> String {
    "/tmp/csv".to_string()
}

fn default_local_path() -> String {
    "/var/log/cartograph".to_string()
}

fn default_local_rotation() -> String {
    "daily".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::secret_string;

    fn valid_config() -> CartographConfig {
        let mut config = CartographConfig::default();
        config.sink.project_id = "my-project".to_string();
        config.sink.access_token = Some(secret_string("token".to_string()));
        config
    }

    #[test]
    fn test_default_config_needs_project() {
        let config = CartographConfig::default();
        let err = config.validate().unwrap_err();
        assert!(err.contains("sink.project_id"));
    }

    #[test]
    fn test_valid_config() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_application_config_validation() {
        let mut config = ApplicationConfig::default();
        assert!(config.validate().is_ok());

        config.log_level = "invalid".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_export_config_validation() {
        let mut config = ExportConfig::default();
        assert!(config.validate().is_ok());

        config.concurrency = 0;
        assert!(config.validate().is_err());

        config.concurrency = MAX_CONCURRENCY + 1;
        assert!(config.validate().is_err());

        config.concurrency = 3;
        config.page_size = 0;
        assert!(config.validate().is_err());

        config.page_size = 500;
        config.staging_dir = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_source_uri_must_be_http() {
        let mut config = SourceConfig::default();
        assert!(config.validate(&Environment::Development).is_ok());

        config.uri = "bolt://localhost:7687".to_string();
        assert!(config.validate(&Environment::Development).is_err());

        config.uri = "not a url".to_string();
        assert!(config.validate(&Environment::Development).is_err());
    }

    #[test]
    fn test_source_tls_verification_in_production() {
        let config = SourceConfig {
            tls_verify: false,
            ..Default::default()
        };

        let result = config.validate(&Environment::Production);
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .contains("TLS certificate verification cannot be disabled in production"));

        assert!(config.validate(&Environment::Development).is_ok());
        assert!(config.validate(&Environment::Staging).is_ok());
    }

    #[test]
    fn test_sink_token_optional_in_dry_run() {
        let mut config = valid_config();
        config.sink.access_token = None;
        assert!(config.validate().is_err());

        config.export.dry_run = true;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_sink_dataset_name_validated() {
        let mut config = valid_config();
        config.sink.dataset_name = Some("graph-export".to_string());
        assert!(config.validate().is_err());

        config.sink.dataset_name = Some("graph_export".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_retry_delay_backoff() {
        let retry = RetryConfig {
            max_retries: 5,
            initial_delay_ms: 100,
            max_delay_ms: 1000,
            backoff_multiplier: 2.0,
        };
        assert_eq!(retry.delay_ms(1), 100);
        assert_eq!(retry.delay_ms(2), 200);
        assert_eq!(retry.delay_ms(3), 400);
        assert_eq!(retry.delay_ms(5), 1000);
    }

    #[test]
    fn test_logging_config_default() {
        let config = LoggingConfig::default();
        assert!(config.local_enabled);
        assert_eq!(config.local_path, "/var/log/cartograph");
        assert_eq!(config.local_rotation, "daily");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_values() {
        assert_eq!(default_log_level(), "info");
        assert_eq!(default_concurrency(), 3);
        assert_eq!(default_page_size(), 10_000);
        assert_eq!(default_staging_dir(), "/tmp/csv");
        assert_eq!(default_max_transaction_retry_ms(), 30_000);
        assert_eq!(default_max_retries(), 3);
    }
}
