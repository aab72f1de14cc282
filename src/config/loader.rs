//! Configuration loader with TOML parsing and environment variable overrides

use super::schema::CartographConfig;
use super::secret::secret_string;
use crate::domain::errors::CartographError;
use crate::domain::result::Result;
use regex::Regex;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

/// Loads configuration from a TOML file
///
/// This function:
/// 1. Reads the TOML file, or starts from defaults when it does not exist
/// 2. Performs environment variable substitution (`${VAR}` syntax)
/// 3. Parses the TOML into [`CartographConfig`]
/// 4. Applies environment variable overrides (`CARTOGRAPH_*` and legacy names)
/// 5. Validates the configuration
///
/// # Errors
///
/// Returns an error if:
/// - The file exists but cannot be read
/// - TOML parsing fails
/// - A referenced `${VAR}` is not set
/// - Configuration validation fails
///
/// # Examples
///
/// ```no_run
/// use cartograph::config::loader::load_config;
///
/// let config = load_config("cartograph.toml").expect("Failed to load config");
/// ```
pub fn load_config(path: impl AsRef<Path>) -> Result<CartographConfig> {
    let mut config = read_config(path)?;

    // Apply environment variable overrides
    apply_env_overrides(&mut config)?;

    // Validate configuration
    config.validate().map_err(|e| {
        CartographError::Configuration(format!("Configuration validation failed: {}", e))
    })?;

    Ok(config)
}

/// Reads and parses the file without applying overrides or validation
pub fn read_config(path: impl AsRef<Path>) -> Result<CartographConfig> {
    let path = path.as_ref();

    if !path.exists() {
        tracing::info!(
            path = %path.display(),
            "Configuration file not found, using defaults and environment"
        );
        return Ok(CartographConfig::default());
    }

    let contents = fs::read_to_string(path).map_err(|e| {
        CartographError::Configuration(format!(
            "Failed to read configuration file {}: {}",
            path.display(),
            e
        ))
    })?;

    let contents = substitute_env_vars(&contents)?;

    toml::from_str(&contents)
        .map_err(|e| CartographError::Configuration(format!("Failed to parse TOML: {}", e)))
}

fn placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").expect("placeholder pattern is valid")
    })
}

/// Substitutes environment variables in the format ${VAR_NAME}
///
/// Comment lines are copied through untouched.
///
/// # Errors
///
/// Returns an error naming every referenced variable that is not set
fn substitute_env_vars(input: &str) -> Result<String> {
    let re = placeholder_regex();
    let mut result = String::with_capacity(input.len());
    let mut missing_vars: Vec<String> = Vec::new();

    for line in input.lines() {
        if line.trim_start().starts_with('#') {
            result.push_str(line);
            result.push('\n');
            continue;
        }

        let processed = re.replace_all(line, |caps: &regex::Captures<'_>| {
            let var_name = &caps[1];
            match std::env::var(var_name) {
                Ok(value) => value,
                Err(_) => {
                    if !missing_vars.iter().any(|v| v == var_name) {
                        missing_vars.push(var_name.to_string());
                    }
                    String::new()
                }
            }
        });
        result.push_str(&processed);
        result.push('\n');
    }

    if !missing_vars.is_empty() {
        return Err(CartographError::Configuration(format!(
            "Missing required environment variables: {}",
            missing_vars.join(", ")
        )));
    }

    Ok(result)
}

fn env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Result<Option<T>> {
    match env(name) {
        Some(raw) => raw.parse().map(Some).map_err(|_| {
            CartographError::Configuration(format!("{name} has an invalid value '{raw}'"))
        }),
        None => Ok(None),
    }
}

/// Applies environment variable overrides
///
/// Variables follow the pattern `CARTOGRAPH_<SECTION>_<KEY>`, for example
/// `CARTOGRAPH_SOURCE_URI` or `CARTOGRAPH_EXPORT_PAGE_SIZE`. The short legacy names
/// `NEO4J_URI`, `NEO4J_USERNAME`, `NEO4J_PASSWORD`, `PROJECT` and `CONCURRENCY`
/// are honoured too, with the prefixed form taking precedence.
fn apply_env_overrides(config: &mut CartographConfig) -> Result<()> {
    if let Some(val) = env("CARTOGRAPH_APPLICATION_LOG_LEVEL") {
        config.application.log_level = val;
    }

    // Source overrides
    if let Some(val) = env("CARTOGRAPH_SOURCE_URI").or_else(|| env("NEO4J_URI")) {
        config.source.uri = val;
    }
    if let Some(val) = env("CARTOGRAPH_SOURCE_DATABASE") {
        config.source.database = val;
    }
    if let Some(val) = env("CARTOGRAPH_SOURCE_USERNAME").or_else(|| env("NEO4J_USERNAME")) {
        config.source.username = val;
    }
    if let Some(val) = env("CARTOGRAPH_SOURCE_PASSWORD").or_else(|| env("NEO4J_PASSWORD")) {
        config.source.password = Some(secret_string(val));
    }
    if let Some(val) = env_parse("CARTOGRAPH_SOURCE_TLS_VERIFY")? {
        config.source.tls_verify = val;
    }
    if let Some(val) = env_parse("CARTOGRAPH_SOURCE_REQUEST_TIMEOUT_SECONDS")? {
        config.source.request_timeout_seconds = val;
    }
    if let Some(val) = env_parse("CARTOGRAPH_SOURCE_MAX_TRANSACTION_RETRY_MS")? {
        config.source.max_transaction_retry_ms = val;
    }

    // Sink overrides
    if let Some(val) = env("CARTOGRAPH_SINK_PROJECT_ID").or_else(|| env("PROJECT")) {
        config.sink.project_id = val;
    }
    if let Some(val) = env("CARTOGRAPH_SINK_DATASET_NAME") {
        config.sink.dataset_name = Some(val);
    }
    if let Some(val) = env("CARTOGRAPH_SINK_LOCATION") {
        config.sink.location = Some(val);
    }
    if let Some(val) =
        env("CARTOGRAPH_SINK_ACCESS_TOKEN").or_else(|| env("GOOGLE_OAUTH_ACCESS_TOKEN"))
    {
        config.sink.access_token = Some(secret_string(val));
    }
    if let Some(val) = env_parse("CARTOGRAPH_SINK_LOAD_TIMEOUT_SECONDS")? {
        config.sink.load_timeout_seconds = val;
    }

    // Export overrides
    if let Some(val) = env_parse("CARTOGRAPH_EXPORT_CONCURRENCY")? {
        config.export.concurrency = val;
    } else if let Some(val) = env_parse("CONCURRENCY")? {
        config.export.concurrency = val;
    }
    if let Some(val) = env_parse("CARTOGRAPH_EXPORT_PAGE_SIZE")? {
        config.export.page_size = val;
    }
    if let Some(val) = env("CARTOGRAPH_EXPORT_STAGING_DIR") {
        config.export.staging_dir = val;
    }
    if let Some(val) = env_parse("CARTOGRAPH_EXPORT_PAGE_TIMEOUT_SECONDS")? {
        config.export.page_timeout_seconds = val;
    }
    if let Some(val) = env_parse("CARTOGRAPH_EXPORT_DRY_RUN")? {
        config.export.dry_run = val;
    }

    // Logging overrides
    if let Some(val) = env_parse("CARTOGRAPH_LOGGING_LOCAL_ENABLED")? {
        config.logging.local_enabled = val;
    }
    if let Some(val) = env("CARTOGRAPH_LOGGING_LOCAL_PATH") {
        config.logging.local_path = val;
    }

    Ok(())
}
