//! Logging and observability
//!
//! This module provides structured logging with support for:
//! - Console output filtered by level or `RUST_LOG`
//! - JSON-formatted log files with daily or hourly rotation
//! - Helper macros that keep field names consistent across the pipeline
//!
//! # Example
//!
//! ```no_run
//! use cartograph::logging::init_logging;
//! use cartograph::config::LoggingConfig;
//!
//! let config = LoggingConfig::default();
//! let _guard = init_logging("info", &config).expect("Failed to initialize logging");
//!
//! tracing::info!("Application started");
//! tracing::error!(error = "Something went wrong", "Error occurred");
//! ```

pub mod structured;

pub use structured::{init_logging, LoggingGuard};

/// Log the start of one category's drain
///
/// # Example
///
/// ```no_run
/// use cartograph::log_category_start;
/// use cartograph::domain::Category;
///
/// let category = Category::node(vec!["Person".to_string()]);
/// log_category_start!(&category, 25_000u64, 3usize);
/// ```
#[macro_export]
macro_rules! log_category_start {
    ($category:expr, $total:expr, $pages:expr) => {
        tracing::info!(
            category = %$category.name(),
            table = %$category.table(),
            total = $total,
            pages = $pages,
            "Exporting category"
        );
    };
}

/// Log the completion of one category's drain
///
/// # Example
///
/// ```no_run
/// use cartograph::log_category_complete;
/// use cartograph::domain::Category;
/// use std::time::Duration;
///
/// let category = Category::node(vec!["Person".to_string()]);
/// log_category_complete!(&category, 25_000u64, Duration::from_secs(12));
/// ```
#[macro_export]
macro_rules! log_category_complete {
    ($category:expr, $records:expr, $duration:expr) => {
        tracing::info!(
            category = %$category.name(),
            table = %$category.table(),
            records = $records,
            duration_ms = $duration.as_millis() as u64,
            "Category exported"
        );
    };
}

/// Log an error with context
///
/// # Example
///
/// ```no_run
/// use cartograph::log_error_with_context;
/// use cartograph::domain::CartographError;
///
/// let error = CartographError::Configuration("Invalid config".to_string());
/// log_error_with_context!(&error, "Failed to load configuration");
/// ```
#[macro_export]
macro_rules! log_error_with_context {
    ($error:expr, $context:expr) => {
        tracing::error!(
            error = %$error,
            context = $context,
            "Error occurred"
        );
    };
}

/// Log one batch of a category
///
/// # Example
///
/// ```no_run
/// use cartograph::log_batch_processing;
///
/// log_batch_processing!("Person", 2u64, 3usize);
/// ```
#[macro_export]
macro_rules! log_batch_processing {
    ($category:expr, $batch:expr, $pages:expr) => {
        tracing::debug!(
            category = %$category,
            batch = $batch,
            pages = $pages,
            progress_pct = (($batch as f64 + 1.0) / ($pages as f64).max(1.0) * 100.0),
            "Processing batch"
        );
    };
}

/// Log a retry attempt
///
/// # Example
///
/// ```no_run
/// use cartograph::log_retry_attempt;
///
/// log_retry_attempt!(2, 3, "Connection timeout");
/// ```
#[macro_export]
macro_rules! log_retry_attempt {
    ($attempt:expr, $max_attempts:expr, $reason:expr) => {
        tracing::warn!(
            attempt = $attempt,
            max_attempts = $max_attempts,
            reason = %$reason,
            "Retrying operation"
        );
    };
}
