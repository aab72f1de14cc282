//! Domain error types
//!
//! This module defines the error hierarchy for Cartograph.
//! All errors are domain-specific and don't expose third-party types.

use thiserror::Error;

/// Main Cartograph error type
///
/// This is the primary error type used throughout the application.
/// It wraps the source and sink error types and provides context for error handling.
#[derive(Debug, Error)]
pub enum CartographError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Graph source errors
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// Warehouse sink errors
    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),

    /// Category discovery errors (fatal to the whole export)
    #[error("Discovery error: {0}")]
    Discovery(String),

    /// Failure writing a staged batch
    #[error("Staging error: {0}")]
    Staging(String),

    /// Export process errors
    #[error("Export error: {0}")]
    Export(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// Generic errors with context
    #[error("{0}")]
    Other(String),
}

/// Graph source errors
///
/// Errors that occur when talking to the graph store.
/// These errors don't expose third-party HTTP client types.
#[derive(Debug, Clone, Error)]
pub enum SourceError {
    /// Failed to connect to the source
    #[error("Failed to connect to graph source: {0}")]
    ConnectionFailed(String),

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// A query was rejected or failed server-side
    #[error("Query failed: {code} - {message}")]
    QueryFailed { code: String, message: String },

    /// The count query for a category failed
    #[error("Count query failed for {category}: {message}")]
    CountQueryFailed { category: String, message: String },

    /// A page query for a category failed
    #[error("Page fetch failed for {category} at skip {skip}: {message}")]
    PageFetchFailed {
        category: String,
        skip: u64,
        message: String,
    },

    /// Invalid response from server
    #[error("Invalid response from source: {0}")]
    InvalidResponse(String),

    /// Timeout
    #[error("Source request timeout: {0}")]
    Timeout(String),

    /// The source session was already released
    #[error("Source session closed")]
    Closed,
}

impl SourceError {
    /// Whether a retry of the same request may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            SourceError::ConnectionFailed(_) | SourceError::Timeout(_) => true,
            SourceError::QueryFailed { code, .. } => code.starts_with("Neo.TransientError"),
            _ => false,
        }
    }
}

/// Warehouse sink errors
///
/// Errors that occur when talking to the batch-load warehouse.
/// `Clone` so a single in-flight table creation can hand its outcome to every waiter.
#[derive(Debug, Clone, Error)]
pub enum SinkError {
    /// Failed to connect to the sink
    #[error("Failed to connect to sink: {0}")]
    ConnectionFailed(String),

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Failed to create dataset
    #[error("Failed to create dataset {dataset}: {message}")]
    DatasetCreationFailed { dataset: String, message: String },

    /// Failed to create table
    #[error("Failed to create table {table}: {message}")]
    TableCreationFailed { table: String, message: String },

    /// A load job failed
    #[error("Load into {table} failed (job {job_id}): {detail}")]
    LoadFailed {
        table: String,
        job_id: String,
        detail: String,
    },

    /// Invalid response from server
    #[error("Invalid response from sink: {0}")]
    InvalidResponse(String),

    /// Timeout
    #[error("Sink request timeout: {0}")]
    Timeout(String),
}

impl SinkError {
    /// Whether a retry of the same request may succeed
    ///
    /// A `LoadFailed` means the backend finished the job and rejected the data.
    pub fn is_transient(&self) -> bool {
        matches!(self, SinkError::ConnectionFailed(_) | SinkError::Timeout(_))
    }
}

// Conversion from std::io::Error
impl From<std::io::Error> for CartographError {
    fn from(err: std::io::Error) -> Self {
        CartographError::Io(err.to_string())
    }
}

// Conversion from serde_json::Error
impl From<serde_json::Error> for CartographError {
    fn from(err: serde_json::Error) -> Self {
        CartographError::Serialization(err.to_string())
    }
}

// Conversion from toml parse errors
impl From<toml::de::Error> for CartographError {
    fn from(err: toml::de::Error) -> Self {
        CartographError::Configuration(format!("TOML parse error: {err}"))
    }
}

// CSV writer errors only surface while staging
impl From<csv::Error> for CartographError {
    fn from(err: csv::Error) -> Self {
        CartographError::Staging(err.to_string())
    }
}
