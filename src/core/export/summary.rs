//! Export summary and reporting
//!
//! This module defines structures for tracking and reporting export results.

use crate::domain::{CartographError, Category, SourceError};
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Outcome of draining one category
#[derive(Debug, Clone)]
pub struct CategoryReport {
    pub category: Category,

    /// Counted entities
    pub total: u64,

    /// Pages the cursor planned
    pub pages: usize,

    /// Pages appended to the sink
    pub pages_loaded: usize,

    /// Rows the sink reported as appended
    pub records_appended: u64,

    /// Batch index that was being processed when the category halted
    pub failed_batch: Option<u64>,

    pub error: Option<ExportError>,

    pub duration: Duration,
}

impl CategoryReport {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Summary of an export operation
#[derive(Debug, Clone, Default)]
pub struct ExportSummary {
    /// Dataset the run wrote into
    pub dataset: Option<String>,

    /// Wall-clock start of the run
    pub started_at: Option<DateTime<Utc>>,

    /// Categories returned by discovery
    pub categories_discovered: usize,

    /// Untyped categories that were not exported
    pub categories_skipped: usize,

    /// Categories whose count succeeded
    pub categories_prepared: usize,

    /// Entities counted across prepared categories
    pub total_records: u64,

    /// Rows appended across all categories
    pub records_appended: u64,

    /// Most categories draining at the same time
    pub peak_concurrent_categories: usize,

    /// Duration of the export
    pub duration: Duration,

    /// Errors encountered during export
    pub errors: Vec<ExportError>,

    /// One report per drained category, in completion order
    pub categories: Vec<CategoryReport>,
}

impl ExportSummary {
    /// Create a new empty export summary
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the duration
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Add an error
    pub fn add_error(&mut self, error: ExportError) {
        self.errors.push(error);
    }

    /// Record a drained category and fold in its counts
    pub fn add_category(&mut self, report: CategoryReport) {
        self.records_appended += report.records_appended;
        if let Some(ref error) = report.error {
            self.errors.push(error.clone());
        }
        self.categories.push(report);
    }

    pub fn categories_failed(&self) -> usize {
        self.categories.iter().filter(|r| !r.is_success()).count()
    }

    pub fn categories_succeeded(&self) -> usize {
        self.categories.len() - self.categories_failed()
    }

    /// Check if the export was successful (no failures)
    pub fn is_successful(&self) -> bool {
        self.errors.is_empty() && self.categories_failed() == 0
    }

    /// Appended rows as a percentage of counted rows
    pub fn success_rate(&self) -> f64 {
        if self.total_records == 0 {
            return 100.0;
        }
        (self.records_appended as f64 / self.total_records as f64) * 100.0
    }

    /// Log the summary
    pub fn log_summary(&self) {
        tracing::info!(
            dataset = self.dataset.as_deref().unwrap_or("-"),
            started_at = %self
                .started_at
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "-".to_string()),
            discovered = self.categories_discovered,
            skipped = self.categories_skipped,
            prepared = self.categories_prepared,
            succeeded = self.categories_succeeded(),
            failed = self.categories_failed(),
            total_records = self.total_records,
            records_appended = self.records_appended,
            duration_secs = self.duration.as_secs(),
            success_rate = format!("{:.2}%", self.success_rate()),
            "Export completed"
        );

        if !self.errors.is_empty() {
            tracing::warn!(
                error_count = self.errors.len(),
                "Export completed with errors"
            );
            for error in &self.errors {
                tracing::warn!(
                    error_type = ?error.error_type,
                    message = %error.message,
                    context = error.context.as_deref().unwrap_or(""),
                    "Export error"
                );
            }
        }
    }
}

/// Type of export error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportErrorType {
    /// Category enumeration failed
    Discovery,
    /// Counting a category failed; the category was dropped
    CountQuery,
    /// Fetching a page failed or timed out
    PageFetch,
    /// Writing a staged file failed
    Staging,
    /// Creating a table or appending a batch failed
    SinkLoad,
    /// Unknown error
    Unknown,
}

impl ExportErrorType {
    /// Classifies a pipeline failure
    pub fn of(error: &CartographError) -> Self {
        match error {
            CartographError::Discovery(_) => Self::Discovery,
            CartographError::Source(SourceError::CountQueryFailed { .. }) => Self::CountQuery,
            CartographError::Source(_) => Self::PageFetch,
            CartographError::Staging(_) | CartographError::Io(_) => Self::Staging,
            CartographError::Sink(_) => Self::SinkLoad,
            _ => Self::Unknown,
        }
    }
}

/// Export error with context
#[derive(Debug, Clone)]
pub struct ExportError {
    /// Type of error
    pub error_type: ExportErrorType,

    /// Error message
    pub message: String,

    /// Optional context (category, table, batch)
    pub context: Option<String>,
}

impl ExportError {
    /// Create a new export error
    pub fn new(error_type: ExportErrorType, message: String) -> Self {
        Self {
            error_type,
            message,
            context: None,
        }
    }

    /// Build from a pipeline failure, classifying it
    pub fn from_error(error: &CartographError) -> Self {
        Self::new(ExportErrorType::of(error), error.to_string())
    }

    /// Add context to the error
    pub fn with_context(mut self, context: String) -> Self {
        self.context = Some(context);
        self
    }
}
