//! Sink connector trait

use crate::core::staging::StagedBatch;
use crate::domain::{DatasetId, SinkError, TableId};
use async_trait::async_trait;
use std::fmt;
use uuid::Uuid;

/// Result type for sink operations
pub type SinkResult<T> = std::result::Result<T, SinkError>;

/// A dataset that exists in the sink
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DatasetHandle {
    pub project: String,
    pub dataset: DatasetId,
}

/// A table that exists in the sink
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableHandle {
    pub project: String,
    pub dataset: DatasetId,
    pub table: TableId,
}

impl fmt::Display for TableHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.project, self.dataset, self.table)
    }
}

/// Outcome of one append
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadResult {
    pub job_id: String,
    pub rows_loaded: u64,
}

/// Fresh load job id for one batch
///
/// Every attempt to load that batch reuses it, so a backend can tell a retry
/// from a new append.
pub fn load_job_id(table: &TableId, batch_index: u64) -> String {
    let table: String = table.as_str().chars().take(64).collect();
    format!("cartograph_{table}_{batch_index}_{}", Uuid::new_v4().simple())
}

/// Write access to a batch-load warehouse
#[async_trait]
pub trait SinkConnector: Send + Sync {
    /// Create (or adopt an existing) dataset
    async fn create_dataset(&self, name: &DatasetId) -> SinkResult<DatasetHandle>;

    /// Create a table
    ///
    /// Not idempotent on every backend; callers go through
    /// [`TableRegistry`](super::TableRegistry) so it runs once per table.
    async fn create_table(&self, dataset: &DatasetHandle, table: &TableId)
        -> SinkResult<TableHandle>;

    /// Append one staged file under `job_id`; `is_first` enables schema detection
    ///
    /// Retries of a batch come back with the same `job_id` and the same `is_first`,
    /// so `is_first` can be seen more than once for one table. An implementation
    /// that already accepted `job_id` must finish that job rather than append the
    /// file again.
    async fn load(
        &self,
        table: &TableHandle,
        staged: &StagedBatch,
        job_id: &str,
        is_first: bool,
    ) -> SinkResult<LoadResult>;

    /// Short description for logs
    fn describe(&self) -> String;
}
