//! Dry-run sink
//!
//! Staging still happens so the CSV output can be inspected, but nothing is sent
//! to the warehouse. Every call is logged with what would have happened.

use super::traits::{DatasetHandle, LoadResult, SinkConnector, SinkResult, TableHandle};
use crate::core::staging::StagedBatch;
use crate::domain::{DatasetId, TableId};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};

pub struct DryRunSink {
    project: String,
    loads: AtomicU64,
}

impl DryRunSink {
    pub fn new(project: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            loads: AtomicU64::new(0),
        }
    }

    /// Number of loads that were skipped so far
    pub fn skipped_loads(&self) -> u64 {
        self.loads.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl SinkConnector for DryRunSink {
    async fn create_dataset(&self, name: &DatasetId) -> SinkResult<DatasetHandle> {
        tracing::info!(dataset = %name, project = %self.project, "[DRY RUN] Would create dataset");
        Ok(DatasetHandle {
            project: self.project.clone(),
            dataset: name.clone(),
        })
    }

    async fn create_table(
        &self,
        dataset: &DatasetHandle,
        table: &TableId,
    ) -> SinkResult<TableHandle> {
        let handle = TableHandle {
            project: dataset.project.clone(),
            dataset: dataset.dataset.clone(),
            table: table.clone(),
        };
        tracing::info!(table = %handle, "[DRY RUN] Would create table");
        Ok(handle)
    }

    async fn load(
        &self,
        table: &TableHandle,
        staged: &StagedBatch,
        job_id: &str,
        is_first: bool,
    ) -> SinkResult<LoadResult> {
        self.loads.fetch_add(1, Ordering::Relaxed);
        tracing::info!(
            table = %table,
            job_id,
            file = %staged.path.display(),
            rows = staged.rows,
            autodetect = is_first,
            "[DRY RUN] Would load staged batch"
        );
        Ok(LoadResult {
            job_id: job_id.to_string(),
            rows_loaded: staged.rows as u64,
        })
    }

    fn describe(&self) -> String {
        format!("dry-run:{}", self.project)
    }
}
