//! CSV staging
//!
//! Each fetched page is written to `{dir}/{table}-batch-{n}.csv` with a header row
//! before it is appended to the sink. Staged files are left in place.
//!
//! Columns follow a per-category [`ColumnLayout`] that only ever grows: identity
//! columns first, then properties in order of first appearance. A column seen in
//! an earlier batch keeps its position, and a record lacking it gets an empty cell.

use crate::domain::record::IDENTITY_FIELDS;
use crate::domain::{CartographError, PropertyRecord, Result, TableId};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// A batch written to disk and ready to load
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedBatch {
    pub path: PathBuf,
    pub batch_index: u64,
    pub rows: usize,
    pub columns: Vec<String>,
}

/// Append-only column order for one table
#[derive(Debug, Clone, Default)]
pub struct ColumnLayout {
    columns: Vec<String>,
    known: HashSet<String>,
}

impl ColumnLayout {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds any columns these records introduce
    pub fn extend(&mut self, records: &[PropertyRecord]) {
        for field in IDENTITY_FIELDS {
            if !self.known.contains(field) && records.iter().any(|r| r.get(field).is_some()) {
                self.push(field);
            }
        }
        for record in records {
            for name in record.field_names() {
                if !self.known.contains(name) {
                    self.push(name);
                }
            }
        }
    }

    fn push(&mut self, name: &str) {
        self.known.insert(name.to_string());
        self.columns.push(name.to_string());
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Cells for one record in layout order
    pub fn row(&self, record: &PropertyRecord) -> Vec<String> {
        self.columns
            .iter()
            .map(|column| record.get(column).map(|v| v.to_field()).unwrap_or_default())
            .collect()
    }
}

/// Writes batches into the staging directory
#[derive(Debug, Clone)]
pub struct CsvStager {
    dir: PathBuf,
}

impl CsvStager {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `{dir}/{table}-batch-{n}.csv`
    pub fn path_for(&self, table: &TableId, batch_index: u64) -> PathBuf {
        self.dir.join(format!("{}-batch-{}.csv", table, batch_index))
    }

    /// Writes one batch using the given layout
    ///
    /// The write runs on the blocking pool so large pages do not stall other
    /// categories.
    ///
    /// # Errors
    ///
    /// [`CartographError::Staging`] if the directory or file cannot be written
    pub async fn stage(
        &self,
        table: &TableId,
        batch_index: u64,
        layout: &ColumnLayout,
        records: Vec<PropertyRecord>,
    ) -> Result<StagedBatch> {
        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            CartographError::Staging(format!(
                "cannot create staging directory {}: {e}",
                self.dir.display()
            ))
        })?;

        let path = self.path_for(table, batch_index);
        let columns = layout.columns().to_vec();
        let layout = layout.clone();
        let target = path.clone();

        let rows = tokio::task::spawn_blocking(move || write_csv(&target, &layout, &records))
            .await
            .map_err(|e| CartographError::Staging(format!("staging task failed: {e}")))??;

        tracing::debug!(
            table = %table,
            batch = batch_index,
            rows,
            file = %path.display(),
            "Staged batch"
        );

        Ok(StagedBatch {
            path,
            batch_index,
            rows,
            columns,
        })
    }
}

fn write_csv(path: &Path, layout: &ColumnLayout, records: &[PropertyRecord]) -> Result<usize> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(layout.columns())?;
    for record in records {
        writer.write_record(layout.row(record))?;
    }
    writer
        .flush()
        .map_err(|e| CartographError::Staging(format!("cannot flush {}: {e}", path.display())))?;
    Ok(records.len())
}
