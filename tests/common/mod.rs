//! Shared in-memory source and sink for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use cartograph::adapters::sink::{DatasetHandle, LoadResult, SinkConnector, SinkResult, TableHandle};
use cartograph::adapters::source::{Query, RawRow, SourceConnector, SourceResult};
use cartograph::config::CartographConfig;
use cartograph::core::staging::StagedBatch;
use cartograph::domain::{Category, CategoryKind, DatasetId, SinkError, SourceError, TableId};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tempfile::TempDir;

/// Config wired for in-memory runs with fast sink retries
pub fn test_config(staging: &TempDir, concurrency: usize, page_size: u64) -> CartographConfig {
    let mut config = CartographConfig::default();
    config.sink.project_id = "memory".into();
    config.sink.dataset_name = Some("graph_test".into());
    config.sink.retry.max_retries = 3;
    config.sink.retry.initial_delay_ms = 1;
    config.sink.retry.max_delay_ms = 2;
    config.export.concurrency = concurrency;
    config.export.page_size = page_size;
    config.export.staging_dir = staging.path().display().to_string();
    config
}

#[derive(Default)]
struct Gauge {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl Gauge {
    fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn leave(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Graph of synthetic categories, each holding entities `0..total`
#[derive(Default)]
pub struct MemorySource {
    categories: Vec<(Category, u64)>,
    failing_counts: HashSet<String>,
    fail_discovery: bool,
    page_delay: Option<Duration>,
    all_pages: Gauge,
    per_category: Mutex<HashMap<String, usize>>,
    per_category_peak: AtomicUsize,
    pub counts: AtomicUsize,
    pub pages: AtomicUsize,
    pub closed: AtomicBool,
    served: Mutex<Vec<(String, u64, usize)>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_node(mut self, labels: &[&str], total: u64) -> Self {
        let labels = labels.iter().map(|l| l.to_string()).collect();
        self.categories.push((Category::node(labels), total));
        self
    }

    pub fn with_edge(mut self, from: &[&str], rel_type: &str, to: &[&str], total: u64) -> Self {
        let from = from.iter().map(|l| l.to_string()).collect();
        let to = to.iter().map(|l| l.to_string()).collect();
        self.categories
            .push((Category::edge(from, rel_type, to), total));
        self
    }

    pub fn failing_count(mut self, category_name: &str) -> Self {
        self.failing_counts.insert(category_name.to_string());
        self
    }

    pub fn failing_discovery(mut self) -> Self {
        self.fail_discovery = true;
        self
    }

    pub fn with_page_delay(mut self, delay: Duration) -> Self {
        self.page_delay = Some(delay);
        self
    }

    /// Most page fetches in flight at once, across all categories
    pub fn peak_concurrent_pages(&self) -> usize {
        self.all_pages.peak.load(Ordering::SeqCst)
    }

    /// Most page fetches in flight at once for any single category
    pub fn peak_pages_per_category(&self) -> usize {
        self.per_category_peak.load(Ordering::SeqCst)
    }

    /// `(skip, rows)` for every page served to a category, in order
    pub fn served_for(&self, category_name: &str) -> Vec<(u64, usize)> {
        self.served
            .lock()
            .unwrap()
            .iter()
            .filter(|(name, _, _)| name == category_name)
            .map(|(_, skip, rows)| (*skip, *rows))
            .collect()
    }

    fn find(&self, query: &Query, build: fn(&Category) -> Query) -> SourceResult<&(Category, u64)> {
        self.categories
            .iter()
            .find(|(category, _)| build(category).text == query.text)
            .ok_or_else(|| SourceError::QueryFailed {
                code: "Neo.ClientError.Statement.SyntaxError".into(),
                message: format!("unknown statement: {}", query.text),
            })
    }

    fn ensure_open(&self) -> SourceResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(SourceError::Closed);
        }
        Ok(())
    }

    fn track(&self, name: &str, delta: isize) {
        let mut per_category = self.per_category.lock().unwrap();
        let entry = per_category.entry(name.to_string()).or_insert(0);
        *entry = (*entry as isize + delta) as usize;
        self.per_category_peak.fetch_max(*entry, Ordering::SeqCst);
    }
}

fn object(value: Value) -> RawRow {
    value.as_object().cloned().unwrap_or_default()
}

#[async_trait]
impl SourceConnector for MemorySource {
    async fn count(&self, query: &Query) -> SourceResult<u64> {
        self.ensure_open()?;
        self.counts.fetch_add(1, Ordering::SeqCst);
        let (category, total) = self.find(query, Query::count_for)?;
        if self.failing_counts.contains(category.name()) {
            return Err(SourceError::QueryFailed {
                code: "Neo.DatabaseError.General.UnknownError".into(),
                message: "count failed".into(),
            });
        }
        Ok(*total)
    }

    async fn page(&self, query: &Query, skip: u64, limit: u64) -> SourceResult<Vec<RawRow>> {
        self.ensure_open()?;
        let (category, total) = self.find(query, Query::page_for)?;
        self.pages.fetch_add(1, Ordering::SeqCst);

        self.all_pages.enter();
        self.track(category.name(), 1);
        if let Some(delay) = self.page_delay {
            tokio::time::sleep(delay).await;
        }
        self.track(category.name(), -1);
        self.all_pages.leave();

        let end = skip.saturating_add(limit).min(*total);
        let rows: Vec<RawRow> = (skip..end)
            .map(|id| match category.kind() {
                CategoryKind::Node { .. } => object(json!({"__id": id, "props": {"seq": id}})),
                CategoryKind::Edge { .. } => object(json!({
                    "__id": id,
                    "__from": id * 2,
                    "__to": id * 2 + 1,
                    "props": {"weight": id}
                })),
            })
            .collect();

        self.served
            .lock()
            .unwrap()
            .push((category.name().to_string(), skip, rows.len()));
        Ok(rows)
    }

    async fn rows(&self, query: &Query) -> SourceResult<Vec<RawRow>> {
        self.ensure_open()?;
        if self.fail_discovery {
            return Err(SourceError::ConnectionFailed("connection refused".into()));
        }

        let nodes = query.text == Query::label_combinations().text;
        Ok(self
            .categories
            .iter()
            .filter_map(|(category, _)| match (category.kind(), nodes) {
                (CategoryKind::Node { labels }, true) => Some(object(json!({"labels": labels}))),
                (CategoryKind::Edge { from, rel_type, to }, false) => Some(object(json!({
                    "from": from,
                    "relType": rel_type,
                    "to": to
                }))),
                _ => None,
            })
            .collect())
    }

    async fn close(&self) -> SourceResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn endpoint(&self) -> &str {
        "memory"
    }
}

/// One load attempt seen by [`RecordingSink`]
#[derive(Debug, Clone, PartialEq)]
pub struct LoadCall {
    pub table: String,
    pub batch_index: u64,
    pub job_id: String,
    pub rows: usize,
    /// Data rows in the staged file when the load was issued
    pub rows_on_disk: usize,
    pub is_first: bool,
    pub succeeded: bool,
}

/// Sink that records every call and fails where told to
#[derive(Default)]
pub struct RecordingSink {
    pub datasets: AtomicUsize,
    pub table_creates: AtomicUsize,
    calls: Mutex<Vec<LoadCall>>,
    load_failures: Mutex<HashMap<(String, u64), usize>>,
    rejected: HashSet<(String, u64)>,
    fail_dataset: bool,
    create_delay: Option<Duration>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Time out loads of one batch `times` times
    pub fn failing_load(self, table: &str, batch_index: u64, times: usize) -> Self {
        self.load_failures
            .lock()
            .unwrap()
            .insert((table.to_string(), batch_index), times);
        self
    }

    /// Reject one batch as bad data, every time
    pub fn rejecting_load(mut self, table: &str, batch_index: u64) -> Self {
        self.rejected.insert((table.to_string(), batch_index));
        self
    }

    pub fn failing_dataset(mut self) -> Self {
        self.fail_dataset = true;
        self
    }

    pub fn with_create_delay(mut self, delay: Duration) -> Self {
        self.create_delay = Some(delay);
        self
    }

    pub fn creates(&self) -> usize {
        self.table_creates.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<LoadCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, table: &str) -> Vec<LoadCall> {
        self.calls()
            .into_iter()
            .filter(|call| call.table == table)
            .collect()
    }

    pub fn rows_loaded_into(&self, table: &str) -> usize {
        self.calls_for(table)
            .iter()
            .filter(|call| call.succeeded)
            .map(|call| call.rows)
            .sum()
    }
}

#[async_trait]
impl SinkConnector for RecordingSink {
    async fn create_dataset(&self, name: &DatasetId) -> SinkResult<DatasetHandle> {
        self.datasets.fetch_add(1, Ordering::SeqCst);
        if self.fail_dataset {
            return Err(SinkError::DatasetCreationFailed {
                dataset: name.to_string(),
                message: "HTTP 403: quota".into(),
            });
        }
        Ok(DatasetHandle {
            project: "memory".into(),
            dataset: name.clone(),
        })
    }

    async fn create_table(&self, dataset: &DatasetHandle, table: &TableId) -> SinkResult<TableHandle> {
        self.table_creates.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.create_delay {
            tokio::time::sleep(delay).await;
        }
        Ok(TableHandle {
            project: dataset.project.clone(),
            dataset: dataset.dataset.clone(),
            table: table.clone(),
        })
    }

    async fn load(
        &self,
        table: &TableHandle,
        staged: &StagedBatch,
        job_id: &str,
        is_first: bool,
    ) -> SinkResult<LoadResult> {
        let key = (table.table.to_string(), staged.batch_index);
        let rows_on_disk = std::fs::read_to_string(&staged.path)
            .map(|text| text.lines().count().saturating_sub(1))
            .unwrap_or(0);

        let rejected = self.rejected.contains(&key);
        let timed_out = !rejected && {
            let mut failures = self.load_failures.lock().unwrap();
            match failures.get_mut(&key) {
                Some(remaining) if *remaining > 0 => {
                    *remaining -= 1;
                    true
                }
                _ => false,
            }
        };

        self.calls.lock().unwrap().push(LoadCall {
            table: key.0.clone(),
            batch_index: staged.batch_index,
            job_id: job_id.to_string(),
            rows: staged.rows,
            rows_on_disk,
            is_first,
            succeeded: !(rejected || timed_out),
        });

        if rejected {
            return Err(SinkError::LoadFailed {
                table: key.0,
                job_id: job_id.to_string(),
                detail: "invalid: Too many errors".into(),
            });
        }
        if timed_out {
            return Err(SinkError::Timeout(format!("load job {job_id} not done")));
        }

        Ok(LoadResult {
            job_id: job_id.to_string(),
            rows_loaded: staged.rows as u64,
        })
    }

    fn describe(&self) -> String {
        "recording".into()
    }
}
