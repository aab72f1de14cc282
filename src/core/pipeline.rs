//! Category pipeline
//!
//! Pairs one category's [`BatchCursor`] with the sink-writing step. Each page
//! becomes one work unit: fetch, stage to CSV, ensure the table exists, append.
//! The per-category pool runs at degree 1, so page N's append always finishes
//! before page N+1 is fetched and exactly one append is flagged as the first.

use crate::adapters::sink::{
    load_job_id, DatasetHandle, LoadResult, SinkConnector, TableHandle, TableRegistry,
};
use crate::adapters::source::{SourceConnector, SourceResult};
use crate::config::RetryConfig;
use crate::core::cursor::{BatchCursor, FetchSpec};
use crate::core::export::summary::{CategoryReport, ExportError};
use crate::core::pool::{BoundedPool, FailureMode, WorkProducer, WorkUnit};
use crate::core::staging::{ColumnLayout, CsvStager, StagedBatch};
use crate::domain::{CartographError, Category, Result, SinkError};
use async_trait::async_trait;
use futures::FutureExt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Pages run one at a time within a category
const CATEGORY_DEGREE: usize = 1;

/// Everything the pipelines of one export share
pub struct PipelineContext {
    pub source: Arc<dyn SourceConnector>,
    pub sink: Arc<dyn SinkConnector>,
    pub registry: Arc<TableRegistry>,
    pub dataset: DatasetHandle,
    pub stager: CsvStager,
    pub page_size: u64,
    pub page_timeout: Option<Duration>,
    pub load_retry: RetryConfig,
}

/// Outcome of one page
#[derive(Debug, Clone, Default)]
pub struct PageOutcome {
    pub batch_index: u64,
    pub rows: u64,
    pub job_id: String,
}

struct PipelineState {
    cursor: BatchCursor,
    layout: ColumnLayout,
    /// Batch currently being worked on
    current_batch: Option<u64>,
    first_append_attempted: bool,
    records_appended: u64,
    pages_loaded: usize,
}

pub struct CategoryPipeline;

impl CategoryPipeline {
    /// Counts the category and returns its ready-to-run pool
    ///
    /// # Errors
    ///
    /// [`SourceError::CountQueryFailed`](crate::domain::SourceError::CountQueryFailed)
    /// when the count cannot be taken
    pub async fn prepare(
        ctx: Arc<PipelineContext>,
        category: Category,
    ) -> SourceResult<CategoryPool> {
        let spec = FetchSpec::for_category(&category);
        let mut cursor = BatchCursor::new(Arc::clone(&ctx.source), spec)
            .with_page_size(ctx.page_size)
            .with_page_timeout(ctx.page_timeout);

        let total = cursor.get_count().await?;
        let pages = cursor.page_count();

        Ok(CategoryPool {
            ctx,
            category,
            total,
            pages,
            state: Arc::new(Mutex::new(PipelineState {
                cursor,
                layout: ColumnLayout::new(),
                current_batch: None,
                first_append_attempted: false,
                records_appended: 0,
                pages_loaded: 0,
            })),
        })
    }
}

/// A prepared category, ready to drain
pub struct CategoryPool {
    ctx: Arc<PipelineContext>,
    category: Category,
    total: u64,
    pages: usize,
    state: Arc<Mutex<PipelineState>>,
}

impl CategoryPool {
    pub fn category(&self) -> &Category {
        &self.category
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn page_count(&self) -> usize {
        self.pages
    }

    /// Drains every page; stops at the first failed page
    pub async fn run(self) -> CategoryReport {
        let started = Instant::now();
        crate::log_category_start!(&self.category, self.total, self.pages);

        let producer = PageProducer {
            ctx: Arc::clone(&self.ctx),
            category: self.category.clone(),
            pages: self.pages,
            state: Arc::clone(&self.state),
        };

        let outcome = BoundedPool::new(producer, CATEGORY_DEGREE)
            .with_failure_mode(FailureMode::Halt)
            .run()
            .await;

        let state = self.state.lock().await;
        let failed_batch = if outcome.is_success() {
            None
        } else {
            state.current_batch
        };

        let error = outcome.failures.first().map(|e| {
            let context = match failed_batch {
                Some(batch) => format!(
                    "category={}, table={}, batch={batch}",
                    self.category,
                    self.category.table()
                ),
                None => format!("category={}, table={}", self.category, self.category.table()),
            };
            tracing::error!(
                category = %self.category,
                table = %self.category.table(),
                batch = ?failed_batch,
                error = %e,
                "Category halted"
            );
            ExportError::from_error(e).with_context(context)
        });

        let report = CategoryReport {
            category: self.category.clone(),
            total: self.total,
            pages: self.pages,
            pages_loaded: state.pages_loaded,
            records_appended: state.records_appended,
            failed_batch,
            error,
            duration: started.elapsed(),
        };

        if report.is_success() {
            crate::log_category_complete!(&self.category, report.records_appended, report.duration);
        }

        report
    }
}

struct PageProducer {
    ctx: Arc<PipelineContext>,
    category: Category,
    pages: usize,
    state: Arc<Mutex<PipelineState>>,
}

#[async_trait]
impl WorkProducer for PageProducer {
    type Output = PageOutcome;

    async fn next_unit(&mut self) -> Option<WorkUnit<PageOutcome>> {
        let has_more = self.state.lock().await.cursor.has_more().await;
        match has_more {
            Ok(false) => {
                tracing::debug!(category = %self.category, "Cursor exhausted");
                None
            }
            Ok(true) => Some(
                page_unit(
                    Arc::clone(&self.ctx),
                    self.category.clone(),
                    self.pages,
                    Arc::clone(&self.state),
                )
                .boxed(),
            ),
            Err(e) => Some(futures::future::ready(Err(CartographError::from(e))).boxed()),
        }
    }
}

/// Fetch, stage and append one page
async fn page_unit(
    ctx: Arc<PipelineContext>,
    category: Category,
    pages: usize,
    state: Arc<Mutex<PipelineState>>,
) -> Result<PageOutcome> {
    let mut state = state.lock().await;
    let table = category.table();

    let batch_index = state.cursor.next_page_index() as u64;
    state.current_batch = Some(batch_index);
    crate::log_batch_processing!(category.name(), batch_index, pages);

    let batch = match state.cursor.next_batch().await? {
        Some(batch) => batch,
        None => return Ok(PageOutcome::default()),
    };

    if batch.records.is_empty() {
        tracing::warn!(
            category = %category,
            table = %table,
            batch = batch_index,
            skip = batch.skip,
            "Page returned no rows"
        );
        return Ok(PageOutcome {
            batch_index,
            ..PageOutcome::default()
        });
    }

    state.layout.extend(&batch.records);
    let staged = ctx
        .stager
        .stage(table, batch_index, &state.layout, batch.records)
        .await?;

    let handle = ctx.registry.ensure_table(&ctx.dataset, table).await?;

    let is_first = !state.first_append_attempted;
    state.first_append_attempted = true;

    let job_id = load_job_id(table, batch_index);
    let loaded = load_with_retry(&ctx, &category, &handle, &staged, &job_id, is_first).await?;

    state.records_appended += loaded.rows_loaded;
    state.pages_loaded += 1;

    Ok(PageOutcome {
        batch_index,
        rows: loaded.rows_loaded,
        job_id: loaded.job_id,
    })
}

/// Appends one staged file, retrying transient sink failures with backoff
///
/// Every attempt for the batch reuses `job_id` and `is_first`. So when the first
/// batch is retried, the sink sees `is_first = true` once per attempt. Only one
/// batch per category ever carries it.
async fn load_with_retry(
    ctx: &PipelineContext,
    category: &Category,
    table: &TableHandle,
    staged: &StagedBatch,
    job_id: &str,
    is_first: bool,
) -> std::result::Result<LoadResult, SinkError> {
    let max_attempts = ctx.load_retry.max_retries.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        match ctx.sink.load(table, staged, job_id, is_first).await {
            Ok(result) => {
                tracing::debug!(
                    category = %category,
                    table = %table,
                    batch = staged.batch_index,
                    job_id = %result.job_id,
                    rows = result.rows_loaded,
                    first = is_first,
                    "Batch appended"
                );
                return Ok(result);
            }
            Err(e) if e.is_transient() && attempt < max_attempts => {
                let delay = ctx.load_retry.delay_ms(attempt);
                tracing::warn!(
                    category = %category,
                    table = %table,
                    batch = staged.batch_index,
                    job_id,
                    attempt,
                    max_attempts,
                    delay_ms = delay,
                    error = %e,
                    "Load failed, retrying"
                );
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }
            Err(e) => {
                tracing::error!(
                    category = %category,
                    table = %table,
                    batch = staged.batch_index,
                    job_id,
                    attempt,
                    error = %e,
                    "Load failed"
                );
                return Err(e);
            }
        }
    }
}
