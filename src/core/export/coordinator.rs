//! Export coordinator - main orchestrator for the export process
//!
//! Drives one run through `Idle → Discovering → Preparing → Draining → Done`,
//! or `Failed` when discovery or dataset creation fails. The current phase is
//! published on a watch channel.

use crate::adapters::factory::{create_sink, create_source};
use crate::adapters::sink::{DatasetHandle, SinkConnector, TableRegistry};
use crate::adapters::source::SourceConnector;
use crate::config::CartographConfig;
use crate::core::discovery::{assign_unique_tables, CategoryDiscovery};
use crate::core::export::summary::{ExportError, ExportErrorType, ExportSummary};
use crate::core::pipeline::{CategoryPipeline, CategoryPool, PipelineContext};
use crate::core::pool::{BoundedPool, FailureMode, IterProducer, WorkUnit};
use crate::core::staging::CsvStager;
use crate::domain::{CartographError, Category, DatasetId, Result};
use chrono::Utc;
use futures::FutureExt;
use rand::Rng;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;

/// Prefix of generated dataset names
pub const DATASET_PREFIX: &str = "neo4j_export";

/// Lifecycle of one export run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportPhase {
    Idle,
    Discovering,
    Preparing,
    Draining,
    Done,
    Failed,
}

impl ExportPhase {
    /// `Done` or `Failed`
    pub fn is_terminal(&self) -> bool {
        matches!(self, ExportPhase::Done | ExportPhase::Failed)
    }
}

impl fmt::Display for ExportPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExportPhase::Idle => "idle",
            ExportPhase::Discovering => "discovering",
            ExportPhase::Preparing => "preparing",
            ExportPhase::Draining => "draining",
            ExportPhase::Done => "done",
            ExportPhase::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Export coordinator
pub struct ExportCoordinator {
    config: CartographConfig,
    source: Arc<dyn SourceConnector>,
    sink: Arc<dyn SinkConnector>,
    phase: watch::Sender<ExportPhase>,
}

impl ExportCoordinator {
    /// Create a coordinator over already-built connectors
    pub fn new(
        config: CartographConfig,
        source: Arc<dyn SourceConnector>,
        sink: Arc<dyn SinkConnector>,
    ) -> Self {
        let (phase, _) = watch::channel(ExportPhase::Idle);
        Self {
            config,
            source,
            sink,
            phase,
        }
    }

    /// Create a coordinator, building the connectors the configuration names
    ///
    /// # Errors
    ///
    /// Returns an error if either connector cannot be constructed
    pub fn from_config(config: CartographConfig) -> Result<Self> {
        let source = create_source(&config)?;
        let sink = create_sink(&config)?;
        tracing::debug!(
            source = %source.endpoint(),
            sink = %sink.describe(),
            "Connectors ready"
        );
        Ok(Self::new(config, source, sink))
    }

    /// Follow phase changes
    pub fn subscribe(&self) -> watch::Receiver<ExportPhase> {
        self.phase.subscribe()
    }

    /// Current phase
    pub fn phase(&self) -> ExportPhase {
        *self.phase.borrow()
    }

    fn enter(&self, phase: ExportPhase) {
        let previous = self.phase.send_replace(phase);
        tracing::debug!(from = %previous, to = %phase, "Export phase changed");
    }

    /// Configured dataset name, or a fresh `neo4j_export_N`
    pub fn dataset_name(&self) -> Result<DatasetId> {
        let raw = match self.config.sink.dataset_name {
            Some(ref name) => name.clone(),
            None => {
                let suffix: u32 = rand::thread_rng().gen_range(0..1000);
                format!("{DATASET_PREFIX}_{suffix}")
            }
        };
        DatasetId::new(raw).map_err(CartographError::Configuration)
    }

    /// Execute the export
    ///
    /// Discovery and dataset creation run together; either failing aborts the run
    /// with `Err`. Past that point every failure is contained to its category and
    /// reported in the returned summary. The source is closed on every path.
    pub async fn execute_export(&self) -> Result<ExportSummary> {
        let start_time = Instant::now();
        tracing::info!(
            concurrency = self.config.export.concurrency,
            page_size = self.config.export.page_size,
            staging_dir = %self.config.export.staging_dir,
            dry_run = self.config.export.dry_run,
            "Starting export process"
        );

        let result = self.run(start_time).await;

        if let Err(e) = self.source.close().await {
            tracing::warn!(error = %e, "Failed to close source connection");
        }

        match result {
            Ok(summary) => {
                self.enter(ExportPhase::Done);
                summary.log_summary();
                Ok(summary)
            }
            Err(e) => {
                self.enter(ExportPhase::Failed);
                crate::log_error_with_context!(&e, "Export aborted");
                Err(e)
            }
        }
    }

    async fn run(&self, start_time: Instant) -> Result<ExportSummary> {
        let mut summary = ExportSummary {
            started_at: Some(Utc::now()),
            ..ExportSummary::default()
        };

        self.enter(ExportPhase::Discovering);
        let dataset_id = self.dataset_name()?;
        let discovery = CategoryDiscovery::new(Arc::clone(&self.source));
        let (nodes, edges, dataset) = tokio::try_join!(
            discovery.discover_node_categories(),
            discovery.discover_edge_categories(),
            async {
                self.sink
                    .create_dataset(&dataset_id)
                    .await
                    .map_err(CartographError::from)
            },
        )?;
        summary.dataset = Some(format!("{}.{}", dataset.project, dataset.dataset));

        let discovered: Vec<Category> = nodes.into_iter().chain(edges).collect();
        summary.categories_discovered = discovered.len();

        let (typed, untyped): (Vec<Category>, Vec<Category>) =
            discovered.into_iter().partition(Category::is_typed);
        for category in &untyped {
            tracing::warn!(category = %category, "Skipping untyped category");
        }
        summary.categories_skipped = untyped.len();
        let typed = assign_unique_tables(typed);

        self.enter(ExportPhase::Preparing);
        let ctx = Arc::new(self.pipeline_context(dataset));
        let pools = self.prepare(&ctx, typed, &mut summary).await;
        summary.categories_prepared = pools.len();
        summary.total_records = pools.iter().map(CategoryPool::total).sum();

        self.enter(ExportPhase::Draining);
        self.drain(pools, &mut summary).await;

        Ok(summary.with_duration(start_time.elapsed()))
    }

    fn pipeline_context(&self, dataset: DatasetHandle) -> PipelineContext {
        let export = &self.config.export;
        PipelineContext {
            source: Arc::clone(&self.source),
            sink: Arc::clone(&self.sink),
            registry: Arc::new(TableRegistry::new(Arc::clone(&self.sink))),
            dataset,
            stager: CsvStager::new(&export.staging_dir),
            page_size: export.page_size,
            page_timeout: (export.page_timeout_seconds > 0)
                .then(|| Duration::from_secs(export.page_timeout_seconds)),
            load_retry: self.config.sink.retry.clone(),
        }
    }

    /// Counts every category under the global limit; failed counts drop the category
    async fn prepare(
        &self,
        ctx: &Arc<PipelineContext>,
        categories: Vec<Category>,
        summary: &mut ExportSummary,
    ) -> Vec<CategoryPool> {
        let units = categories.into_iter().enumerate().map(|(position, category)| {
            let ctx = Arc::clone(ctx);
            let unit: WorkUnit<_> = async move {
                let prepared = CategoryPipeline::prepare(ctx, category.clone()).await;
                Ok((position, category, prepared))
            }
            .boxed();
            unit
        });

        let outcome = BoundedPool::new(IterProducer::new(units), self.config.export.concurrency)
            .run()
            .await;

        let mut prepared = outcome.results;
        prepared.sort_by_key(|(position, _, _)| *position);

        let mut pools = Vec::with_capacity(prepared.len());
        for (_, category, result) in prepared {
            match result {
                Ok(pool) => pools.push(pool),
                Err(e) => {
                    tracing::error!(
                        category = %category,
                        table = %category.table(),
                        error = %e,
                        "Count failed, category dropped"
                    );
                    summary.add_error(
                        ExportError::new(ExportErrorType::CountQuery, e.to_string()).with_context(
                            format!("category={}, table={}", category, category.table()),
                        ),
                    );
                }
            }
        }
        pools
    }

    /// Drains prepared categories, at most `concurrency` at a time
    async fn drain(&self, pools: Vec<CategoryPool>, summary: &mut ExportSummary) {
        let units = pools.into_iter().map(|pool| {
            let unit: WorkUnit<_> = async move { Ok(pool.run().await) }.boxed();
            unit
        });

        let outcome = BoundedPool::new(IterProducer::new(units), self.config.export.concurrency)
            .with_failure_mode(FailureMode::Continue)
            .run()
            .await;

        summary.peak_concurrent_categories = outcome.peak_in_flight;
        for report in outcome.results {
            summary.add_category(report);
        }
    }
}
