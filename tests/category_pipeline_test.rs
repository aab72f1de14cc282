//! One category drained page by page against the in-memory source and sink

mod common;

use cartograph::adapters::sink::{DatasetHandle, SinkConnector, TableRegistry};
use cartograph::config::RetryConfig;
use cartograph::core::export::ExportErrorType;
use cartograph::core::pipeline::{CategoryPipeline, PipelineContext};
use cartograph::core::staging::CsvStager;
use cartograph::domain::{Category, DatasetId, SourceError};
use common::{MemorySource, RecordingSink};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tempfile::TempDir;

fn context(
    source: Arc<MemorySource>,
    sink: Arc<RecordingSink>,
    dir: &TempDir,
    page_size: u64,
) -> Arc<PipelineContext> {
    let sink: Arc<dyn SinkConnector> = sink;
    Arc::new(PipelineContext {
        source,
        registry: Arc::new(TableRegistry::new(Arc::clone(&sink))),
        sink,
        dataset: DatasetHandle {
            project: "memory".into(),
            dataset: DatasetId::new("graph").unwrap(),
        },
        stager: CsvStager::new(dir.path()),
        page_size,
        page_timeout: None,
        load_retry: RetryConfig {
            max_retries: 3,
            initial_delay_ms: 1,
            max_delay_ms: 5,
            backoff_multiplier: 2.0,
        },
    })
}

fn person() -> Category {
    Category::node(vec!["Person".to_string()])
}

#[tokio::test]
async fn test_drains_every_page_in_order() {
    let dir = TempDir::new().unwrap();
    let source = Arc::new(MemorySource::new().with_node(&["Person"], 25));
    let sink = Arc::new(RecordingSink::new());
    let ctx = context(Arc::clone(&source), Arc::clone(&sink), &dir, 10);

    let pool = CategoryPipeline::prepare(ctx, person()).await.unwrap();
    assert_eq!(pool.total(), 25);
    assert_eq!(pool.page_count(), 3);

    let report = pool.run().await;
    assert!(report.is_success());
    assert_eq!(report.records_appended, 25);
    assert_eq!(report.pages_loaded, 3);

    let calls = sink.calls_for("Person");
    let batches: Vec<u64> = calls.iter().map(|c| c.batch_index).collect();
    let rows: Vec<usize> = calls.iter().map(|c| c.rows).collect();
    assert_eq!(batches, vec![0, 1, 2]);
    assert_eq!(rows, vec![10, 10, 5]);
    assert_eq!(calls.iter().filter(|c| c.is_first).count(), 1);
    assert!(calls[0].is_first);

    assert_eq!(sink.creates(), 1);
    assert_eq!(source.served_for(":Person"), vec![(0, 10), (10, 10), (20, 5)]);
    assert!(dir.path().join("Person-batch-2.csv").exists());
}

#[tokio::test]
async fn test_empty_category_touches_nothing() {
    let dir = TempDir::new().unwrap();
    let source = Arc::new(MemorySource::new().with_node(&["Person"], 0));
    let sink = Arc::new(RecordingSink::new());
    let ctx = context(Arc::clone(&source), Arc::clone(&sink), &dir, 10_000);

    let pool = CategoryPipeline::prepare(ctx, person()).await.unwrap();
    assert_eq!(pool.page_count(), 0);

    let report = pool.run().await;
    assert!(report.is_success());
    assert_eq!(report.records_appended, 0);
    assert!(sink.calls_for("Person").is_empty());
    assert_eq!(sink.creates(), 0);
    assert_eq!(source.pages.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_transient_load_failure_retries_same_job() {
    let dir = TempDir::new().unwrap();
    let source = Arc::new(MemorySource::new().with_node(&["Person"], 20));
    let sink = Arc::new(RecordingSink::new().failing_load("Person", 0, 1));
    let ctx = context(source, Arc::clone(&sink), &dir, 10);

    let report = CategoryPipeline::prepare(ctx, person())
        .await
        .unwrap()
        .run()
        .await;

    assert!(report.is_success());
    assert_eq!(report.records_appended, 20);

    let calls = sink.calls_for("Person");
    assert_eq!(calls.len(), 3);
    assert!(!calls[0].succeeded);
    assert_eq!(calls[1].batch_index, 0);
    // the retry is the same job with the same flag
    assert_eq!(calls[0].job_id, calls[1].job_id);
    assert!(calls[0].is_first && calls[1].is_first);
    assert_ne!(calls[1].job_id, calls[2].job_id);
    assert!(!calls[2].is_first);
}

#[tokio::test]
async fn test_exhausted_retries_halt_category_at_failed_batch() {
    let dir = TempDir::new().unwrap();
    let source = Arc::new(MemorySource::new().with_node(&["Person"], 30));
    let sink = Arc::new(RecordingSink::new().failing_load("Person", 1, usize::MAX));
    let ctx = context(Arc::clone(&source), Arc::clone(&sink), &dir, 10);

    let report = CategoryPipeline::prepare(ctx, person())
        .await
        .unwrap()
        .run()
        .await;

    assert!(!report.is_success());
    assert_eq!(report.failed_batch, Some(1));
    assert_eq!(report.pages_loaded, 1);
    assert_eq!(report.records_appended, 10);

    let error = report.error.unwrap();
    assert_eq!(error.error_type, ExportErrorType::SinkLoad);
    assert!(error.context.unwrap().contains("batch=1"));

    // three attempts on batch 1, nothing after it
    let failed: Vec<_> = sink
        .calls_for("Person")
        .into_iter()
        .filter(|c| c.batch_index == 1)
        .collect();
    assert_eq!(failed.len(), 3);
    assert_eq!(source.served_for(":Person").len(), 2);
}

#[tokio::test]
async fn test_rejected_batch_is_not_retried() {
    let dir = TempDir::new().unwrap();
    let source = Arc::new(MemorySource::new().with_node(&["Person"], 20));
    let sink = Arc::new(RecordingSink::new().rejecting_load("Person", 0));
    let ctx = context(source, Arc::clone(&sink), &dir, 10);

    let report = CategoryPipeline::prepare(ctx, person())
        .await
        .unwrap()
        .run()
        .await;

    assert_eq!(report.failed_batch, Some(0));
    assert_eq!(report.records_appended, 0);
    assert_eq!(sink.calls_for("Person").len(), 1);
}

#[tokio::test]
async fn test_count_failure_fails_prepare() {
    let dir = TempDir::new().unwrap();
    let source = Arc::new(
        MemorySource::new()
            .with_node(&["Person"], 10)
            .failing_count(":Person"),
    );
    let sink = Arc::new(RecordingSink::new());
    let ctx = context(source, sink, &dir, 10);

    let err = CategoryPipeline::prepare(ctx, person()).await.err().unwrap();
    assert!(matches!(err, SourceError::CountQueryFailed { .. }));
}

#[tokio::test]
async fn test_edge_rows_carry_endpoints() {
    let dir = TempDir::new().unwrap();
    let source = Arc::new(MemorySource::new().with_edge(&["Person"], "KNOWS", &["Person"], 4));
    let sink = Arc::new(RecordingSink::new());
    let ctx = context(source, Arc::clone(&sink), &dir, 10);
    let knows = Category::edge(vec!["Person".into()], "KNOWS", vec!["Person".into()]);

    let report = CategoryPipeline::prepare(ctx, knows).await.unwrap().run().await;
    assert!(report.is_success());

    let staged =
        std::fs::read_to_string(dir.path().join("Person_KNOWS_Person-batch-0.csv")).unwrap();
    let header = staged.lines().next().unwrap();
    assert!(header.starts_with("__id"));
    assert!(header.contains("__from") && header.contains("__to"));
    assert_eq!(staged.lines().count(), 5);
}
