//! Warehouse sink adapters
//!
//! - [`traits`] - the [`SinkConnector`] seam plus dataset/table handles
//! - [`registry`] - single-flight table creation shared by every pipeline
//! - [`bigquery`] - BigQuery REST implementation
//! - [`dry_run`] - logs what would be loaded and writes nothing remote

pub mod bigquery;
pub mod dry_run;
pub mod registry;
pub mod traits;

pub use bigquery::BigQuerySink;
pub use dry_run::DryRunSink;
pub use registry::TableRegistry;
pub use traits::{load_job_id, DatasetHandle, LoadResult, SinkConnector, SinkResult, TableHandle};
