//! Connector factory
//!
//! Builds the source and sink connectors named by the configuration.

use crate::adapters::sink::{BigQuerySink, DryRunSink, SinkConnector};
use crate::adapters::source::{Neo4jSource, SourceConnector};
use crate::config::CartographConfig;
use crate::domain::Result;
use std::sync::Arc;

/// Create the graph source connector
///
/// # Errors
///
/// Returns an error if the HTTP client cannot be built
pub fn create_source(config: &CartographConfig) -> Result<Arc<dyn SourceConnector>> {
    tracing::info!(uri = %config.source.uri, database = %config.source.database, "Creating Neo4j source");
    let source = Neo4jSource::new(config.source.clone())?;
    Ok(Arc::new(source) as Arc<dyn SourceConnector>)
}

/// Create the warehouse sink connector
///
/// `export.dry_run` selects [`DryRunSink`]; otherwise BigQuery is used.
///
/// # Errors
///
/// Returns an error if no access token is configured for a real run
pub fn create_sink(config: &CartographConfig) -> Result<Arc<dyn SinkConnector>> {
    if config.export.dry_run {
        tracing::info!(project = %config.sink.project_id, "Creating dry-run sink");
        return Ok(Arc::new(DryRunSink::new(config.sink.project_id.clone())) as Arc<dyn SinkConnector>);
    }

    tracing::info!(project = %config.sink.project_id, "Creating BigQuery sink");
    let sink = BigQuerySink::new(config.sink.clone())?;
    Ok(Arc::new(sink) as Arc<dyn SinkConnector>)
}
