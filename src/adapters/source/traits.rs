//! Source connector trait
//!
//! The pipeline only ever talks to the graph store through this trait, which keeps
//! the cursor and discovery logic testable against an in-memory fake.

use super::cypher::Query;
use crate::domain::SourceError;
use async_trait::async_trait;

/// One result row, keyed by column name
pub type RawRow = serde_json::Map<String, serde_json::Value>;

/// Result type for source operations
pub type SourceResult<T> = std::result::Result<T, SourceError>;

/// Read access to a graph store
///
/// One connector is shared by every concurrent fetch in an export, so
/// implementations must be safe to call from many tasks at once.
#[async_trait]
pub trait SourceConnector: Send + Sync {
    /// Run a query that returns a single `count` column
    async fn count(&self, query: &Query) -> SourceResult<u64>;

    /// Run a page query with `$skip` and `$limit` bound
    async fn page(&self, query: &Query, skip: u64, limit: u64) -> SourceResult<Vec<RawRow>>;

    /// Run a query and return every row
    async fn rows(&self, query: &Query) -> SourceResult<Vec<RawRow>>;

    /// Release the connection; later calls fail with [`SourceError::Closed`]
    async fn close(&self) -> SourceResult<()>;

    /// Endpoint description for logs
    fn endpoint(&self) -> &str;
}
