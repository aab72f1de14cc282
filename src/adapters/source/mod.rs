//! Graph source adapters
//!
//! - [`traits`] - the [`SourceConnector`] seam the pipeline reads through
//! - [`cypher`] - query builders for discovery, counting and paging
//! - [`neo4j`] - Neo4j HTTP transactional endpoint implementation
//! - [`transform`] - raw result rows to [`PropertyRecord`](crate::domain::PropertyRecord)

pub mod cypher;
pub mod neo4j;
pub mod traits;
pub mod transform;

pub use cypher::Query;
pub use neo4j::Neo4jSource;
pub use traits::{RawRow, SourceConnector, SourceResult};
