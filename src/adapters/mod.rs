//! External system integrations for Cartograph.
//!
//! - [`source`] - graph store access (Neo4j HTTP API)
//! - [`sink`] - batch-load warehouse access (BigQuery REST API, dry run)
//! - [`factory`] - builds connectors from configuration
//!
//! # Design Pattern
//!
//! Adapters isolate external systems behind the [`SourceConnector`] and
//! [`SinkConnector`] traits so the pipeline can be exercised against in-memory
//! fakes.
//!
//! ```rust,no_run
//! use cartograph::adapters::factory::{create_sink, create_source};
//! use cartograph::config::CartographConfig;
//!
//! # fn example() -> cartograph::domain::Result<()> {
//! let config = CartographConfig::default();
//! let source = create_source(&config)?;
//! let sink = create_sink(&config)?;
//! # Ok(())
//! # }
//! ```

pub mod factory;
pub mod sink;
pub mod source;

pub use sink::{SinkConnector, TableRegistry};
pub use source::SourceConnector;
