//! Domain models and types for Cartograph.
//!
//! This module contains the core domain models, types, and business rules.
//!
//! # Overview
//!
//! The domain layer provides:
//! - **Categories** ([`Category`]): the unit of export, one per label combination
//!   or relationship triple
//! - **Records** ([`PropertyRecord`], [`PropertyValue`]): schema-less entity rows
//! - **Strongly-typed identifiers** ([`DatasetId`], [`TableId`])
//! - **Error types** ([`CartographError`], [`SourceError`], [`SinkError`])
//! - **Result type alias** ([`Result`])
//!
//! # Error Handling
//!
//! All fallible operations return [`Result<T, CartographError>`]:
//!
//! ```rust
//! use cartograph::domain::{CartographError, Result};
//!
//! fn example() -> Result<()> {
//!     let config = cartograph::config::load_config("cartograph.toml")?;
//!     Ok(())
//! }
//! ```

pub mod category;
pub mod errors;
pub mod ids;
pub mod record;
pub mod result;

// Re-export commonly used types for convenience
pub use category::{Category, CategoryKind};
pub use errors::{CartographError, SinkError, SourceError};
pub use ids::{DatasetId, TableId};
pub use record::{PropertyRecord, PropertyValue};
pub use result::Result;
