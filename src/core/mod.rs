//! Core export engine for Cartograph.
//!
//! # Modules
//!
//! - [`discovery`] - Enumerates node and relationship categories
//! - [`cursor`] - Counts a category and walks it page by page
//! - [`pool`] - Bounded concurrency pool shared by both levels of an export
//! - [`staging`] - Writes each page to a CSV file
//! - [`pipeline`] - Fetch, stage and append for one category
//! - [`export`] - Run orchestration and reporting
//!
//! # Export Workflow
//!
//! 1. **Discover**: enumerate categories and create the dataset, concurrently
//! 2. **Prepare**: count every typed category under the global limit
//! 3. **Drain**: run up to `concurrency` categories at once, each strictly page by page
//! 4. **Report**: collect per-category reports into an export summary
//!
//! # Example
//!
//! ```rust,no_run
//! use cartograph::config::load_config;
//! use cartograph::core::export::ExportCoordinator;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("cartograph.toml")?;
//! let coordinator = ExportCoordinator::from_config(config)?;
//!
//! let summary = coordinator.execute_export().await?;
//!
//! println!("Categories: {}", summary.categories_prepared);
//! println!("Rows appended: {}", summary.records_appended);
//! println!("Failed: {}", summary.categories_failed());
//! # Ok(())
//! # }
//! ```

pub mod cursor;
pub mod discovery;
pub mod export;
pub mod pipeline;
pub mod pool;
pub mod staging;

