// Cartograph - Neo4j to BigQuery Export Tool
// Copyright (c) 2025 Cartograph Contributors
// Licensed under the MIT License

//! # Cartograph - Neo4j to BigQuery Export
//!
//! Cartograph copies a whole property graph out of Neo4j into BigQuery, one table per
//! structurally homogeneous group of entities.
//!
//! ## Overview
//!
//! - **Discovers** every node label combination and every `(from, type, to)`
//!   relationship shape
//! - **Pages** through each category with `SKIP`/`LIMIT` in stable id order
//! - **Stages** each page as a CSV file with a column layout that only ever grows
//! - **Loads** each file into BigQuery as an append job, schema autodetected on the
//!   first batch
//!
//! Categories run concurrently up to a global limit; pages within a category run
//! strictly in order.
//!
//! ## Architecture
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`core`] - Discovery, cursor, pool, staging, pipeline and orchestration
//! - [`adapters`] - Neo4j source and BigQuery sink
//! - [`domain`] - Categories, records, identifiers and errors
//! - [`config`] - Configuration management
//! - [`logging`] - Structured logging
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cartograph::config::load_config;
//! use cartograph::core::export::ExportCoordinator;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = load_config("cartograph.toml")?;
//!     let coordinator = ExportCoordinator::from_config(config)?;
//!
//!     let summary = coordinator.execute_export().await?;
//!
//!     println!("Appended {} rows", summary.records_appended);
//!     Ok(())
//! }
//! ```
//!
//! ## Following Progress
//!
//! The coordinator publishes its phase on a watch channel:
//!
//! ```rust,no_run
//! use cartograph::core::export::{ExportCoordinator, ExportPhase};
//!
//! # async fn example(coordinator: ExportCoordinator) {
//! let mut phases = coordinator.subscribe();
//! tokio::spawn(async move {
//!     while phases.changed().await.is_ok() {
//!         let phase: ExportPhase = *phases.borrow();
//!         println!("export is {phase}");
//!     }
//! });
//! let _ = coordinator.execute_export().await;
//! # }
//! ```
//!
//! ## Error Handling
//!
//! Cartograph uses [`domain::CartographError`] for all errors:
//!
//! ```rust,no_run
//! use cartograph::domain::CartographError;
//!
//! fn example() -> Result<(), CartographError> {
//!     let config = cartograph::config::load_config("cartograph.toml")?;
//!     Ok(())
//! }
//! ```
//!
//! Discovery and dataset creation failures abort the run. Anything after that is
//! contained to its category and reported in the
//! [`ExportSummary`](core::export::ExportSummary).

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod logging;
