//! Export orchestration and reporting
//!
//! - [`coordinator`] runs discovery, preparation and draining for one export
//! - [`summary`] collects per-category reports and typed errors

pub mod coordinator;
pub mod summary;

pub use coordinator::{ExportCoordinator, ExportPhase};
pub use summary::{CategoryReport, ExportError, ExportErrorType, ExportSummary};
