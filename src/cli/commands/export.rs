//! Export command implementation
//!
//! This module implements the `export` command, which copies every node and
//! relationship category from Neo4j into a fresh BigQuery dataset.

use crate::config::{load_config, CartographConfig, LoggingConfig};
use crate::core::export::{ExportCoordinator, ExportSummary};
use crate::domain::{CartographError, SinkError, SourceError};
use crate::logging::{init_logging, LoggingGuard};
use clap::Args;

/// Process exit codes
pub mod exit_code {
    pub const SUCCESS: i32 = 0;
    pub const PARTIAL: i32 = 1;
    pub const CONFIGURATION: i32 = 2;
    pub const CONNECTION: i32 = 4;
    pub const FATAL: i32 = 5;
}

/// Arguments for the export command
#[derive(Args, Debug, Default)]
pub struct ExportArgs {
    /// Skip confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Dry run mode - stage CSV files without writing to BigQuery
    #[arg(long)]
    pub dry_run: bool,

    /// Override how many categories are exported at once
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Override the number of entities fetched per page
    #[arg(long)]
    pub page_size: Option<u64>,

    /// Override the destination dataset name
    #[arg(long)]
    pub dataset: Option<String>,

    /// Override the directory staged CSV files are written to
    #[arg(long)]
    pub staging_dir: Option<String>,
}

impl ExportArgs {
    /// Execute the export command
    ///
    /// Logging is initialised here, once the configuration is known, at
    /// `log_level` or else `application.log_level`.
    pub async fn execute(&self, config_path: &str, log_level: Option<&str>) -> anyhow::Result<i32> {
        let mut config = match load_config(config_path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to load configuration: {e}");
                return Ok(exit_code::CONFIGURATION);
            }
        };

        self.apply_overrides(&mut config);

        if let Err(e) = config.validate() {
            eprintln!("Configuration validation failed: {e}");
            return Ok(exit_code::CONFIGURATION);
        }

        let level = log_level.unwrap_or(&config.application.log_level).to_string();
        let _logging = match init_export_logging(&level, &config.logging) {
            Ok(guard) => guard,
            Err(e) => {
                eprintln!("Failed to initialize logging: {e}");
                return Ok(exit_code::CONFIGURATION);
            }
        };

        tracing::info!(
            version = env!("CARGO_PKG_VERSION"),
            config = %config_path,
            "Starting export command"
        );

        if config.export.dry_run {
            tracing::info!("Dry run mode enabled - no data will be written");
            println!("🔍 DRY RUN MODE - CSV files are staged but nothing is loaded");
            println!();
        }

        // Confirmation prompt (unless --yes or dry-run)
        if !self.yes && !config.export.dry_run {
            println!("Export Configuration:");
            println!("  Source: {}", config.source.uri);
            println!("  Project: {}", config.sink.project_id);
            println!(
                "  Dataset: {}",
                config
                    .sink
                    .dataset_name
                    .as_deref()
                    .unwrap_or("(generated)")
            );
            println!("  Concurrency: {}", config.export.concurrency);
            println!("  Page size: {}", config.export.page_size);
            println!("  Staging dir: {}", config.export.staging_dir);
            println!();
            print!("Proceed with export? [y/N]: ");
            use std::io::{self, Write};
            io::stdout().flush()?;

            let mut input = String::new();
            io::stdin().read_line(&mut input)?;

            if !input.trim().eq_ignore_ascii_case("y") {
                println!("Export cancelled.");
                return Ok(exit_code::SUCCESS);
            }
        }

        tracing::info!("Creating export coordinator");
        let coordinator = match ExportCoordinator::from_config(config) {
            Ok(c) => c,
            Err(e) => {
                tracing::error!(error = %e, "Failed to create export coordinator");
                eprintln!("Failed to initialize export: {e}");
                return Ok(exit_code::CONNECTION);
            }
        };

        tracing::info!("Executing export");
        println!("🚀 Starting export...");
        println!();

        let summary = match coordinator.execute_export().await {
            Ok(s) => s,
            Err(e) => {
                tracing::error!(error = %e, phase = %coordinator.phase(), "Export failed");
                eprintln!("Export failed: {e}");
                return Ok(exit_code_for(&e));
            }
        };

        print_summary(&summary);

        let code = if summary.is_successful() {
            println!("✅ Export completed successfully!");
            exit_code::SUCCESS
        } else {
            println!("⚠️  Export completed with failures");
            exit_code::PARTIAL
        };

        Ok(code)
    }

    fn apply_overrides(&self, config: &mut CartographConfig) {
        if self.dry_run {
            tracing::info!("Enabling dry-run mode from CLI");
            config.export.dry_run = true;
        }
        if let Some(concurrency) = self.concurrency {
            tracing::info!(concurrency, "Overriding concurrency from CLI");
            config.export.concurrency = concurrency;
        }
        if let Some(page_size) = self.page_size {
            tracing::info!(page_size, "Overriding page size from CLI");
            config.export.page_size = page_size;
        }
        if let Some(ref dataset) = self.dataset {
            tracing::info!(dataset = %dataset, "Overriding dataset from CLI");
            config.sink.dataset_name = Some(dataset.clone());
        }
        if let Some(ref dir) = self.staging_dir {
            tracing::info!(staging_dir = %dir, "Overriding staging directory from CLI");
            config.export.staging_dir = dir.clone();
        }
    }
}

/// Console plus the configured file layer, or console only when the log
/// directory cannot be used
fn init_export_logging(
    level: &str,
    logging: &LoggingConfig,
) -> crate::domain::Result<LoggingGuard> {
    match init_logging(level, logging) {
        Ok(guard) => Ok(guard),
        Err(e) if logging.local_enabled => {
            eprintln!("File logging unavailable ({e}); logging to the console only");
            init_logging(
                level,
                &LoggingConfig {
                    local_enabled: false,
                    ..logging.clone()
                },
            )
        }
        Err(e) => Err(e),
    }
}

/// Exit code for an export that aborted before draining
pub fn exit_code_for(error: &CartographError) -> i32 {
    match error {
        CartographError::Configuration(_) | CartographError::Validation(_) => {
            exit_code::CONFIGURATION
        }
        CartographError::Discovery(_)
        | CartographError::Source(
            SourceError::ConnectionFailed(_)
            | SourceError::AuthenticationFailed(_)
            | SourceError::Timeout(_),
        )
        | CartographError::Sink(
            SinkError::ConnectionFailed(_)
            | SinkError::AuthenticationFailed(_)
            | SinkError::DatasetCreationFailed { .. },
        ) => exit_code::CONNECTION,
        _ => exit_code::FATAL,
    }
}

fn print_summary(summary: &ExportSummary) {
    println!();
    println!("📊 Export Summary:");
    println!(
        "  Dataset: {}",
        summary.dataset.as_deref().unwrap_or("-")
    );
    if let Some(started) = summary.started_at {
        println!("  Started: {}", started.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    println!("  Categories Discovered: {}", summary.categories_discovered);
    println!("  Categories Skipped (untyped): {}", summary.categories_skipped);
    println!("  Categories Exported: {}", summary.categories_succeeded());
    println!("  Categories Failed: {}", summary.categories_failed());
    println!("  Total Records: {}", summary.total_records);
    println!("  Records Appended: {}", summary.records_appended);
    println!("  Duration: {:.2}s", summary.duration.as_secs_f64());
    println!("  Success Rate: {:.2}%", summary.success_rate());
    println!();

    let failed: Vec<_> = summary
        .categories
        .iter()
        .filter(|report| !report.is_success())
        .collect();
    if !failed.is_empty() {
        println!("❌ Failed categories:");
        for report in failed {
            let batch = report
                .failed_batch
                .map(|b| format!("batch {b}"))
                .unwrap_or_else(|| "-".to_string());
            println!(
                "  - {} ({}/{} pages, stopped at {})",
                report.category, report.pages_loaded, report.pages, batch
            );
        }
        println!();
    }

    if !summary.errors.is_empty() {
        println!("⚠️  Errors encountered:");
        for error in &summary.errors {
            println!("  - {:?}: {}", error.error_type, error.message);
            if let Some(context) = &error.context {
                println!("    Context: {context}");
            }
        }
        println!();
    }
}
