//! deedsync - land record transfer tool

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use deedsync::db::{self, PgRecordStore};
use deedsync::storage::Storage;
use deedsync::{Config, Ingestor, UploadJob};
use deedsync_common::logging::{init_logging, LogConfig, LogLevel};
use deedsync_common::DeedsyncError;
use serde::Serialize;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "deedsync")]
#[command(author, version, about = "Land record upload and ingestion tool")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Also write the run report as JSON to this file
    #[arg(long, global = true, env = "DEEDSYNC_REPORT")]
    report: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload scanned images to S3 under a flat key prefix
    Upload {
        /// Root holding one folder per volume
        #[arg(short, long)]
        source: Option<PathBuf>,

        /// Destination key prefix
        #[arg(short, long)]
        prefix: Option<String>,

        /// Concurrent uploads per folder
        #[arg(short, long)]
        workers: Option<usize>,
    },

    /// Load header and detail extracts into the database
    Ingest {
        /// Root holding the source folders
        #[arg(short, long)]
        source: Option<PathBuf>,

        /// Extract files loaded at the same time
        #[arg(long)]
        outer_workers: Option<usize>,

        /// Record workers per extract file
        #[arg(long)]
        inner_workers: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    // Environment variables take precedence
    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("deedsync")
        .build()
        .with_env_overrides()?;

    let _log_guard = init_logging(&log_config)?;

    let mut config = Config::load()?;

    match cli.command {
        Command::Upload {
            source,
            prefix,
            workers,
        } => {
            if let Some(source) = source {
                config.upload.source_root = source;
            }
            if let Some(prefix) = prefix {
                config.upload.dest_prefix = prefix;
            }
            if let Some(workers) = workers {
                config.upload.workers = workers;
            }
            config.validate_upload()?;

            let storage = Storage::new(config.storage.clone())
                .await
                .map_err(|e| DeedsyncError::Storage(format!("{e:#}")))?;
            let root = config.upload.source_root.clone();
            info!(root = %root.display(), bucket = %config.storage.bucket, "Upload starting");

            let report = UploadJob::new(Arc::new(storage), config.upload).run(&root).await?;
            finish(&report, cli.report.as_deref())?;
        },
        Command::Ingest {
            source,
            outer_workers,
            inner_workers,
        } => {
            if let Some(source) = source {
                config.ingest.source_root = source;
            }
            if let Some(outer) = outer_workers {
                config.ingest.outer_workers = outer;
            }
            if let Some(inner) = inner_workers {
                config.ingest.inner_workers = inner;
            }
            config.validate_ingest()?;

            let pool = db::connect(&config.database, config.ingest.required_connections()).await?;
            let store = Arc::new(PgRecordStore::new(pool));
            let root = config.ingest.source_root.clone();
            info!(root = %root.display(), "Ingest starting");

            let report = Ingestor::new(store, &config.ingest).run(&root).await?;
            finish(&report, cli.report.as_deref())?;
        },
    }

    info!("Run complete");
    Ok(())
}

/// Print the report to stdout and optionally save it as JSON.
fn finish<R: Display + Serialize>(report: &R, json_path: Option<&Path>) -> Result<()> {
    print!("{report}");

    if let Some(path) = json_path {
        let json = serde_json::to_vec_pretty(report).map_err(DeedsyncError::from)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
        info!(path = %path.display(), "Report written");
    }

    Ok(())
}
