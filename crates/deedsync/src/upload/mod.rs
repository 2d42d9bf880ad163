//! Bulk upload of scanned instrument folders into a flat S3 keyspace
//!
//! Every folder under the source root is expected to hold a fixed nested
//! subfolder (`BLU` by default). All files beneath it, minus the excluded
//! subfolder and extension, are uploaded under one shared key prefix with
//! their directory structure flattened away.

use async_trait::async_trait;
use deedsync_common::{DeedsyncError, Result};
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::config::UploadConfig;
use crate::engine::{
    ChunkWorker, ItemOutcome, Outcome, PartitionedExecutor, ResultAggregator, RunReport, WorkItem,
};
use crate::error::LayoutError;
use crate::storage::ObjectStore;

pub mod enumerate;
pub mod keys;

pub use enumerate::{discover_folders, enumerate_files, FileFilter, Listing};
pub use keys::{DestinationKey, KeyAssigner};

/// One local file bound to its destination key
#[derive(Debug, Clone)]
pub struct UploadItem {
    pub path: PathBuf,
    pub key: DestinationKey,
}

impl WorkItem for UploadItem {
    fn identity(&self) -> String {
        format!("{} -> {}", self.path.display(), self.key)
    }
}

struct UploadWorker<S> {
    store: Arc<S>,
}

#[async_trait]
impl<S: ObjectStore> ChunkWorker<UploadItem> for UploadWorker<S> {
    // the S3 client pools its own connections
    type Handle = ();

    async fn acquire(&self) -> anyhow::Result<()> {
        Ok(())
    }

    async fn process(&self, _: &mut (), item: &UploadItem) -> anyhow::Result<Outcome> {
        let key = item.key.to_string();
        match self.store.put_file(&key, &item.path).await {
            Ok(()) => Ok(Outcome::Committed),
            Err(err) => Ok(Outcome::failed(format!(
                "upload to s3://{}/{} failed: {err:#}",
                self.store.bucket(),
                key
            ))),
        }
    }
}

/// Files of one source folder, keys already assigned
struct FolderPlan {
    name: String,
    items: Vec<UploadItem>,
}

pub struct UploadJob<S> {
    store: Arc<S>,
    config: UploadConfig,
}

impl<S: ObjectStore> UploadJob<S> {
    pub fn new(store: Arc<S>, config: UploadConfig) -> Self {
        Self { store, config }
    }

    /// Upload every candidate under `root` and report per-file outcomes.
    ///
    /// Keys are assigned for the whole run before any upload starts, so the
    /// result does not depend on which folder finishes first.
    #[instrument(skip(self, root), fields(root = %root.display()))]
    pub async fn run(&self, root: &Path) -> Result<RunReport> {
        if !root.is_dir() {
            return Err(DeedsyncError::SourceRoot(root.to_path_buf()));
        }

        // The walk is blocking filesystem work
        let (plans, issues) = {
            let root = root.to_path_buf();
            let config = self.config.clone();
            tokio::task::spawn_blocking(move || plan(&root, &config))
                .await
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))??
        };

        let aggregator = ResultAggregator::new("upload");
        aggregator.extend(issues);

        let total: usize = plans.iter().map(|p| p.items.len()).sum();
        info!(
            folders = plans.len(),
            files = total,
            workers = self.config.workers,
            "Starting upload"
        );

        let executor = PartitionedExecutor::new(self.config.workers);
        let worker = Arc::new(UploadWorker {
            store: Arc::clone(&self.store),
        });
        let aggregator_ref = &aggregator;

        stream::iter(plans)
            .map(|plan| {
                let worker = Arc::clone(&worker);
                async move {
                    let files = plan.items.len();
                    let outcomes = executor.run(plan.items, worker).await;
                    let failed = outcomes.iter().filter(|o| !o.outcome.is_committed()).count();
                    info!(folder = %plan.name, files, failed, "Upload complete for folder");
                    aggregator_ref.extend(outcomes);
                }
            })
            .buffer_unordered(self.config.folder_concurrency.max(1))
            .collect::<Vec<()>>()
            .await;

        Ok(aggregator.report())
    }
}

/// Walk every folder under `root` and assign keys to its files.
///
/// Returns the per-folder plans plus outcomes for folders that were skipped
/// and entries the walk could not read.
fn plan(root: &Path, config: &UploadConfig) -> std::io::Result<(Vec<FolderPlan>, Vec<ItemOutcome>)> {
    let filter = FileFilter {
        excluded_folder: config.excluded_folder.clone(),
        excluded_extension: config.excluded_extension.clone(),
    };
    let mut keys = KeyAssigner::new(config.dest_prefix.clone());
    let mut plans = Vec::new();
    let mut issues = Vec::new();

    for folder in discover_folders(root)? {
        let name = folder
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| folder.display().to_string());
        let nested = folder.join(&config.nested_folder);

        if !nested.is_dir() {
            let err = LayoutError::MissingFolder {
                folder: config.nested_folder.clone(),
            };
            warn!(folder = %name, "Skipping folder: {}", err);
            issues.push(ItemOutcome::new(name, Outcome::skipped(err.to_string())));
            continue;
        }

        let listing = enumerate_files(&nested, &filter);
        for (path, error) in listing.unreadable {
            issues.push(ItemOutcome::new(
                path.display().to_string(),
                Outcome::failed(format!("unreadable: {error}")),
            ));
        }

        if listing.files.is_empty() {
            info!(folder = %name, "No files found");
            continue;
        }

        info!(folder = %name, files = listing.files.len(), "Enumerated upload folder");
        let items = listing
            .files
            .into_iter()
            .map(|path| {
                let key = keys.assign(&path);
                UploadItem { path, key }
            })
            .collect();

        plans.push(FolderPlan { name, items });
    }

    Ok((plans, issues))
}
