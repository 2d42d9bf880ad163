//! Referential ingestion of land-record extracts
//!
//! Each source folder holds a header extract (one record per document) and
//! a detail extract (grantor/grantee pairs keyed by the document's
//! `PRSERV`). Files are loaded `outer_workers` at a time, each file's
//! records by `inner_workers` chunk tasks, and the detail phase does not
//! start until every header file has been loaded.

use deedsync_common::{DeedsyncError, Result};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::config::IngestConfig;
use crate::engine::{ItemOutcome, Outcome, PartitionedExecutor, ResultAggregator, RunReport};

pub mod decode;
pub mod loader;
pub mod phases;
pub mod source;
pub mod store;

pub use decode::{
    decode_document, decode_party, ColumnMap, DocumentRecord, Party, PartyRecord, PartyRole,
};
pub use loader::{DetailLoader, HeaderLoader};
pub use phases::{Phase, PhaseScheduler};
pub use source::{
    discover_sources, read_extract, split_extract, RawRecord, SourceFolder, SourceLayout,
};
pub use store::{RecordStore, StoreSession};

/// Which of a source folder's two extracts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractKind {
    Header,
    Detail,
}

impl ExtractKind {
    fn path(self, source: &SourceFolder) -> &Path {
        match self {
            ExtractKind::Header => &source.header_path,
            ExtractKind::Detail => &source.detail_path,
        }
    }
}

/// Per-phase reports of one ingest run
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    /// One entry per source folder: committed when both extracts were found
    pub sources: RunReport,
    pub headers: RunReport,
    pub details: RunReport,
}

impl fmt::Display for IngestReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.sources, self.headers, self.details)
    }
}

pub struct Ingestor<S> {
    store: Arc<S>,
    layout: SourceLayout,
    outer_workers: usize,
    inner_workers: usize,
}

impl<S: RecordStore> Ingestor<S> {
    pub fn new(store: Arc<S>, config: &IngestConfig) -> Self {
        Self {
            store,
            layout: SourceLayout::from(config),
            outer_workers: config.outer_workers.max(1),
            inner_workers: config.inner_workers.max(1),
        }
    }

    /// Load every source folder under `root`, headers first.
    #[instrument(skip(self, root), fields(root = %root.display()))]
    pub async fn run(&self, root: &Path) -> Result<IngestReport> {
        if !root.is_dir() {
            return Err(DeedsyncError::SourceRoot(root.to_path_buf()));
        }

        let discovery = {
            let root = root.to_path_buf();
            let layout = self.layout.clone();
            tokio::task::spawn_blocking(move || discover_sources(&root, &layout))
                .await
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))??
        };
        let sources = ResultAggregator::new("sources");
        for (folder, err) in discovery.skipped {
            warn!(folder = %folder, "Skipping source folder: {}", err);
            sources.record(ItemOutcome::new(folder, Outcome::skipped(err.to_string())));
        }
        for source in &discovery.sources {
            sources.record(ItemOutcome::new(source.name.clone(), Outcome::Committed));
        }

        info!(
            sources = discovery.sources.len(),
            outer_workers = self.outer_workers,
            inner_workers = self.inner_workers,
            "Starting ingest"
        );

        let (headers, details) = PhaseScheduler::new(self, &discovery.sources)
            .load_headers()
            .await
            .release()
            .load_details()
            .await
            .finish();

        Ok(IngestReport {
            sources: sources.report(),
            headers,
            details,
        })
    }

    /// Load one extract kind from every source, `outer_workers` files at a
    /// time, and return after the last file is done.
    pub(crate) async fn load_phase(
        &self,
        sources: &[SourceFolder],
        kind: ExtractKind,
        aggregator: &ResultAggregator,
    ) {
        stream::iter(sources)
            .map(|source| self.load_file(source, kind, aggregator))
            .buffer_unordered(self.outer_workers)
            .collect::<Vec<()>>()
            .await;
    }

    /// Load one extract file into the store.
    ///
    /// Problems with the file as a whole (unreadable, or a detail extract
    /// with no key column) become a single outcome named after the file.
    pub async fn load_file(
        &self,
        source: &SourceFolder,
        kind: ExtractKind,
        aggregator: &ResultAggregator,
    ) {
        let path = kind.path(source);
        let label = source.label(path);

        let text = match read_extract(path).await {
            Ok(text) => text,
            Err(err) => {
                aggregator.record(ItemOutcome::new(label, Outcome::failed(format!("{err:#}"))));
                return;
            },
        };

        let Some(extract) = split_extract(&label, &text) else {
            info!(file = %label, "Extract holds no records");
            return;
        };
        drop(text);

        // Headers without the key column still load, with a null PRSERV.
        // Details without it can never find a parent.
        let columns = ColumnMap::from_header(&extract.header);
        if kind == ExtractKind::Detail {
            if let Err(err) = columns.require(decode::column::PRSERV) {
                warn!(file = %label, "Skipping extract: {}", err);
                aggregator.record(ItemOutcome::new(label, Outcome::skipped(err.to_string())));
                return;
            }
        }

        let records = extract.records.len();
        let columns = Arc::new(columns);
        let executor = PartitionedExecutor::new(self.inner_workers);
        let outcomes = match kind {
            ExtractKind::Header => {
                let loader = HeaderLoader::new(Arc::clone(&self.store), columns);
                executor.run(extract.records, Arc::new(loader)).await
            },
            ExtractKind::Detail => {
                let loader = DetailLoader::new(Arc::clone(&self.store), columns);
                executor.run(extract.records, Arc::new(loader)).await
            },
        };

        let committed = outcomes.iter().filter(|o| o.outcome.is_committed()).count();
        info!(file = %label, records, committed, "Extract loaded");
        aggregator.extend(outcomes);
    }
}
