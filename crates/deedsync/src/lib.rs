//! deedsync
//!
//! Bulk transfer of county land records:
//!
//! - **upload**: flatten folders of scanned instrument images into one S3
//!   key prefix, disambiguating duplicate file names
//! - **ingest**: load `{EOR}`-delimited header and detail extracts into
//!   PostgreSQL, headers strictly before details
//!
//! Both jobs run on the [`engine`]: items are split into contiguous chunks,
//! each chunk is worked by its own task, and every item ends with exactly
//! one [`engine::Outcome`] in the run report.

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod ingest;
pub mod storage;
pub mod upload;

pub use config::Config;
pub use engine::{Outcome, RunReport};
pub use error::LayoutError;
pub use ingest::{IngestReport, Ingestor};
pub use upload::UploadJob;
