//! Partitioned, bounded-concurrency transfer engine
//!
//! Shared by the upload and ingest jobs:
//! 1. [`partition`] splits an ordered item list into contiguous chunks
//! 2. [`PartitionedExecutor`] runs one worker task per chunk and joins them
//! 3. [`ResultAggregator`] collects the per-item [`Outcome`]s into a report

pub mod aggregate;
pub mod executor;
pub mod outcome;
pub mod partition;

pub use aggregate::{Issue, IssueKind, OutcomeCounts, ResultAggregator, RunReport};
pub use executor::{ChunkWorker, PartitionedExecutor};
pub use outcome::{ItemOutcome, Outcome, WorkItem};
pub use partition::partition;
