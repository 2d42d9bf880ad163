//! Bounded worker pool over contiguous chunks
//!
//! One tokio task per chunk, each processing its chunk strictly in order.
//! The executor joins every task before returning, so callers get a barrier
//! for free: when `run` returns, no item of the input is still in flight.

use async_trait::async_trait;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, error, warn};

use super::outcome::{ItemOutcome, Outcome, WorkItem};
use super::partition::partition;

/// Per-chunk processing logic.
///
/// `acquire` runs once at the start of every chunk and its handle is dropped
/// when the chunk ends, on success, error or panic alike. Returning `Err`
/// from `process` means an unexpected failure: the chunk stops and its
/// remaining items are reported as failed. Expected per-item failures should
/// be returned as `Ok(Outcome::Failed(..))` instead.
#[async_trait]
pub trait ChunkWorker<T: WorkItem>: Send + Sync + 'static {
    type Handle: Send;

    async fn acquire(&self) -> anyhow::Result<Self::Handle>;

    async fn process(&self, handle: &mut Self::Handle, item: &T) -> anyhow::Result<Outcome>;
}

/// Runs a chunk worker over a partitioned item list
#[derive(Debug, Clone, Copy)]
pub struct PartitionedExecutor {
    workers: usize,
}

impl PartitionedExecutor {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }

    /// Process every item and return one outcome per item.
    ///
    /// Outcomes come back grouped by chunk in chunk order; inside a chunk
    /// they follow item order. Empty chunks never acquire a handle.
    pub async fn run<T, W>(&self, items: Vec<T>, worker: Arc<W>) -> Vec<ItemOutcome>
    where
        T: WorkItem,
        W: ChunkWorker<T>,
    {
        let total = items.len();
        let chunks = partition(items, self.workers);
        let chunk_count = chunks.len();

        let mut identities: Vec<Vec<String>> = Vec::with_capacity(chunk_count);
        let mut tasks = JoinSet::new();

        for (index, chunk) in chunks.into_iter().enumerate() {
            identities.push(chunk.iter().map(WorkItem::identity).collect());
            if chunk.is_empty() {
                continue;
            }

            let worker = Arc::clone(&worker);
            tasks.spawn(async move {
                let outcomes = run_chunk(index, chunk, worker.as_ref()).await;
                (index, outcomes)
            });
        }

        let mut finished: Vec<Option<Vec<ItemOutcome>>> = (0..chunk_count).map(|_| None).collect();

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, outcomes)) => finished[index] = Some(outcomes),
                Err(err) => error!(error = %err, "Chunk task terminated without reporting"),
            }
        }

        let mut outcomes = Vec::with_capacity(total);
        for (index, slot) in finished.into_iter().enumerate() {
            match slot {
                Some(chunk_outcomes) => outcomes.extend(chunk_outcomes),
                None => outcomes.extend(identities[index].iter().map(|id| {
                    ItemOutcome::new(id.clone(), Outcome::failed("chunk task terminated"))
                })),
            }
        }

        debug!(items = total, chunks = chunk_count, "Partitioned run joined");
        outcomes
    }
}

async fn run_chunk<T, W>(index: usize, chunk: Vec<T>, worker: &W) -> Vec<ItemOutcome>
where
    T: WorkItem,
    W: ChunkWorker<T>,
{
    let mut outcomes = Vec::with_capacity(chunk.len());

    let acquired = AssertUnwindSafe(worker.acquire()).catch_unwind().await;
    let mut handle = match flatten_panic(acquired) {
        Ok(handle) => handle,
        Err(reason) => {
            warn!(chunk = index, items = chunk.len(), error = %reason, "Chunk could not acquire a handle");
            let reason = format!("chunk aborted: {reason}");
            outcomes.extend(
                chunk
                    .iter()
                    .map(|item| ItemOutcome::new(item.identity(), Outcome::failed(reason.clone()))),
            );
            return outcomes;
        },
    };

    let mut items = chunk.into_iter();
    while let Some(item) = items.next() {
        let identity = item.identity();
        let processed = AssertUnwindSafe(worker.process(&mut handle, &item))
            .catch_unwind()
            .await;

        match flatten_panic(processed) {
            Ok(outcome) => outcomes.push(ItemOutcome::new(identity, outcome)),
            Err(reason) => {
                let remaining = items.len();
                error!(
                    chunk = index,
                    item = %identity,
                    remaining,
                    error = %reason,
                    "Unexpected error, aborting rest of chunk"
                );

                outcomes.push(ItemOutcome::new(identity.clone(), Outcome::failed(reason.clone())));
                let abort_reason = format!("chunk aborted after {identity}: {reason}");
                outcomes.extend(
                    items.by_ref().map(|rest| ItemOutcome::new(rest.identity(), Outcome::failed(abort_reason.clone()))),
                );
                break;
            },
        }
    }

    debug!(chunk = index, items = outcomes.len(), "Chunk finished");
    outcomes
}

fn flatten_panic<V>(
    result: Result<anyhow::Result<V>, Box<dyn Any + Send>>,
) -> Result<V, String> {
    match result {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(format!("{err:#}")),
        Err(payload) => Err(format!("worker panicked: {}", panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}
