//! Contiguous chunking of an ordered work sequence

/// Split `items` into exactly `worker_count` contiguous chunks.
///
/// Every chunk holds `len / worker_count` items and the remainder is
/// appended to the last chunk, so the last chunk may be larger than the
/// others. With fewer items than workers all but the last chunk are empty.
/// A worker count of zero is treated as one.
pub fn partition<T>(items: Vec<T>, worker_count: usize) -> Vec<Vec<T>> {
    let workers = worker_count.max(1);
    let chunk_size = items.len() / workers;

    let mut rest = items.into_iter();
    let mut chunks: Vec<Vec<T>> = (0..workers)
        .map(|_| rest.by_ref().take(chunk_size).collect())
        .collect();

    if let Some(last) = chunks.last_mut() {
        last.extend(rest);
    }

    chunks
}
