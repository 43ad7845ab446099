//! Pagination and batched describe fan-out shared by the gatherers.

use futures::stream::{FuturesUnordered, StreamExt};
use std::future::Future;
use tracing::debug;

use crate::aws::Page;
use crate::error::Result;

/// Follows continuation tokens until a page comes back without one.
///
/// Items are accumulated in response order. An empty token ends the loop the
/// same way a missing one does.
pub async fn paginate<T, F, Fut>(mut fetch: F) -> Result<Vec<T>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<Page<T>>>,
{
    let mut items = Vec::new();
    let mut next_token = None;

    loop {
        let page = fetch(next_token).await?;
        next_token = page.continuation();
        items.extend(page.items);

        if next_token.is_none() {
            return Ok(items);
        }
    }
}

/// Splits identifiers into contiguous, in-order batches of at most `batch_size`.
pub fn partition(ids: &[String], batch_size: usize) -> Vec<Vec<String>> {
    ids.chunks(batch_size.max(1)).map(<[String]>::to_vec).collect()
}

/// Describes `ids` in batches of `batch_size`, one concurrent call per batch.
///
/// Every dispatched batch is awaited, even after one of them fails. Results are
/// concatenated in completion order; order inside a batch is kept. If any batch
/// fails, the first failure observed is returned and nothing else.
///
/// An empty `ids` returns an empty result without calling `describe`.
pub async fn describe_in_batches<T, F, Fut>(
    ids: Vec<String>,
    batch_size: usize,
    describe: F,
) -> Result<Vec<T>>
where
    F: Fn(Vec<String>) -> Fut,
    Fut: Future<Output = Result<Vec<T>>>,
{
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let batches = partition(&ids, batch_size);
    let dispatched = batches.len();
    let mut in_flight: FuturesUnordered<Fut> = batches.into_iter().map(describe).collect();

    let mut described = Vec::with_capacity(ids.len());
    let mut first_error = None;
    let mut drained = 0;

    while let Some(result) = in_flight.next().await {
        drained += 1;
        match result {
            Ok(batch) if first_error.is_none() => described.extend(batch),
            Ok(_) => {}
            Err(e) if first_error.is_none() => first_error = Some(e),
            Err(e) => debug!(error = %e, "Dropping error from batch after first failure"),
        }
    }
    debug!(dispatched, drained, "Drained describe batches");

    match first_error {
        Some(e) => Err(e),
        None => Ok(described),
    }
}
