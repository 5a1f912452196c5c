//! Bounded, order-preserving fan-out over independent reads.

use std::fmt::Display;
use std::future::Future;

use ah_api_types::DroppedItem;
use ah_chain_client::ChainResult;
use futures::stream::{self, StreamExt};
use tracing::warn;

/// Successful results in input order, plus every item that failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aggregate<T> {
    pub items: Vec<T>,
    pub dropped: Vec<DroppedItem>,
}

impl<T> Default for Aggregate<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            dropped: Vec::new(),
        }
    }
}

impl<T> Aggregate<T> {
    pub fn drop_item(&mut self, id: impl Display, reason: impl Display) {
        let item = DroppedItem {
            id: id.to_string(),
            reason: reason.to_string(),
        };
        warn!("dropping {} from aggregate: {}", item.id, item.reason);
        self.dropped.push(item);
    }
}

/// Run `fetch` for every id with at most `limit` calls in flight.
///
/// Results are joined by position, so completion order never reorders output.
pub async fn fan_out<I, T, F, Fut>(ids: Vec<I>, limit: usize, fetch: F) -> Aggregate<T>
where
    I: Display + Clone,
    F: Fn(I) -> Fut,
    Fut: Future<Output = ChainResult<T>>,
{
    let results: Vec<(I, ChainResult<T>)> = stream::iter(ids)
        .map(|id| {
            let call = fetch(id.clone());
            async move { (id, call.await) }
        })
        .buffered(limit.max(1))
        .collect()
        .await;

    let mut aggregate = Aggregate::default();
    for (id, result) in results {
        match result {
            Ok(item) => aggregate.items.push(item),
            Err(err) => aggregate.drop_item(id, err),
        }
    }
    aggregate
}
