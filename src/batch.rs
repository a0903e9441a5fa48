//! Bounded-concurrency batch execution.
//!
//! Create and refresh operations fan a remote call out over every item of a
//! working set. At most `limit` calls are in flight at once; a failing item
//! never aborts the batch, it becomes a tagged [`BatchOutcome::Failed`] so
//! callers can persist a marker row without losing the item's identity.

use std::future::Future;

use futures::stream::{self, StreamExt};
use metrics::counter;
use thiserror::Error;
use tracing::warn;

use crate::auth::CredentialError;
use crate::http::ApiError;

/// Default number of in-flight requests per batch.
pub const DEFAULT_CONCURRENCY: usize = 5;

/// Failure of one item's authenticated call. Workers re-acquire their
/// credential from the cache on every call, so acquisition can fail
/// mid-batch alongside the remote call itself.
#[derive(Debug, Error)]
pub enum CallError {
    #[error("credential acquisition failed: {0}")]
    Credential(#[from] CredentialError),
    #[error(transparent)]
    Api(#[from] ApiError),
}

impl CallError {
    /// HTTP status of the remote rejection, when one was received.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Api(error) => error.status_code(),
            Self::Credential(_) => None,
        }
    }
}

/// Result of one item's remote call, keeping the input item in both arms.
#[derive(Debug)]
pub enum BatchOutcome<I, T, E = CallError> {
    Succeeded { item: I, output: T },
    Failed { item: I, error: E },
}

impl<I, T, E> BatchOutcome<I, T, E> {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    pub fn item(&self) -> &I {
        match self {
            Self::Succeeded { item, .. } | Self::Failed { item, .. } => item,
        }
    }
}

/// Run `op` over every item with at most `limit` calls in flight. Returns one
/// outcome per input item, in completion order. A `limit` of zero is treated
/// as one.
pub async fn run_all<I, T, E, F, Fut>(
    items: Vec<I>,
    limit: usize,
    op: F,
) -> Vec<BatchOutcome<I, T, E>>
where
    I: Clone,
    F: Fn(I) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let limit = limit.max(1);
    let total = items.len();

    let outcomes: Vec<BatchOutcome<I, T, E>> = stream::iter(items)
        .map(|item| {
            let call = op(item.clone());
            async move {
                match call.await {
                    Ok(output) => BatchOutcome::Succeeded { item, output },
                    Err(error) => BatchOutcome::Failed { item, error },
                }
            }
        })
        .buffer_unordered(limit)
        .collect()
        .await;

    let failures = outcomes.iter().filter(|o| o.is_failure()).count();
    counter!("batch_items_total").increment(total as u64);
    if failures > 0 {
        counter!("batch_item_failures_total").increment(failures as u64);
        warn!(total, failures, "batch completed with failures");
    }
    outcomes
}
