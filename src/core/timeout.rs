//! Timeout Guard
//!
//! Bounds a single upstream call. The guard owns the operation future;
//! when the timer wins, the future is dropped, which cancels the in-flight
//! request (reqwest aborts the connection on drop) and releases the timer.

use std::future::Future;
use std::time::Duration;
use tracing::debug;

use crate::models::errors::{FetchError, FetchResult};

/// Run `operation`, failing with `Timeout` once `timeout` elapses.
///
/// Resolves no later than `timeout` plus scheduler slack on every path.
pub async fn guard<T, F>(operation: F, timeout: Duration) -> FetchResult<T>
where
    F: Future<Output = FetchResult<T>>,
{
    match tokio::time::timeout(timeout, operation).await {
        Ok(outcome) => outcome,
        Err(_) => {
            debug!("⏱️ Attempt cancelled after {}ms", timeout.as_millis());
            Err(FetchError::timeout(timeout))
        }
    }
}
