//! Fetch-With-Retry
//!
//! One resilient upstream call: every attempt runs inside the Timeout Guard,
//! transient failures back off `base_delay * 2^attempt` before the next
//! attempt, and only the final outcome leaves this module.
//!
//! Worst-case latency is `RetryConfig::worst_case_latency()`
//! (`(max_retries + 1) * base_timeout + Σ delays`). The loop runs under an
//! outer deadline of that bound so callers can size their own deadlines.

use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use super::{backoff, timeout};
use crate::models::config::{Jitter, RetryConfig};
use crate::models::errors::{FetchError, FetchResult};
use crate::models::types::{RetryAttempt, UpstreamResponse};

/// Scheduler slack on top of the worst-case bound before the outer deadline fires
const DEADLINE_SLACK: Duration = Duration::from_millis(100);

/// Attempt log preallocation; large budgets grow the log on demand
const LOG_PREALLOC: u32 = 8;

/// Run `fetch` with timeouts and exponential backoff.
///
/// Responses whose status is not in `retryable_status_codes` are returned
/// as-is, including final non-2xx statuses such as 404.
pub async fn fetch_with_retry<F, Fut>(fetch: F, config: &RetryConfig) -> FetchResult<UpstreamResponse>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = FetchResult<UpstreamResponse>>,
{
    fetch_with_retry_traced(fetch, config).await.0
}

/// Same as [`fetch_with_retry`], also returning one [`RetryAttempt`] per attempt made.
pub async fn fetch_with_retry_traced<F, Fut>(
    mut fetch: F,
    config: &RetryConfig,
) -> (FetchResult<UpstreamResponse>, Vec<RetryAttempt>)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = FetchResult<UpstreamResponse>>,
{
    let mut log = Vec::with_capacity(config.max_attempts().min(LOG_PREALLOC) as usize);
    let deadline = config.worst_case_latency().saturating_add(DEADLINE_SLACK);

    let outcome = tokio::time::timeout(deadline, run_attempts(&mut fetch, config, &mut log)).await;

    let result = match outcome {
        Ok(result) => result,
        Err(_) => {
            warn!("⏱️ Retry loop hit its {}ms deadline", deadline.as_millis());
            Err(FetchError::timeout(deadline).after_attempts(log.len() as u32))
        }
    };

    (result, log)
}

async fn run_attempts<F, Fut>(
    fetch: &mut F,
    config: &RetryConfig,
    log: &mut Vec<RetryAttempt>,
) -> FetchResult<UpstreamResponse>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = FetchResult<UpstreamResponse>>,
{
    let mut previous_delay = config.base_delay;
    let mut attempt: u32 = 0;

    loop {
        let failure = match timeout::guard(fetch(), config.base_timeout).await {
            Ok(response) if !config.is_retryable_status(response.status) => {
                if attempt > 0 {
                    debug!("✅ Upstream recovered on attempt {}/{}", attempt + 1, config.max_attempts());
                }
                log.push(RetryAttempt {
                    attempt_number: attempt,
                    failure_kind: None,
                    status: Some(response.status),
                    delay_before_next: None,
                });
                return Ok(response);
            }
            Ok(response) => FetchError::retryable_status(response.status),
            Err(err) => err,
        };

        let kind = failure.kind;
        if !backoff::is_retryable(kind, attempt, config.max_retries) {
            if kind.is_transient() {
                warn!("⚠️ Retries exhausted after {} attempts: {}", attempt + 1, failure);
            }
            log.push(RetryAttempt {
                attempt_number: attempt,
                failure_kind: Some(kind),
                status: failure.status,
                delay_before_next: None,
            });
            return Err(failure.after_attempts(attempt + 1));
        }

        let delay = match config.jitter {
            Jitter::None => config.delay_for(attempt),
            Jitter::Decorrelated => {
                let delay = backoff::decorrelated_delay(
                    config.base_delay,
                    previous_delay,
                    config.delay_for(attempt),
                );
                previous_delay = delay;
                delay
            }
        };

        debug!(
            "⏳ Retry {}/{} after {}ms ({})",
            attempt + 2,
            config.max_attempts(),
            delay.as_millis(),
            failure
        );
        log.push(RetryAttempt {
            attempt_number: attempt,
            failure_kind: Some(kind),
            status: failure.status,
            delay_before_next: Some(delay),
        });

        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}
