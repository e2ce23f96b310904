//! Integration tests for the resilient data layer
//!
//! End-to-end resolve scenarios on a paused clock: cache freshness, stale
//! fallback, final statuses, and concurrent resolves of one key.

use futures_util::future::{ready, FutureExt, Ready};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use sui_pulse::{
    Aggregator, CachePolicy, ErrorKind, FetchError, FetchResult, Origin, Requirement, RetryConfig, SubRequest, TtlCache,
    UpstreamResponse,
};

fn retry() -> RetryConfig {
    RetryConfig::default()
        .with_max_retries(2)
        .with_timeout(Duration::from_secs(1))
        .with_base_delay(Duration::from_millis(100))
}

/// Upstream that always answers `status` with `body`, counting calls
fn upstream(
    status: u16,
    body: Value,
    calls: Arc<AtomicU32>,
) -> impl FnMut() -> Ready<FetchResult<UpstreamResponse>> {
    move || {
        calls.fetch_add(1, Ordering::SeqCst);
        ready(Ok(UpstreamResponse::new(status, body.to_string())))
    }
}

#[tokio::test(start_paused = true)]
async fn test_sui_tvl_fresh_then_cached_then_stale() {
    let aggregator = Aggregator::<Value>::new(TtlCache::new());
    let policy = CachePolicy::new(Duration::from_secs(120));
    let calls = Arc::new(AtomicU32::new(0));

    // t=0: upstream healthy
    let first = aggregator
        .resolve("sui-tvl", upstream(200, json!({"tvl": 100}), calls.clone()), &policy, &retry())
        .await;
    assert_eq!(first.origin, Origin::Fresh);
    assert_eq!(first.value, Some(json!({"tvl": 100})));
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // t=60: inside TTL, upstream never consulted
    tokio::time::advance(Duration::from_secs(60)).await;
    let second = aggregator
        .resolve("sui-tvl", upstream(503, json!(null), calls.clone()), &policy, &retry())
        .await;
    assert_eq!(second.origin, Origin::Fresh);
    assert_eq!(second.value, Some(json!({"tvl": 100})));
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // t=130: expired, upstream down
    tokio::time::advance(Duration::from_secs(70)).await;
    let third = aggregator
        .resolve("sui-tvl", upstream(503, json!(null), calls.clone()), &policy, &retry())
        .await;
    assert_eq!(third.origin, Origin::Stale);
    assert_eq!(third.error, Some(ErrorKind::RetryableStatus));
    assert_eq!(third.value, Some(json!({"tvl": 100})));
    assert!(third.age.unwrap() >= Duration::from_secs(130));
    assert_eq!(calls.load(Ordering::SeqCst), 1 + 3);
}

#[tokio::test(start_paused = true)]
async fn test_never_fetched_404_is_single_attempt_miss() {
    let aggregator = Aggregator::<Value>::new(TtlCache::new());
    let calls = Arc::new(AtomicU32::new(0));

    let result = aggregator
        .resolve(
            "https://api.llama.fi/tvl/unknown",
            upstream(404, json!({"message": "not found"}), calls.clone()),
            &CachePolicy::default(),
            &retry(),
        )
        .await;

    assert_eq!(result.origin, Origin::Miss);
    assert_eq!(result.error, Some(ErrorKind::NonRetryableStatus));
    assert!(result.value.is_none());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(aggregator.cache().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_resolves_of_uncached_key_are_consistent() {
    let aggregator = Aggregator::<Value>::new(TtlCache::new());
    let calls = Arc::new(AtomicU32::new(0));
    let slow = |calls: Arc<AtomicU32>| {
        move || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                tokio::time::sleep(Duration::from_millis(200)).await;
                Ok::<_, FetchError>(UpstreamResponse::json(&json!({"tvl": 42})))
            }
        }
    };
    let policy = CachePolicy::default();
    let retry = retry();

    let (a, b) = tokio::join!(
        aggregator.resolve("sui-tvl", slow(calls.clone()), &policy, &retry),
        aggregator.resolve("sui-tvl", slow(calls.clone()), &policy, &retry),
    );

    assert_eq!(a.origin, Origin::Fresh);
    assert_eq!(b.origin, Origin::Fresh);
    assert_eq!(a.value, Some(json!({"tvl": 42})));
    assert_eq!(a.value, b.value);
    // Not linearizable: at most one redundant fetch
    assert!(calls.load(Ordering::SeqCst) <= 2);
    assert_eq!(aggregator.cache().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_hanging_upstream_falls_back_to_stale_with_timeout() {
    let aggregator = Aggregator::<Value>::new(TtlCache::new());
    let policy = CachePolicy::new(Duration::from_secs(10));
    let calls = Arc::new(AtomicU32::new(0));

    aggregator
        .resolve("validators", upstream(200, json!(["v1", "v2"]), calls.clone()), &policy, &retry())
        .await;
    tokio::time::advance(Duration::from_secs(11)).await;

    let hanging = || async {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok::<_, FetchError>(UpstreamResponse::json(&json!([])))
    };
    let start = tokio::time::Instant::now();
    let result = aggregator.resolve("validators", hanging, &policy, &retry()).await;

    assert_eq!(result.origin, Origin::Stale);
    assert_eq!(result.error, Some(ErrorKind::Timeout));
    assert_eq!(result.value, Some(json!(["v1", "v2"])));
    assert!(start.elapsed() <= retry().worst_case_latency() + Duration::from_millis(100));
}

#[tokio::test(start_paused = true)]
async fn test_required_miss_sinks_combined_result() {
    let aggregator = Aggregator::<Value>::new(TtlCache::new());
    let calls = Arc::new(AtomicU32::new(0));
    let respond = |status: u16, body: Value, calls: Arc<AtomicU32>| -> sui_pulse::BoxedFetch {
        let mut inner = upstream(status, body, calls);
        Box::new(move || inner().boxed())
    };

    let combined = aggregator
        .resolve_all(vec![
            SubRequest {
                key: "protocol/cetus".to_string(),
                requirement: Requirement::Required,
                cache_policy: CachePolicy::default(),
                retry: retry(),
                fetch: respond(404, json!({}), calls.clone()),
            },
            SubRequest {
                key: "tvl/cetus".to_string(),
                requirement: Requirement::Optional,
                cache_policy: CachePolicy::default(),
                retry: retry(),
                fetch: respond(200, json!(123.4), calls.clone()),
            },
        ])
        .await;

    assert_eq!(combined.origin, Origin::Miss);
    assert_eq!(combined.error, Some(ErrorKind::NonRetryableStatus));
    // The optional part still resolved and was cached for the next request
    assert_eq!(combined.value("tvl/cetus"), Some(&json!(123.4)));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}
