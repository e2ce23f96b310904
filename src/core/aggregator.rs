//! Aggregator - the single entry point of the data layer
//!
//! Flow per logical key:
//! 1. Fresh cache entry → served, no network call
//! 2. Otherwise Fetch-With-Retry through the caller's fetch function
//! 3. Success → written through to the cache, served as `Fresh`
//! 4. Failure → last known value served as `Stale` (within its stale window)
//! 5. Nothing cached → `Miss` carrying the failure kind
//!
//! Requests spanning several upstreams resolve every part concurrently and
//! merge them with [`CombinedResult::combine`].

use futures_util::future::{join_all, BoxFuture};
use serde::de::DeserializeOwned;
use std::future::Future;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::retry::fetch_with_retry_traced;
use crate::models::config::{CachePolicy, RetryConfig};
use crate::models::errors::FetchResult;
use crate::models::types::{AggregateResult, CombinedResult, Origin, Requirement, ResolvedPart, UpstreamResponse};
use crate::utils::cache::TtlCache;
use crate::utils::telemetry::UpstreamTelemetry;

/// Type-erased fetch function, used when parts of one request hit different upstreams
pub type BoxedFetch = Box<dyn FnMut() -> BoxFuture<'static, FetchResult<UpstreamResponse>> + Send>;

/// One part of a multi-upstream request
pub struct SubRequest {
    pub key: String,
    pub requirement: Requirement,
    pub cache_policy: CachePolicy,
    pub retry: RetryConfig,
    pub fetch: BoxedFetch,
}

/// Owns the response cache and resolves logical keys against it
pub struct Aggregator<V> {
    cache: TtlCache<V>,
    telemetry: Arc<UpstreamTelemetry>,
}

impl<V> Aggregator<V>
where
    V: DeserializeOwned + Clone + Send + Sync + 'static,
{
    pub fn new(cache: TtlCache<V>) -> Self {
        Self::with_telemetry(cache, Arc::new(UpstreamTelemetry::new()))
    }

    pub fn with_telemetry(cache: TtlCache<V>, telemetry: Arc<UpstreamTelemetry>) -> Self {
        Self { cache, telemetry }
    }

    pub fn cache(&self) -> &TtlCache<V> {
        &self.cache
    }

    pub fn telemetry(&self) -> &Arc<UpstreamTelemetry> {
        &self.telemetry
    }

    /// Resolve `key`, fetching through `fetch_fn` only when no fresh entry exists.
    ///
    /// Never fails: failures come back as `Stale` (with a value) or `Miss`.
    pub async fn resolve<F, Fut>(
        &self,
        key: &str,
        fetch_fn: F,
        cache_policy: &CachePolicy,
        retry: &RetryConfig,
    ) -> AggregateResult<V>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = FetchResult<UpstreamResponse>>,
    {
        let now = Instant::now();
        if let Some(entry) = self.cache.get_if_fresh(key, now) {
            self.telemetry.record_cache_hit(key);
            let age = entry.age(now);
            return AggregateResult::fresh(entry.value, age);
        }

        let started = Instant::now();
        let (outcome, attempts) = fetch_with_retry_traced(fetch_fn, retry).await;
        let decoded = outcome.and_then(|response| response.decode::<V>());

        let result = match decoded {
            Ok(value) => {
                self.cache.put_with_policy(key, value.clone(), cache_policy, Instant::now());
                AggregateResult::fresh(value, std::time::Duration::ZERO)
            }
            Err(err) => {
                let now = Instant::now();
                match self.cache.get_stale(key, now) {
                    // Another caller refreshed the key while we were failing
                    Some(entry) if entry.is_fresh(now) => {
                        debug!("🔁 {} refreshed concurrently, serving fresh copy", key);
                        let age = entry.age(now);
                        AggregateResult::fresh(entry.value, age)
                    }
                    Some(entry) if entry.is_servable_stale(now) => {
                        let age = entry.age(now);
                        warn!(
                            "🕰️ STALE: serving {} ({}s old) after {}",
                            key,
                            age.as_secs(),
                            err
                        );
                        AggregateResult::stale(entry.value, age, &err)
                    }
                    _ => {
                        warn!("❌ MISS: {} has no usable fallback: {}", key, err);
                        AggregateResult::miss(&err)
                    }
                }
            }
        };

        self.telemetry
            .record_fetch(key, &attempts, result.origin, started.elapsed());
        result
    }

    /// Resolve every part concurrently and merge them.
    ///
    /// Parts must target distinct keys; each goes through the full
    /// fresh/fetch/stale/miss flow of [`Aggregator::resolve`] independently.
    pub async fn resolve_all(&self, requests: Vec<SubRequest>) -> CombinedResult<V> {
        let parts = join_all(requests.into_iter().map(|request| async move {
            let SubRequest {
                key,
                requirement,
                cache_policy,
                retry,
                fetch,
            } = request;
            let result = self.resolve(&key, fetch, &cache_policy, &retry).await;
            ResolvedPart {
                key,
                requirement,
                ttl: cache_policy.ttl,
                result,
            }
        }))
        .await;

        let combined = CombinedResult::combine(parts);
        if combined.origin != Origin::Fresh || combined.partial {
            debug!(
                "🧩 Combined {} parts: {} (partial: {})",
                combined.parts.len(),
                combined.origin.as_str(),
                combined.partial
            );
        }
        combined
    }
}
