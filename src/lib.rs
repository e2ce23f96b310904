//! Sui Pulse Library
//!
//! Resilient external-data access layer behind the Sui dashboard:
//! - Timeout Guard bounding every upstream attempt
//! - Fetch-With-Retry with exponential backoff (optional decorrelated jitter)
//! - TTL cache with stale fallback and LRU capacity bound
//! - Aggregator serving Fresh / Stale / Miss results, single or multi-upstream
//!
//! Upstreams: DeFiLlama, InsidEx, Sui JSON-RPC, IP geolocation.

pub mod api;
pub mod core;
pub mod models;
pub mod providers;
pub mod utils;

pub use crate::core::{fetch_with_retry, fetch_with_retry_traced, guard, Aggregator, BoxedFetch, SubRequest};
pub use models::config::{CachePolicy, Jitter, KeyClass, RetryConfig, ServerConfig};
pub use models::errors::{ErrorKind, FetchError, FetchResult};
pub use models::types::{
    AggregateResult, CombinedResult, Origin, Requirement, ResolvedPart, RetryAttempt, UpstreamResponse,
};
pub use providers::{HttpUpstream, UpstreamRequest};
pub use utils::cache::{normalize_key, CacheEntry, CacheStats, TtlCache};
pub use utils::telemetry::{TelemetryStats, UpstreamTelemetry};
