//! API Request Handlers
//!
//! Every feed goes through the shared [`Aggregator`]; handlers only build the
//! upstream request and map the outcome onto HTTP:
//! - `Fresh` → 200, `Cache-Control: public, max-age=<remaining ttl>`
//! - `Stale` → 200, short `max-age`, `X-Data-Stale: true`
//! - `Miss`  → 5xx from the failure kind, `Cache-Control: no-store`

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use super::types::*;
use crate::core::aggregator::Aggregator;
use crate::models::config::{KeyClass, ServerConfig};
use crate::models::errors::ErrorKind;
use crate::models::types::{AggregateResult, Origin, Requirement};
use crate::providers::defillama::SUI_CHAIN;
use crate::providers::{path_segment, sui_rpc, DefiLlama, GeoLocator, HttpUpstream, InsidEx, SuiRpc};
use crate::utils::cache::TtlCache;
use crate::utils::constants::{CACHE_PURGE_INTERVAL, STALE_MAX_AGE_SECS};

/// Max coin ids per price request
const MAX_PRICE_IDS: usize = 50;

/// Request builders for every upstream
#[derive(Debug, Clone)]
pub struct Upstreams {
    pub defillama: DefiLlama,
    pub insidex: InsidEx,
    pub sui_rpc: SuiRpc,
    pub geo: GeoLocator,
}

impl Upstreams {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            defillama: DefiLlama::default(),
            insidex: InsidEx::from_key(config.insidex_api_key.clone()),
            sui_rpc: SuiRpc::new(&config.sui_rpc_url),
            geo: GeoLocator::default(),
        }
    }
}

/// Shared application state
pub struct AppState {
    pub aggregator: Aggregator<Value>,
    pub http: HttpUpstream,
    pub upstreams: Upstreams,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(aggregator: Aggregator<Value>, http: HttpUpstream, upstreams: Upstreams) -> Self {
        // Background task: drop entries whose stale window is over
        let cache: TtlCache<Value> = aggregator.cache().clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(CACHE_PURGE_INTERVAL);
            loop {
                interval.tick().await;
                cache.purge_unservable(tokio::time::Instant::now());
            }
        });

        Self {
            aggregator,
            http,
            upstreams,
            start_time: Instant::now(),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

// ============================================
// Health Check
// ============================================

pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<ApiResponse<HealthData>> {
    let start = Instant::now();

    let data = HealthData {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.uptime_seconds(),
    };

    Json(ApiResponse::success(data, elapsed_ms(start)))
}

// ============================================
// DeFiLlama
// ============================================

pub async fn get_protocol_tvl(State(state): State<Arc<AppState>>, Path(slug): Path<String>) -> Response {
    let start = Instant::now();
    let Some(slug) = path_segment(&slug) else {
        return bad_request("Invalid protocol slug", start);
    };

    let request = state.upstreams.defillama.protocol_tvl(slug);
    let result = state.http.resolve(&state.aggregator, &request).await;
    feed_response(&request.key, request.class, result, start)
}

/// Protocol history (required) plus current TVL snapshot (optional)
pub async fn get_protocol(State(state): State<Arc<AppState>>, Path(slug): Path<String>) -> Response {
    let start = Instant::now();
    let Some(slug) = path_segment(&slug) else {
        return bad_request("Invalid protocol slug", start);
    };

    let history = state.upstreams.defillama.protocol(slug);
    let current = state.upstreams.defillama.protocol_tvl(slug);
    let combined = state
        .aggregator
        .resolve_all(vec![
            state.http.sub_request(&history, Requirement::Required),
            state.http.sub_request(&current, Requirement::Optional),
        ])
        .await;

    if combined.is_miss() {
        let detail = combined.parts.iter().find_map(|p| p.result.detail.clone());
        return miss_response(&history.key, combined.error, detail, start);
    }

    let age = combined.max_age();
    let data = FeedData {
        key: history.key.clone(),
        origin: combined.origin,
        stale: combined.origin == Origin::Stale,
        age_secs: age.as_secs(),
        partial: Some(combined.partial),
        fallback_reason: match combined.origin {
            Origin::Stale => combined.error.map(|k| k.as_str().to_string()),
            _ => None,
        },
        value: json!({
            "protocol": combined.value(&history.key),
            "current_tvl": combined.value(&current.key),
        }),
    };

    (
        StatusCode::OK,
        cache_headers(combined.origin, combined.fresh_for(), age),
        Json(ApiResponse::success(data, elapsed_ms(start))),
    )
        .into_response()
}

pub async fn get_sui_tvl(State(state): State<Arc<AppState>>) -> Response {
    let start = Instant::now();
    let request = state.upstreams.defillama.chain_tvl_history(SUI_CHAIN);
    let result = state.http.resolve(&state.aggregator, &request).await;
    feed_response(&request.key, request.class, result, start)
}

/// Comma-separated `chain:address` ids, e.g. `sui:0x2::sui::SUI,coingecko:sui`
pub async fn get_prices(State(state): State<Arc<AppState>>, Path(coins): Path<String>) -> Response {
    let start = Instant::now();
    let ids: Option<Vec<&str>> = coins.split(',').map(path_segment).collect();
    let ids = match ids {
        Some(ids) if !ids.is_empty() && ids.len() <= MAX_PRICE_IDS => ids,
        _ => return bad_request(format!("Expected 1-{} valid coin ids", MAX_PRICE_IDS), start),
    };

    let request = state.upstreams.defillama.current_prices(&ids);
    let result = state.http.resolve(&state.aggregator, &request).await;
    feed_response(&request.key, request.class, result, start)
}

// ============================================
// InsidEx / Sui RPC / Geo
// ============================================

pub async fn get_coin_market(State(state): State<Arc<AppState>>, Path(coin_type): Path<String>) -> Response {
    let start = Instant::now();
    let Some(coin_type) = path_segment(&coin_type) else {
        return bad_request("Invalid coin type", start);
    };

    let request = state.upstreams.insidex.coin_market(coin_type);
    let result = state.http.resolve(&state.aggregator, &request).await;
    feed_response(&request.key, request.class, result, start)
}

pub async fn get_validators(State(state): State<Arc<AppState>>) -> Response {
    let start = Instant::now();
    let request = state.upstreams.sui_rpc.latest_system_state();
    let policy = request.class.cache_policy();
    let retry = request.class.retry_config();

    let result = state
        .aggregator
        .resolve(
            &request.key,
            || sui_rpc::send(&state.http, &request),
            &policy,
            &retry,
        )
        .await;
    feed_response(&request.key, request.class, result, start)
}

pub async fn get_geo(State(state): State<Arc<AppState>>, Path(ip): Path<String>) -> Response {
    let start = Instant::now();
    let Ok(ip) = ip.trim().parse::<IpAddr>() else {
        return bad_request("Invalid IP address", start);
    };

    let request = state.upstreams.geo.lookup(ip);
    let result = state.http.resolve(&state.aggregator, &request).await;
    feed_response(&request.key, request.class, result, start)
}

// ============================================
// Statistics
// ============================================

pub async fn get_stats(State(state): State<Arc<AppState>>) -> Json<ApiResponse<StatsData>> {
    let start = Instant::now();
    let cache_stats = state.aggregator.cache().stats();

    info!(
        "📊 Cache Stats: {} entries, {:.1}% hit rate ({} hits / {} misses, {} stale)",
        cache_stats.entries, cache_stats.hit_rate, cache_stats.hits, cache_stats.misses, cache_stats.stale_hits
    );

    let data = StatsData {
        uptime_seconds: state.uptime_seconds(),
        api_version: env!("CARGO_PKG_VERSION").to_string(),
        cache: cache_stats,
        upstreams: state.aggregator.telemetry().get_stats(),
    };

    Json(ApiResponse::success(data, elapsed_ms(start)))
}

// ============================================
// Helper Functions
// ============================================

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

/// Map one resolve outcome onto an HTTP response
fn feed_response(key: &str, class: KeyClass, result: AggregateResult<Value>, start: Instant) -> Response {
    let origin = result.origin;
    let age = result.age.unwrap_or_default();
    let error = result.error;
    let detail = result.detail.clone();

    match FeedData::from_result(key, result) {
        Some(data) => (
            StatusCode::OK,
            cache_headers(origin, class.cache_policy().ttl.saturating_sub(age), age),
            Json(ApiResponse::success(data, elapsed_ms(start))),
        )
            .into_response(),
        None => miss_response(key, error, detail, start),
    }
}

/// `fresh_for` is the remaining TTL of the served value
fn cache_headers(origin: Origin, fresh_for: Duration, age: Duration) -> HeaderMap {
    let mut headers = HeaderMap::new();
    let cache_control = match origin {
        Origin::Fresh => format!("public, max-age={}", fresh_for.as_secs()),
        Origin::Stale => format!("public, max-age={}", STALE_MAX_AGE_SECS),
        Origin::Miss => "no-store".to_string(),
    };
    if let Ok(value) = HeaderValue::from_str(&cache_control) {
        headers.insert(header::CACHE_CONTROL, value);
    }
    if origin == Origin::Stale {
        headers.insert("x-data-stale", HeaderValue::from_static("true"));
    }
    if origin != Origin::Miss {
        headers.insert("x-data-age", HeaderValue::from(age.as_secs()));
    }
    headers
}

fn miss_response(key: &str, error: Option<ErrorKind>, detail: Option<String>, start: Instant) -> Response {
    let kind = error.unwrap_or(ErrorKind::CacheMiss);
    let status = StatusCode::from_u16(kind.http_status()).unwrap_or(StatusCode::BAD_GATEWAY);
    warn!("🚫 {} for {}: {}", status.as_u16(), key, kind);

    (
        status,
        cache_headers(Origin::Miss, Duration::ZERO, Duration::ZERO),
        Json(ApiResponse::error(
            ApiError::unavailable(kind, key, detail),
            elapsed_ms(start),
        )),
    )
        .into_response()
}

fn bad_request(message: impl Into<String>, start: Instant) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ApiResponse::error(ApiError::bad_request(message), elapsed_ms(start))),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_headers_use_remaining_ttl() {
        let headers = cache_headers(Origin::Fresh, Duration::from_secs(100), Duration::from_secs(20));
        assert_eq!(headers[header::CACHE_CONTROL], "public, max-age=100");
        assert!(headers.get("x-data-stale").is_none());
        assert_eq!(headers["x-data-age"], "20");
    }

    #[test]
    fn test_stale_headers() {
        let headers = cache_headers(Origin::Stale, Duration::ZERO, Duration::from_secs(130));
        assert_eq!(headers[header::CACHE_CONTROL], format!("public, max-age={}", STALE_MAX_AGE_SECS));
        assert_eq!(headers["x-data-stale"], "true");
    }

    #[test]
    fn test_miss_status_follows_error_kind() {
        let start = Instant::now();
        let timeout = miss_response("k", Some(ErrorKind::Timeout), None, start);
        let upstream = miss_response("k", Some(ErrorKind::NonRetryableStatus), None, start);
        let unknown = miss_response("k", None, None, start);

        assert_eq!(timeout.status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(upstream.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(unknown.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(timeout.headers()[header::CACHE_CONTROL], "no-store");
    }
}
