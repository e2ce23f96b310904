//! HTTP upstream tests against a local mock server
//!
//! Real clock: the mock server does socket IO, which a paused clock would
//! skip past.

use serde_json::{json, Value};
use std::time::Duration;
use sui_pulse::providers::{sui_rpc, DefiLlama, InsidEx, SuiRpc};
use sui_pulse::{fetch_with_retry, Aggregator, ErrorKind, HttpUpstream, Origin, RetryConfig, TtlCache};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fast_retry() -> RetryConfig {
    RetryConfig::default()
        .with_max_retries(2)
        .with_timeout(Duration::from_secs(2))
        .with_base_delay(Duration::from_millis(10))
}

#[tokio::test]
async fn test_503_retried_until_success() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/tvl/cetus"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/tvl/cetus"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(123456.7)))
        .expect(1)
        .mount(&server)
        .await;

    let http = HttpUpstream::new().unwrap();
    let request = DefiLlama::new(&server.uri(), &server.uri()).protocol_tvl("cetus");
    let aggregator = Aggregator::<Value>::new(TtlCache::new());

    let result = aggregator
        .resolve(&request.key, || http.send(&request), &request.class.cache_policy(), &fast_retry())
        .await;

    assert_eq!(result.origin, Origin::Fresh);
    assert_eq!(result.value, Some(json!(123456.7)));
}

async fn not_found_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/tvl/unknown"))
        .respond_with(ResponseTemplate::new(404).set_body_string("Protocol not found"))
        .expect(1)
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn test_404_passed_through_without_retry() {
    let server = not_found_server().await;
    let http = HttpUpstream::new().unwrap();
    let request = DefiLlama::new(&server.uri(), &server.uri()).protocol_tvl("unknown");

    let response = fetch_with_retry(|| http.send(&request), &fast_retry()).await.unwrap();

    assert_eq!(response.status, 404);
    assert_eq!(response.body, b"Protocol not found".to_vec());
}

#[tokio::test]
async fn test_404_resolves_to_miss_after_one_request() {
    let server = not_found_server().await;
    let http = HttpUpstream::new().unwrap();
    let request = DefiLlama::new(&server.uri(), &server.uri()).protocol_tvl("unknown");
    let aggregator = Aggregator::<Value>::new(TtlCache::new());

    let result = aggregator
        .resolve(&request.key, || http.send(&request), &request.class.cache_policy(), &fast_retry())
        .await;

    assert_eq!(result.origin, Origin::Miss);
    assert_eq!(result.error, Some(ErrorKind::NonRetryableStatus));
    assert!(aggregator.cache().is_empty());
}

#[tokio::test]
async fn test_slow_upstream_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let http = HttpUpstream::new().unwrap();
    let request = DefiLlama::new(&server.uri(), &server.uri()).chain_tvl_history("Sui");
    let config = fast_retry()
        .with_max_retries(1)
        .with_timeout(Duration::from_millis(200));
    let start = std::time::Instant::now();

    let err = fetch_with_retry(|| http.send(&request), &config).await.unwrap_err();

    assert_eq!(err.kind, ErrorKind::Timeout);
    assert_eq!(err.attempts, 2);
    assert!(err.status.is_none());
    assert!(start.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn test_connection_refused_is_transport() {
    // Bind then drop to get a port nobody listens on
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    let base = format!("http://127.0.0.1:{}", port);

    let http = HttpUpstream::new().unwrap();
    let request = DefiLlama::new(&base, &base).protocol_tvl("cetus");

    let err = fetch_with_retry(|| http.send(&request), &fast_retry().with_max_retries(1))
        .await
        .unwrap_err();

    assert_eq!(err.kind, ErrorKind::Transport);
    assert_eq!(err.attempts, 2);
}

#[tokio::test]
async fn test_insidex_sends_api_key() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/coins/0x2::sui::SUI/market-data"))
        .and(header("x-api-key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"price": 3.21})))
        .expect(1)
        .mount(&server)
        .await;

    let http = HttpUpstream::new().unwrap();
    let request = InsidEx::new(&server.uri(), Some("test-key".to_string())).coin_market("0x2::sui::SUI");

    let response = fetch_with_retry(|| http.send(&request), &fast_retry()).await.unwrap();
    assert_eq!(response.status, 200);
}

#[tokio::test]
async fn test_sui_rpc_rate_limit_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"method": "suix_getLatestSuiSystemState"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0", "id": 1,
            "error": {"code": -32005, "message": "Rate limit exceeded"}
        })))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"method": "suix_getLatestSuiSystemState"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0", "id": 1,
            "result": {"epoch": "512", "activeValidators": [{"name": "v1"}]}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let http = HttpUpstream::new().unwrap();
    let request = SuiRpc::new(&server.uri()).latest_system_state();
    let aggregator = Aggregator::<Value>::new(TtlCache::new());

    let result = aggregator
        .resolve(
            &request.key,
            || sui_rpc::send(&http, &request),
            &request.class.cache_policy(),
            &fast_retry(),
        )
        .await;

    assert_eq!(result.origin, Origin::Fresh);
    assert_eq!(result.value.unwrap()["epoch"], "512");
}
