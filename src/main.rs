//! Sui Pulse - one-shot upstream probe
//!
//! Resolves the dashboard's core feeds once through the resilient data layer
//! and prints where each value came from, then resolves them again to show
//! the cache answering without a network call.
//!
//! Usage:
//!   cargo run --bin sui_pulse -- [protocol-slug ...]
//!
//! Environment:
//!   SUI_RPC_URL - Sui fullnode JSON-RPC endpoint
//!   RUST_LOG    - Log filter (default: info)

use eyre::Result;
use serde_json::Value;
use std::time::Instant;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use sui_pulse::providers::{defillama::SUI_CHAIN, sui_rpc, DefiLlama, SuiRpc};
use sui_pulse::utils::constants::{APP_NAME, APP_VERSION};
use sui_pulse::{AggregateResult, Aggregator, HttpUpstream, Origin, ServerConfig, TtlCache, UpstreamRequest};

const DEFAULT_PROTOCOLS: [&str; 2] = ["cetus", "navi-lending"];

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();

    println!("\n    {} probe v{}\n", APP_NAME, APP_VERSION);

    let config = ServerConfig::from_env()?;
    let http = HttpUpstream::new()?;
    let aggregator = Aggregator::<Value>::new(TtlCache::with_capacity(config.cache_capacity));

    let llama = DefiLlama::default();
    let args: Vec<String> = std::env::args().skip(1).collect();
    let slugs: Vec<&str> = if args.is_empty() {
        DEFAULT_PROTOCOLS.to_vec()
    } else {
        args.iter().map(String::as_str).collect()
    };

    let mut requests: Vec<UpstreamRequest> = vec![llama.chain_tvl_history(SUI_CHAIN)];
    requests.extend(slugs.iter().map(|slug| llama.protocol_tvl(slug)));

    let rpc = SuiRpc::new(&config.sui_rpc_url);
    let system_state = rpc.latest_system_state();

    for round in 1..=2 {
        info!("🔄 Round {}", round);

        for request in &requests {
            let start = Instant::now();
            let result = http.resolve(&aggregator, request).await;
            report(&request.key, &result, start);
        }

        let start = Instant::now();
        let policy = system_state.class.cache_policy();
        let retry = system_state.class.retry_config();
        let result = aggregator
            .resolve(&system_state.key, || sui_rpc::send(&http, &system_state), &policy, &retry)
            .await;
        report(&system_state.key, &result, start);
    }

    let stats = aggregator.cache().stats();
    info!(
        "📊 Cache: {} entries, {} hits / {} misses ({:.1}% hit rate)",
        stats.entries, stats.hits, stats.misses, stats.hit_rate
    );

    let telemetry = aggregator.telemetry().get_stats();
    for (upstream, counters) in &telemetry.upstreams {
        info!(
            "   {}: {} fetches, {} retries, {} timeouts, {:.0}ms avg",
            upstream, counters.fetches, counters.retries, counters.timeouts, counters.avg_fetch_latency_ms
        );
    }

    Ok(())
}

fn report(key: &str, result: &AggregateResult<Value>, start: Instant) {
    let latency_ms = start.elapsed().as_millis();
    match result.origin {
        Origin::Fresh => info!("✅ {} fresh in {}ms: {}", key, latency_ms, preview(result.value.as_ref())),
        Origin::Stale => warn!(
            "🕰️ {} stale in {}ms ({})",
            key,
            latency_ms,
            result.detail.as_deref().unwrap_or("unknown failure")
        ),
        Origin::Miss => warn!(
            "❌ {} unavailable after {}ms ({})",
            key,
            latency_ms,
            result.detail.as_deref().unwrap_or("unknown failure")
        ),
    }
}

/// Short one-line rendering of a payload
fn preview(value: Option<&Value>) -> String {
    let rendered = match value {
        Some(Value::Array(items)) => format!("[{} items]", items.len()),
        Some(Value::Object(map)) => format!("{{{} fields}}", map.len()),
        Some(other) => other.to_string(),
        None => "-".to_string(),
    };
    rendered.chars().take(80).collect()
}
