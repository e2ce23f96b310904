//! Sui Pulse Dashboard API Server
//!
//! REST API serving dashboard feeds through the resilient data layer
//!
//! Usage:
//!   cargo run --bin sui_pulse_api
//!
//! Environment:
//!   PORT / SUI_PULSE_PORT    - Server port (default: 8080)
//!   SUI_PULSE_HOST           - Server host (default: 0.0.0.0)
//!   SUI_PULSE_CACHE_CAPACITY - Max cached keys (default: 10000)
//!   SUI_RPC_URL              - Sui fullnode JSON-RPC endpoint
//!   INSIDEX_API_KEY          - InsidEx API key (optional)
//!   RUST_LOG                 - Log filter (default: info)

use serde_json::Value;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use sui_pulse::api::{create_router, AppState, Upstreams};
use sui_pulse::utils::constants::{APP_VERSION, TELEMETRY_DIR};
use sui_pulse::{Aggregator, HttpUpstream, ServerConfig, TtlCache, UpstreamTelemetry};

#[tokio::main]
async fn main() -> eyre::Result<()> {
    // Initialize logging
    FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .compact()
        .init();

    print_banner();

    let config = ServerConfig::from_env()?;

    // Initialize telemetry
    let telemetry = Arc::new(UpstreamTelemetry::new());
    let telemetry_for_shutdown = telemetry.clone();

    // Create app state (starts the cache purge task)
    let cache = TtlCache::<Value>::with_capacity(config.cache_capacity);
    let aggregator = Aggregator::with_telemetry(cache, telemetry);
    let state = Arc::new(AppState::new(
        aggregator,
        HttpUpstream::new()?,
        Upstreams::from_config(&config),
    ));
    info!("🧹 Cache purge task started");

    // Create router
    let app = create_router(state);

    let addr: SocketAddr = config.bind_addr().parse()?;

    info!("🚀 Sui Pulse API starting on http://{}", addr);
    info!("💚 Health: http://{}/v1/health", addr);
    info!("");
    info!("Endpoints:");
    info!("  GET /v1/tvl/:slug          - Protocol TVL (DeFiLlama)");
    info!("  GET /v1/protocols/:slug    - Protocol history + current TVL");
    info!("  GET /v1/chains/sui/tvl     - Sui chain TVL history");
    info!("  GET /v1/prices/:coins      - Current coin prices");
    info!("  GET /v1/coins/:coin_type   - Coin market data (InsidEx)");
    info!("  GET /v1/validators         - Sui system state (RPC)");
    info!("  GET /v1/geo/:ip            - IP geolocation");
    info!("  GET /v1/stats              - Cache and upstream statistics");
    info!("");
    info!("Press Ctrl+C for graceful shutdown");
    info!("");

    // Start server with graceful shutdown
    let listener = TcpListener::bind(addr).await?;

    // Create shutdown signal handler
    let shutdown_signal = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("⚠️ Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    // Graceful shutdown sequence
    info!("");
    info!("🛑 Shutdown signal received, cleaning up...");

    // Export final telemetry
    info!("📊 Exporting final telemetry...");
    let stats = telemetry_for_shutdown.get_stats();
    info!("   Upstream fetches: {}", stats.total_fetches());
    info!("   Stale serves: {}", stats.total_stale());
    info!("   Misses: {}", stats.total_miss());

    match telemetry_for_shutdown.export_stats_json(Path::new(TELEMETRY_DIR)) {
        Ok(path) => info!("   ✅ Stats exported to: {}", path.display()),
        Err(e) => warn!("   ⚠️ Failed to export stats: {}", e),
    }

    info!("👋 Sui Pulse API shutdown complete");

    Ok(())
}

fn print_banner() {
    println!(
        r#"
    ╔══════════════════════════════════════════════════════════════╗
    ║                                                              ║
    ║   ███████╗██╗   ██╗██╗    ██████╗ ██╗   ██╗██╗     ███████╗  ║
    ║   ██╔════╝██║   ██║██║    ██╔══██╗██║   ██║██║     ██╔════╝  ║
    ║   ███████╗██║   ██║██║    ██████╔╝██║   ██║██║     ███████╗  ║
    ║   ╚════██║██║   ██║██║    ██╔═══╝ ██║   ██║██║     ╚════██║  ║
    ║   ███████║╚██████╔╝██║    ██║     ╚██████╔╝███████╗███████║  ║
    ║   ╚══════╝ ╚═════╝ ╚═╝    ╚═╝      ╚═════╝ ╚══════╝╚══════╝  ║
    ║                                                              ║
    ║              D A S H B O A R D   A P I   v{:<15}║
    ║         Timeouts · Retries · Stale-while-failing             ║
    ║                                                              ║
    ╚══════════════════════════════════════════════════════════════╝
    "#,
        APP_VERSION
    );
}
