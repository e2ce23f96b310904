//! Constants Module - Single Source of Truth
//!
//! Upstream base URLs, retry defaults, and per-key-class TTLs live here.
//! No hardcoded values in other modules.

use std::time::Duration;

// ============================================
// APPLICATION CONSTANTS
// ============================================

/// Application name
pub const APP_NAME: &str = "SuiPulse";

/// Application version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// User-Agent for upstream requests
pub const USER_AGENT: &str = concat!("SuiPulse/", env!("CARGO_PKG_VERSION"));

// ============================================
// UPSTREAM ENDPOINTS
// ============================================

/// DeFiLlama public API
pub const DEFILLAMA_BASE_URL: &str = "https://api.llama.fi";

/// DeFiLlama price API (coins.llama.fi)
pub const DEFILLAMA_COINS_URL: &str = "https://coins.llama.fi";

/// InsidEx market data API
pub const INSIDEX_BASE_URL: &str = "https://api-ex.insidex.trade";

/// Sui mainnet fullnode (JSON-RPC)
pub const SUI_RPC_DEFAULT_URL: &str = "https://fullnode.mainnet.sui.io:443";

/// IP geolocation API
pub const GEO_BASE_URL: &str = "http://ip-api.com/json";

// ============================================
// RETRY DEFAULTS
// ============================================

/// Retries after the first attempt (3 attempts total)
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// Per-attempt timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// First backoff delay, doubled on every retry
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(500);

/// Statuses treated as transient by default (rate limit + gateway class)
pub const DEFAULT_RETRYABLE_STATUSES: [u16; 4] = [429, 502, 503, 504];

/// TCP connect timeout for the shared HTTP client
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

// ============================================
// CACHE DEFAULTS (per key class)
// ============================================

/// Maximum cached keys before LRU eviction kicks in
pub const DEFAULT_CACHE_CAPACITY: usize = 10_000;

/// How often the API purges entries past their stale window
pub const CACHE_PURGE_INTERVAL: Duration = Duration::from_secs(60);

/// `max-age` sent with stale responses
pub const STALE_MAX_AGE_SECS: u64 = 15;

pub const PRICE_TTL: Duration = Duration::from_secs(60);
pub const PRICE_STALE_WINDOW: Duration = Duration::from_secs(10 * 60);

pub const TVL_TTL: Duration = Duration::from_secs(120);
pub const TVL_STALE_WINDOW: Duration = Duration::from_secs(30 * 60);

pub const CHART_TTL: Duration = Duration::from_secs(60 * 60);
pub const CHART_STALE_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);

pub const COIN_MARKET_TTL: Duration = Duration::from_secs(60);
pub const COIN_MARKET_STALE_WINDOW: Duration = Duration::from_secs(15 * 60);

pub const VALIDATORS_TTL: Duration = Duration::from_secs(5 * 60);
pub const VALIDATORS_STALE_WINDOW: Duration = Duration::from_secs(60 * 60);

pub const GEO_TTL: Duration = Duration::from_secs(24 * 60 * 60);
pub const GEO_STALE_WINDOW: Duration = Duration::from_secs(7 * 24 * 60 * 60);

// ============================================
// SERVER DEFAULTS
// ============================================

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;

/// Max in-flight API requests
pub const MAX_CONCURRENT_REQUESTS: usize = 256;

/// Directory for telemetry exports on shutdown
pub const TELEMETRY_DIR: &str = "./telemetry";
