//! Configuration module for the upstream data layer
//!
//! Uses constants from utils/constants.rs. Each call site picks a
//! [`KeyClass`], which bundles the cache policy and the retry config
//! for that kind of data.

use std::collections::HashSet;
use std::time::Duration;

use eyre::{eyre, Result};
use serde::Serialize;
use tracing::info;

use crate::core::backoff;
use crate::utils::constants::*;

/// Randomization applied on top of the deterministic backoff schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Jitter {
    /// Exact `base * 2^attempt`
    #[default]
    None,
    /// Random delay between `base` and 3x the previous delay,
    /// capped at the deterministic delay for the attempt
    Decorrelated,
}

/// Retry configuration for one Fetch-With-Retry invocation
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries after the first attempt; total attempts = `max_retries + 1`
    pub max_retries: u32,
    /// Timeout applied to every attempt
    pub base_timeout: Duration,
    /// First backoff delay, doubled per attempt
    pub base_delay: Duration,
    /// Statuses classified as `RetryableStatus`
    pub retryable_status_codes: HashSet<u16>,
    /// Ceiling for a single backoff delay
    pub max_delay: Option<Duration>,
    pub jitter: Jitter,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_timeout: DEFAULT_TIMEOUT,
            base_delay: DEFAULT_BASE_DELAY,
            retryable_status_codes: DEFAULT_RETRYABLE_STATUSES.into_iter().collect(),
            max_delay: None,
            jitter: Jitter::None,
        }
    }
}

impl RetryConfig {
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.base_timeout = timeout;
        self
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn with_retryable_statuses(mut self, statuses: impl IntoIterator<Item = u16>) -> Self {
        self.retryable_status_codes = statuses.into_iter().collect();
        self
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = Some(max_delay);
        self
    }

    pub fn with_jitter(mut self, jitter: Jitter) -> Self {
        self.jitter = jitter;
        self
    }

    /// Total attempts the loop may make
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    pub fn is_retryable_status(&self, status: u16) -> bool {
        self.retryable_status_codes.contains(&status)
    }

    /// Deterministic delay awaited after a failed `attempt`, honoring `max_delay`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let delay = backoff::next_delay(attempt, self.base_delay);
        match self.max_delay {
            Some(cap) => delay.min(cap),
            None => delay,
        }
    }

    /// Upper bound on one Fetch-With-Retry invocation:
    /// every attempt hits its timeout and every backoff is awaited.
    ///
    /// `(max_retries + 1) * base_timeout + Σ delay_for(0..max_retries)`
    ///
    /// Jitter never exceeds the deterministic delay, so the bound holds
    /// in both modes. The retry loop enforces it as an outer deadline.
    pub fn worst_case_latency(&self) -> Duration {
        let mut total = self
            .base_timeout
            .saturating_mul(self.max_retries)
            .saturating_add(self.base_timeout);
        for attempt in 0..self.max_retries {
            let delay = self.delay_for(attempt);
            // Capped or saturated: every remaining delay is the same
            if delay == self.delay_for(attempt.saturating_add(1)) {
                let remaining = self.max_retries - attempt;
                return total.saturating_add(delay.saturating_mul(remaining));
            }
            total = total.saturating_add(delay);
        }
        total
    }
}

/// Freshness configuration for one key class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    /// Entry is authoritative for this long after `fetched_at`
    pub ttl: Duration,
    /// How long past `ttl` the value may still be served as a fallback;
    /// `None` keeps it usable for the process lifetime
    pub stale_window: Option<Duration>,
}

impl CachePolicy {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, stale_window: None }
    }

    pub fn with_stale_window(mut self, window: Duration) -> Self {
        self.stale_window = Some(window);
        self
    }
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self::new(TVL_TTL)
    }
}

/// Kinds of dashboard data, each with its own staleness tolerance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyClass {
    /// Current token prices
    Price,
    /// Current protocol TVL snapshot
    Tvl,
    /// Historical series (TVL charts, protocol history)
    Chart,
    /// InsidEx coin market data
    CoinMarket,
    /// Sui validator set / system state
    Validators,
    /// IP geolocation (high-cardinality keys)
    Geo,
}

impl KeyClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Price => "price",
            Self::Tvl => "tvl",
            Self::Chart => "chart",
            Self::CoinMarket => "coin_market",
            Self::Validators => "validators",
            Self::Geo => "geo",
        }
    }

    pub fn cache_policy(&self) -> CachePolicy {
        let (ttl, stale_window) = match self {
            Self::Price => (PRICE_TTL, PRICE_STALE_WINDOW),
            Self::Tvl => (TVL_TTL, TVL_STALE_WINDOW),
            Self::Chart => (CHART_TTL, CHART_STALE_WINDOW),
            Self::CoinMarket => (COIN_MARKET_TTL, COIN_MARKET_STALE_WINDOW),
            Self::Validators => (VALIDATORS_TTL, VALIDATORS_STALE_WINDOW),
            Self::Geo => (GEO_TTL, GEO_STALE_WINDOW),
        };
        CachePolicy::new(ttl).with_stale_window(stale_window)
    }

    pub fn retry_config(&self) -> RetryConfig {
        match self {
            // Charts are large payloads
            Self::Chart => RetryConfig::default().with_timeout(Duration::from_secs(20)),
            // Sui RPC is fast; a slow fullnode is better retried early
            Self::Validators => RetryConfig::default().with_timeout(Duration::from_secs(10)),
            // Geolocation free tier rate-limits hard; do not hammer it
            Self::Geo => RetryConfig::default()
                .with_max_retries(1)
                .with_timeout(Duration::from_secs(5)),
            Self::Price | Self::Tvl | Self::CoinMarket => RetryConfig::default(),
        }
    }
}

/// Server configuration loaded from the environment
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Max cached keys (LRU eviction beyond)
    pub cache_capacity: usize,
    pub sui_rpc_url: String,
    pub insidex_api_key: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            sui_rpc_url: SUI_RPC_DEFAULT_URL.to_string(),
            insidex_api_key: None,
        }
    }
}

impl ServerConfig {
    /// Read configuration from the environment.
    ///
    /// `PORT` wins over `SUI_PULSE_PORT` (hosting platforms inject `PORT`).
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let host = std::env::var("SUI_PULSE_HOST").unwrap_or(defaults.host);

        let port = match std::env::var("PORT").or_else(|_| std::env::var("SUI_PULSE_PORT")) {
            Ok(raw) => raw
                .parse()
                .map_err(|e| eyre!("Invalid port {:?}: {}", raw, e))?,
            Err(_) => defaults.port,
        };

        let cache_capacity = match std::env::var("SUI_PULSE_CACHE_CAPACITY") {
            Ok(raw) => raw
                .parse()
                .ok()
                .filter(|n: &usize| *n > 0)
                .ok_or_else(|| eyre!("Invalid SUI_PULSE_CACHE_CAPACITY {:?}", raw))?,
            Err(_) => defaults.cache_capacity,
        };

        let sui_rpc_url = std::env::var("SUI_RPC_URL")
            .ok()
            .filter(|u| !u.is_empty())
            .unwrap_or(defaults.sui_rpc_url);

        let insidex_api_key = std::env::var("INSIDEX_API_KEY")
            .ok()
            .filter(|k| !k.is_empty());
        if insidex_api_key.is_some() {
            info!("🔑 INSIDEX_API_KEY configured (key hidden)");
        }

        Ok(Self {
            host,
            port,
            cache_capacity,
            sui_rpc_url,
            insidex_api_key,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
