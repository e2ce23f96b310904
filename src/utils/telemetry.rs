//! Telemetry Module for Sui Pulse
//!
//! Per-upstream counters that show how the resilience layer behaves:
//! - how often the cache answers without a network call
//! - attempts, retries, and timeouts per upstream host
//! - fresh / stale / miss outcomes
//!
//! Counters are lock-free atomics inside a DashMap keyed by upstream host.

use chrono::Utc;
use dashmap::DashMap;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::models::errors::ErrorKind;
use crate::models::types::{Origin, RetryAttempt};

/// Label used when a key is not a URL
const CUSTOM_UPSTREAM: &str = "custom";

#[derive(Default)]
struct UpstreamCounters {
    cache_hits: AtomicU64,
    fetches: AtomicU64,
    attempts: AtomicU64,
    retries: AtomicU64,
    timeouts: AtomicU64,
    fresh: AtomicU64,
    stale: AtomicU64,
    miss: AtomicU64,
    total_fetch_latency_ms: AtomicU64,
}

/// Snapshot for one upstream
#[derive(Debug, Clone, Default, Serialize)]
pub struct UpstreamStats {
    /// Resolves answered from a fresh cache entry
    pub cache_hits: u64,
    /// Resolves that went to the network
    pub fetches: u64,
    pub attempts: u64,
    pub retries: u64,
    pub timeouts: u64,
    pub fresh: u64,
    pub stale: u64,
    pub miss: u64,
    pub avg_fetch_latency_ms: f64,
}

/// Aggregated statistics for reporting
#[derive(Debug, Clone, Default, Serialize)]
pub struct TelemetryStats {
    /// Period start (unix seconds)
    pub period_start: i64,
    /// Period end (unix seconds)
    pub period_end: i64,
    pub upstreams: BTreeMap<String, UpstreamStats>,
}

impl TelemetryStats {
    pub fn total_fetches(&self) -> u64 {
        self.upstreams.values().map(|u| u.fetches).sum()
    }

    pub fn total_stale(&self) -> u64 {
        self.upstreams.values().map(|u| u.stale).sum()
    }

    pub fn total_miss(&self) -> u64 {
        self.upstreams.values().map(|u| u.miss).sum()
    }
}

/// Main telemetry collector
pub struct UpstreamTelemetry {
    upstreams: DashMap<String, UpstreamCounters>,
    session_start: i64,
}

impl Default for UpstreamTelemetry {
    fn default() -> Self {
        Self::new()
    }
}

impl UpstreamTelemetry {
    pub fn new() -> Self {
        Self {
            upstreams: DashMap::new(),
            session_start: Utc::now().timestamp(),
        }
    }

    /// Resolve answered from a fresh cache entry
    pub fn record_cache_hit(&self, key: &str) {
        let counters = self.upstreams.entry(upstream_label(key)).or_default();
        counters.cache_hits.fetch_add(1, Ordering::Relaxed);
        counters.fresh.fetch_add(1, Ordering::Relaxed);
    }

    /// Resolve that went to the network
    pub fn record_fetch(&self, key: &str, attempts: &[RetryAttempt], origin: Origin, latency: Duration) {
        let counters = self.upstreams.entry(upstream_label(key)).or_default();

        let made = attempts.len() as u64;
        let timeouts = attempts
            .iter()
            .filter(|a| a.failure_kind == Some(ErrorKind::Timeout))
            .count() as u64;

        counters.fetches.fetch_add(1, Ordering::Relaxed);
        counters.attempts.fetch_add(made, Ordering::Relaxed);
        counters.retries.fetch_add(made.saturating_sub(1), Ordering::Relaxed);
        counters.timeouts.fetch_add(timeouts, Ordering::Relaxed);
        counters
            .total_fetch_latency_ms
            .fetch_add(latency.as_millis() as u64, Ordering::Relaxed);

        let outcome = match origin {
            Origin::Fresh => &counters.fresh,
            Origin::Stale => &counters.stale,
            Origin::Miss => &counters.miss,
        };
        outcome.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_stats(&self) -> TelemetryStats {
        let upstreams = self
            .upstreams
            .iter()
            .map(|entry| {
                let c = entry.value();
                let fetches = c.fetches.load(Ordering::Relaxed);
                let latency = c.total_fetch_latency_ms.load(Ordering::Relaxed);
                let stats = UpstreamStats {
                    cache_hits: c.cache_hits.load(Ordering::Relaxed),
                    fetches,
                    attempts: c.attempts.load(Ordering::Relaxed),
                    retries: c.retries.load(Ordering::Relaxed),
                    timeouts: c.timeouts.load(Ordering::Relaxed),
                    fresh: c.fresh.load(Ordering::Relaxed),
                    stale: c.stale.load(Ordering::Relaxed),
                    miss: c.miss.load(Ordering::Relaxed),
                    avg_fetch_latency_ms: if fetches > 0 {
                        latency as f64 / fetches as f64
                    } else {
                        0.0
                    },
                };
                (entry.key().clone(), stats)
            })
            .collect();

        TelemetryStats {
            period_start: self.session_start,
            period_end: Utc::now().timestamp(),
            upstreams,
        }
    }

    /// Write the current snapshot as pretty JSON into `dir`
    pub fn export_stats_json(&self, dir: &Path) -> std::io::Result<PathBuf> {
        fs::create_dir_all(dir)?;
        let stats = self.get_stats();
        let path = dir.join(format!(
            "upstream_stats_{}.json",
            Utc::now().format("%Y%m%d_%H%M%S")
        ));
        let json = serde_json::to_string_pretty(&stats).map_err(std::io::Error::other)?;
        fs::write(&path, json)?;
        Ok(path)
    }
}

/// Upstream host of a cache key, or `"custom"` for logical keys
pub fn upstream_label(key: &str) -> String {
    reqwest::Url::parse(key)
        .ok()
        .and_then(|url| url.host_str().map(str::to_string))
        .unwrap_or_else(|| CUSTOM_UPSTREAM.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attempt(n: u32, kind: Option<ErrorKind>) -> RetryAttempt {
        RetryAttempt {
            attempt_number: n,
            failure_kind: kind,
            status: None,
            delay_before_next: None,
        }
    }

    #[test]
    fn test_upstream_label() {
        assert_eq!(upstream_label("https://api.llama.fi/tvl/cetus"), "api.llama.fi");
        assert_eq!(upstream_label("sui-tvl"), "custom");
    }

    #[test]
    fn test_record_fetch_counts_retries_and_timeouts() {
        let telemetry = UpstreamTelemetry::new();
        let attempts = vec![
            attempt(0, Some(ErrorKind::Timeout)),
            attempt(1, Some(ErrorKind::RetryableStatus)),
            attempt(2, None),
        ];

        telemetry.record_fetch("https://api.llama.fi/tvl/x", &attempts, Origin::Fresh, Duration::from_millis(30));
        telemetry.record_cache_hit("https://api.llama.fi/tvl/x");

        let stats = telemetry.get_stats();
        let llama = &stats.upstreams["api.llama.fi"];
        assert_eq!(llama.fetches, 1);
        assert_eq!(llama.attempts, 3);
        assert_eq!(llama.retries, 2);
        assert_eq!(llama.timeouts, 1);
        assert_eq!(llama.fresh, 2);
        assert_eq!(llama.cache_hits, 1);
        assert_eq!(llama.avg_fetch_latency_ms, 30.0);
    }

    #[test]
    fn test_totals() {
        let telemetry = UpstreamTelemetry::new();
        telemetry.record_fetch("sui-tvl", &[attempt(0, None)], Origin::Stale, Duration::ZERO);
        telemetry.record_fetch("geo", &[attempt(0, None)], Origin::Miss, Duration::ZERO);

        let stats = telemetry.get_stats();
        assert_eq!(stats.total_fetches(), 2);
        assert_eq!(stats.total_stale(), 1);
        assert_eq!(stats.total_miss(), 1);
    }
}
