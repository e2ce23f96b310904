//! API Request/Response Types

use serde::Serialize;
use serde_json::Value;

use crate::models::errors::ErrorKind;
use crate::models::types::{AggregateResult, Origin};
use crate::utils::cache::CacheStats;
use crate::utils::telemetry::TelemetryStats;

/// API Response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
    pub latency_ms: f64,
    pub timestamp: i64,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T, latency_ms: f64) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            latency_ms,
            timestamp: chrono::Utc::now().timestamp(),
        }
    }
}

impl ApiResponse<()> {
    pub fn error(error: ApiError, latency_ms: f64) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error),
            latency_ms,
            timestamp: chrono::Utc::now().timestamp(),
        }
    }
}

/// API Error
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            code: "BAD_REQUEST".to_string(),
            message: message.into(),
            details: None,
        }
    }

    /// Upstream data unavailable and nothing cached
    pub fn unavailable(kind: ErrorKind, key: &str, detail: Option<String>) -> Self {
        Self {
            code: kind.as_str().to_string(),
            message: format!("No data available for {}", key),
            details: detail,
        }
    }
}

// ============================================
// Feeds
// ============================================

/// One served value with its provenance
#[derive(Debug, Serialize)]
pub struct FeedData {
    pub key: String,
    pub origin: Origin,
    pub stale: bool,
    pub age_secs: u64,
    /// Set on combined feeds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partial: Option<bool>,
    /// Failure that forced a stale fallback
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<String>,
    pub value: Value,
}

impl FeedData {
    /// `None` for a miss
    pub fn from_result(key: &str, result: AggregateResult<Value>) -> Option<Self> {
        let value = result.value?;
        Some(Self {
            key: key.to_string(),
            origin: result.origin,
            stale: result.origin == Origin::Stale,
            age_secs: result.age.map(|a| a.as_secs()).unwrap_or(0),
            partial: None,
            fallback_reason: result.error.map(|k| k.as_str().to_string()),
            value,
        })
    }
}

// ============================================
// Health & Stats
// ============================================

#[derive(Debug, Serialize)]
pub struct HealthData {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
}

#[derive(Debug, Serialize)]
pub struct StatsData {
    pub uptime_seconds: u64,
    pub api_version: String,
    pub cache: CacheStats,
    pub upstreams: TelemetryStats,
}
