//! Sui JSON-RPC requests
//!
//! JSON-RPC answers errors with HTTP 200 and an `error` member, so the raw
//! response is unwrapped before it reaches the retry loop: `result` becomes
//! the body, rate-limit errors become a 429 (retried like any other), and
//! all other RPC errors become a final 400.

use futures_util::future::{BoxFuture, FutureExt};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use super::{HttpUpstream, UpstreamRequest};
use crate::core::aggregator::BoxedFetch;
use crate::models::config::KeyClass;
use crate::models::errors::{FetchError, FetchResult};
use crate::models::types::UpstreamResponse;

pub const GET_LATEST_SYSTEM_STATE: &str = "suix_getLatestSuiSystemState";

/// JSON-RPC response envelope
#[derive(Debug, Deserialize)]
struct RpcEnvelope {
    result: Option<Value>,
    error: Option<RpcError>,
}

/// JSON-RPC error structure
#[derive(Debug, Clone, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

impl RpcError {
    /// Check if this is a rate limit error (code -32005 or message text)
    pub fn is_rate_limit(&self) -> bool {
        self.code == -32005 || self.message.to_lowercase().contains("rate limit")
    }
}

#[derive(Debug, Clone)]
pub struct SuiRpc {
    url: String,
}

impl SuiRpc {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
        }
    }

    /// Build a JSON-RPC call; method and params are part of the cache key
    pub fn call(&self, method: &str, params: Value, class: KeyClass) -> UpstreamRequest {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });
        UpstreamRequest::post_json(&self.url, body, &format!("{}{}", method, params), class)
    }

    /// Current epoch system state, including the active validator set
    pub fn latest_system_state(&self) -> UpstreamRequest {
        self.call(GET_LATEST_SYSTEM_STATE, json!([]), KeyClass::Validators)
    }
}

/// Map a raw JSON-RPC answer onto plain HTTP semantics
pub fn unwrap_rpc(response: UpstreamResponse) -> FetchResult<UpstreamResponse> {
    if !response.is_success() {
        return Ok(response);
    }
    let envelope: RpcEnvelope = serde_json::from_slice(&response.body)?;
    match (envelope.result, envelope.error) {
        (_, Some(error)) if error.is_rate_limit() => {
            debug!("🚦 RPC rate limited: {}", error.message);
            Ok(UpstreamResponse::new(429, error.message))
        }
        (_, Some(error)) => {
            debug!("RPC error {}: {}", error.code, error.message);
            Ok(UpstreamResponse::new(
                400,
                format!("RPC error: {} (code: {})", error.message, error.code),
            ))
        }
        (Some(result), None) => Ok(UpstreamResponse::json(&result)),
        (None, None) => Err(FetchError::invalid_payload("RPC response has neither result nor error")),
    }
}

/// One JSON-RPC call through `http`, unwrapped with [`unwrap_rpc`]
pub fn send(http: &HttpUpstream, request: &UpstreamRequest) -> BoxFuture<'static, FetchResult<UpstreamResponse>> {
    let call = http.send(request);
    async move { unwrap_rpc(call.await?) }.boxed()
}

/// Owned JSON-RPC fetch function for multi-part resolves
pub fn fetcher(http: &HttpUpstream, request: &UpstreamRequest) -> BoxedFetch {
    let http = http.clone();
    let request = request.clone();
    Box::new(move || send(&http, &request))
}
