//! Providers Module - External Data Sources
//!
//! Upstreams behind the dashboard: DeFiLlama, InsidEx, Sui RPC, and IP
//! geolocation. Each provider only builds [`UpstreamRequest`]s; transport,
//! retry, and caching are shared.

pub mod defillama;
pub mod geo;
pub mod http;
pub mod insidex;
pub mod sui_rpc;

pub use defillama::DefiLlama;
pub use geo::GeoLocator;
pub use http::HttpUpstream;
pub use insidex::InsidEx;
pub use sui_rpc::SuiRpc;

use serde_json::Value;

use crate::models::config::KeyClass;
use crate::utils::cache::normalize_key;

/// One upstream call, described independently of how it is sent
#[derive(Debug, Clone)]
pub struct UpstreamRequest {
    /// Normalized cache key
    pub key: String,
    pub class: KeyClass,
    pub url: String,
    pub params: Vec<(String, String)>,
    /// JSON body; present means POST
    pub body: Option<Value>,
    pub headers: Vec<(&'static str, String)>,
}

impl UpstreamRequest {
    pub fn get(url: impl Into<String>, class: KeyClass) -> Self {
        let url = url.into();
        Self {
            key: normalize_key(&url, &[]),
            class,
            url,
            params: Vec::new(),
            body: None,
            headers: Vec::new(),
        }
    }

    /// POST with a JSON body. `key_suffix` tells apart requests sharing one URL
    /// (e.g. JSON-RPC method and params).
    pub fn post_json(url: impl Into<String>, body: Value, key_suffix: &str, class: KeyClass) -> Self {
        let url = url.into();
        Self {
            key: format!("{}#{}", normalize_key(&url, &[]), key_suffix),
            class,
            url,
            params: Vec::new(),
            body: Some(body),
            headers: Vec::new(),
        }
    }

    pub fn with_param(mut self, name: &str, value: impl Into<String>) -> Self {
        self.params.push((name.to_string(), value.into()));
        let params: Vec<(&str, &str)> = self
            .params
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        self.key = normalize_key(&self.url, &params);
        self
    }

    /// Headers never take part in the cache key
    pub fn with_header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }
}

/// Validate a caller-supplied path segment (slug, coin type).
///
/// Returns the trimmed segment, or `None` when it is empty, too long, or
/// would change the upstream path.
pub fn path_segment(input: &str) -> Option<&str> {
    let trimmed = input.trim();
    let valid = !trimmed.is_empty()
        && trimmed.len() <= 256
        && !trimmed.contains(['/', '?', '#', '%', '\\'])
        && !trimmed.contains("..")
        && trimmed.chars().all(|c| c.is_ascii_graphic());
    valid.then_some(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_key_is_normalized() {
        let request = UpstreamRequest::get("HTTPS://API.LLAMA.FI/tvl/cetus", KeyClass::Tvl);
        assert_eq!(request.key, "https://api.llama.fi/tvl/cetus");
        assert!(request.body.is_none());
    }

    #[test]
    fn test_params_are_part_of_key_in_sorted_order() {
        let a = UpstreamRequest::get("https://coins.llama.fi/prices", KeyClass::Price)
            .with_param("b", "2")
            .with_param("a", "1");
        let b = UpstreamRequest::get("https://coins.llama.fi/prices", KeyClass::Price)
            .with_param("a", "1")
            .with_param("b", "2");
        assert_eq!(a.key, b.key);
        assert_eq!(a.key, "https://coins.llama.fi/prices?a=1&b=2");
    }

    #[test]
    fn test_headers_do_not_change_key() {
        let plain = UpstreamRequest::get("https://api-ex.insidex.trade/x", KeyClass::CoinMarket);
        let keyed = plain.clone().with_header("x-api-key", "secret");
        assert_eq!(plain.key, keyed.key);
    }

    #[test]
    fn test_post_key_carries_suffix() {
        let request = UpstreamRequest::post_json(
            "https://fullnode.mainnet.sui.io:443",
            serde_json::json!({}),
            "suix_getLatestSuiSystemState[]",
            KeyClass::Validators,
        );
        assert_eq!(
            request.key,
            "https://fullnode.mainnet.sui.io/#suix_getLatestSuiSystemState[]"
        );
    }

    #[test]
    fn test_path_segment() {
        assert_eq!(path_segment(" cetus "), Some("cetus"));
        assert_eq!(path_segment("0x2::sui::SUI"), Some("0x2::sui::SUI"));
        assert_eq!(path_segment(""), None);
        assert_eq!(path_segment("../admin"), None);
        assert_eq!(path_segment("a/b"), None);
        assert_eq!(path_segment("a b"), None);
    }
}
