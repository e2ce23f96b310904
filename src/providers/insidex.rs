//! InsidEx request builders (Sui coin market data)

use super::UpstreamRequest;
use crate::models::config::KeyClass;
use crate::utils::constants::INSIDEX_BASE_URL;

const API_KEY_HEADER: &str = "x-api-key";

#[derive(Clone)]
pub struct InsidEx {
    base_url: String,
    api_key: Option<String>,
}

impl std::fmt::Debug for InsidEx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InsidEx")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .finish()
    }
}

impl InsidEx {
    pub fn new(base_url: &str, api_key: Option<String>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    pub fn from_key(api_key: Option<String>) -> Self {
        Self::new(INSIDEX_BASE_URL, api_key)
    }

    /// Market data (price, volume, holders) for one coin type, e.g. `0x2::sui::SUI`
    pub fn coin_market(&self, coin_type: &str) -> UpstreamRequest {
        let request = UpstreamRequest::get(
            format!("{}/coins/{}/market-data", self.base_url, coin_type),
            KeyClass::CoinMarket,
        );
        match &self.api_key {
            Some(key) => request.with_header(API_KEY_HEADER, key.as_str()),
            None => request,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_key_sent_as_header() {
        let request = InsidEx::from_key(Some("secret".to_string())).coin_market("0x2::sui::SUI");
        assert_eq!(request.url, "https://api-ex.insidex.trade/coins/0x2::sui::SUI/market-data");
        assert_eq!(request.headers, vec![(API_KEY_HEADER, "secret".to_string())]);
        assert!(!request.key.contains("secret"));
    }

    #[test]
    fn test_debug_hides_key() {
        let insidex = InsidEx::from_key(Some("secret".to_string()));
        assert!(!format!("{:?}", insidex).contains("secret"));
    }
}
