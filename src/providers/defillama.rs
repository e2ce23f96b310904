//! DeFiLlama request builders
//!
//! Free public API, no key. TVL and protocol endpoints live on
//! `api.llama.fi`, prices on `coins.llama.fi`.

use super::UpstreamRequest;
use crate::models::config::KeyClass;
use crate::utils::constants::{DEFILLAMA_BASE_URL, DEFILLAMA_COINS_URL};

/// Chain name DeFiLlama uses for Sui
pub const SUI_CHAIN: &str = "Sui";

#[derive(Debug, Clone)]
pub struct DefiLlama {
    base_url: String,
    coins_url: String,
}

impl Default for DefiLlama {
    fn default() -> Self {
        Self::new(DEFILLAMA_BASE_URL, DEFILLAMA_COINS_URL)
    }
}

impl DefiLlama {
    pub fn new(base_url: &str, coins_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            coins_url: coins_url.trim_end_matches('/').to_string(),
        }
    }

    /// Current TVL of one protocol (a bare number)
    pub fn protocol_tvl(&self, slug: &str) -> UpstreamRequest {
        UpstreamRequest::get(format!("{}/tvl/{}", self.base_url, slug), KeyClass::Tvl)
    }

    /// Full protocol document including its TVL history
    pub fn protocol(&self, slug: &str) -> UpstreamRequest {
        UpstreamRequest::get(format!("{}/protocol/{}", self.base_url, slug), KeyClass::Chart)
    }

    /// Daily TVL series of one chain
    pub fn chain_tvl_history(&self, chain: &str) -> UpstreamRequest {
        UpstreamRequest::get(
            format!("{}/v2/historicalChainTvl/{}", self.base_url, chain),
            KeyClass::Chart,
        )
    }

    /// Current prices for `chain:address` coin ids.
    ///
    /// Ids are sorted so the same set always maps to one cache key.
    pub fn current_prices(&self, coins: &[&str]) -> UpstreamRequest {
        let mut ids: Vec<&str> = coins.to_vec();
        ids.sort_unstable();
        ids.dedup();
        UpstreamRequest::get(
            format!("{}/prices/current/{}", self.coins_url, ids.join(",")),
            KeyClass::Price,
        )
        .with_param("searchWidth", "4h")
    }
}
