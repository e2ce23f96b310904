//! IP geolocation requests (ip-api.com)

use std::net::IpAddr;

use super::UpstreamRequest;
use crate::models::config::KeyClass;
use crate::utils::constants::GEO_BASE_URL;

const GEO_FIELDS: &str = "status,message,country,countryCode,regionName,city,lat,lon,isp,query";

#[derive(Debug, Clone)]
pub struct GeoLocator {
    base_url: String,
}

impl Default for GeoLocator {
    fn default() -> Self {
        Self::new(GEO_BASE_URL)
    }
}

impl GeoLocator {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Location of one address; the canonical address form is the cache key
    pub fn lookup(&self, ip: IpAddr) -> UpstreamRequest {
        UpstreamRequest::get(format!("{}/{}", self.base_url, ip), KeyClass::Geo)
            .with_param("fields", GEO_FIELDS)
    }
}
