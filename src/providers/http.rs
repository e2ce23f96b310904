//! HTTP upstream transport
//!
//! One shared reqwest client (User-Agent, gzip, connect timeout) that turns
//! an [`UpstreamRequest`] into a raw [`UpstreamResponse`]. No per-request
//! timeout is set here: the Timeout Guard bounds every attempt and drops the
//! request future when it fires, which aborts the connection.

use eyre::{eyre, Result};
use futures_util::future::{BoxFuture, FutureExt};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_ENCODING, USER_AGENT};
use serde_json::Value;

use super::UpstreamRequest;
use crate::core::aggregator::{Aggregator, BoxedFetch, SubRequest};
use crate::models::errors::FetchResult;
use crate::models::types::{AggregateResult, Requirement, UpstreamResponse};
use crate::utils::constants::{CONNECT_TIMEOUT, USER_AGENT as USER_AGENT_CONST};

/// Shared HTTP client for all upstreams, cheap to clone
#[derive(Clone)]
pub struct HttpUpstream {
    client: reqwest::Client,
}

impl HttpUpstream {
    pub fn new() -> Result<Self> {
        Ok(Self {
            client: Self::build_client()?,
        })
    }

    /// Build HTTP client with custom headers and gzip decompression
    fn build_client() -> Result<reqwest::Client> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_CONST));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("gzip"));

        reqwest::Client::builder()
            .default_headers(headers)
            .connect_timeout(CONNECT_TIMEOUT)
            .gzip(true)
            .build()
            .map_err(|e| eyre!("Failed to build HTTP client: {}", e))
    }

    /// Perform one raw upstream call. Any status is a successful call here;
    /// classification happens in the retry loop.
    pub fn send(&self, request: &UpstreamRequest) -> BoxFuture<'static, FetchResult<UpstreamResponse>> {
        let mut builder = match &request.body {
            Some(body) => self.client.post(&request.url).json(body),
            None => self.client.get(&request.url),
        };
        if !request.params.is_empty() {
            builder = builder.query(&request.params);
        }
        for (name, value) in &request.headers {
            builder = builder.header(*name, value);
        }

        async move {
            let response = builder.send().await?;
            let status = response.status().as_u16();
            let body = response.bytes().await?;
            Ok(UpstreamResponse::new(status, body.to_vec()))
        }
        .boxed()
    }

    /// Owned fetch function for `request`, for multi-part resolves
    pub fn fetcher(&self, request: &UpstreamRequest) -> BoxedFetch {
        let http = self.clone();
        let request = request.clone();
        Box::new(move || http.send(&request))
    }

    pub fn sub_request(&self, request: &UpstreamRequest, requirement: Requirement) -> SubRequest {
        SubRequest {
            key: request.key.clone(),
            requirement,
            cache_policy: request.class.cache_policy(),
            retry: request.class.retry_config(),
            fetch: self.fetcher(request),
        }
    }

    /// Resolve one request with its key class's cache policy and retry config
    pub async fn resolve(
        &self,
        aggregator: &Aggregator<Value>,
        request: &UpstreamRequest,
    ) -> AggregateResult<Value> {
        let policy = request.class.cache_policy();
        let retry = request.class.retry_config();
        aggregator
            .resolve(&request.key, || self.send(request), &policy, &retry)
            .await
    }
}
