//! Core data types for the upstream data layer

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::errors::{ErrorKind, FetchError, FetchResult};

/// Raw answer from one upstream HTTP call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl UpstreamResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// 200 with a JSON body
    pub fn json(value: &serde_json::Value) -> Self {
        Self::new(200, value.to_string())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Decode a 2xx body.
    ///
    /// A final non-2xx status is a `NonRetryableStatus` failure; an
    /// undecodable body is `InvalidPayload`.
    pub fn decode<V: DeserializeOwned>(&self) -> FetchResult<V> {
        if !self.is_success() {
            return Err(FetchError::status(self.status));
        }
        serde_json::from_slice(&self.body).map_err(|e| {
            FetchError::with_source(
                ErrorKind::InvalidPayload,
                format!("Undecodable {}-byte body", self.body.len()),
                e,
            )
        })
    }
}

/// Record of one attempt inside a Fetch-With-Retry invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryAttempt {
    pub attempt_number: u32,
    /// `None` when the attempt succeeded
    pub failure_kind: Option<ErrorKind>,
    /// Status returned by the attempt, if upstream answered
    pub status: Option<u16>,
    /// Backoff awaited after this attempt; `None` on the final attempt
    pub delay_before_next: Option<Duration>,
}

/// Where a served value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    /// Cache hit within TTL, or a fetch just succeeded
    Fresh,
    /// Cache hit past TTL, served after a fetch failure
    Stale,
    /// No value available anywhere
    Miss,
}

impl Origin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fresh => "fresh",
            Self::Stale => "stale",
            Self::Miss => "miss",
        }
    }

    /// Worst-of ordering used when merging sub-results
    fn severity(&self) -> u8 {
        match self {
            Self::Fresh => 0,
            Self::Stale => 1,
            Self::Miss => 2,
        }
    }
}

/// Outcome of one logical resolve
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateResult<V> {
    pub value: Option<V>,
    pub origin: Origin,
    /// Failure that forced a stale fallback or a miss
    pub error: Option<ErrorKind>,
    /// Human-readable failure text
    pub detail: Option<String>,
    /// Age of the served value
    pub age: Option<Duration>,
}

impl<V> AggregateResult<V> {
    pub fn fresh(value: V, age: Duration) -> Self {
        Self {
            value: Some(value),
            origin: Origin::Fresh,
            error: None,
            detail: None,
            age: Some(age),
        }
    }

    pub fn stale(value: V, age: Duration, err: &FetchError) -> Self {
        Self {
            value: Some(value),
            origin: Origin::Stale,
            error: Some(err.kind),
            detail: Some(err.to_string()),
            age: Some(age),
        }
    }

    pub fn miss(err: &FetchError) -> Self {
        Self {
            value: None,
            origin: Origin::Miss,
            error: Some(err.kind),
            detail: Some(err.to_string()),
            age: None,
        }
    }

    pub fn is_miss(&self) -> bool {
        self.origin == Origin::Miss
    }

    pub fn is_stale(&self) -> bool {
        self.origin == Origin::Stale
    }
}

/// Whether a sub-fetch must succeed for the combined result to be usable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Requirement {
    Required,
    Optional,
}

/// One resolved sub-fetch of a multi-upstream request
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedPart<V> {
    pub key: String,
    pub requirement: Requirement,
    /// Freshness TTL of the cache policy the part resolved under
    pub ttl: Duration,
    pub result: AggregateResult<V>,
}

/// Merge of several [`AggregateResult`]s
///
/// - any `Required` part in `Miss` makes the whole result `Miss`
/// - otherwise the worst origin among parts that produced a value wins
/// - `Optional` parts in `Miss` set `partial` and contribute no value
/// - no parts at all is a `Miss` with `CacheMiss`
#[derive(Debug, Clone, PartialEq)]
pub struct CombinedResult<V> {
    pub origin: Origin,
    pub partial: bool,
    pub error: Option<ErrorKind>,
    pub parts: Vec<ResolvedPart<V>>,
}

impl<V> CombinedResult<V> {
    pub fn combine(parts: Vec<ResolvedPart<V>>) -> Self {
        let required_miss = parts
            .iter()
            .find(|p| p.requirement == Requirement::Required && p.result.is_miss());

        if let Some(missed) = required_miss {
            let error = missed.result.error.or(Some(ErrorKind::CacheMiss));
            return Self {
                origin: Origin::Miss,
                partial: false,
                error,
                parts,
            };
        }

        let served: Vec<&ResolvedPart<V>> = parts.iter().filter(|p| !p.result.is_miss()).collect();
        let partial = served.len() < parts.len();

        let (origin, error) = match served.iter().max_by_key(|p| p.result.origin.severity()) {
            Some(worst) => (worst.result.origin, worst.result.error),
            // No parts, or only optional parts and all missed
            None => (
                Origin::Miss,
                parts
                    .iter()
                    .find_map(|p| p.result.error)
                    .or(Some(ErrorKind::CacheMiss)),
            ),
        };

        Self {
            origin,
            partial: partial && origin != Origin::Miss,
            error,
            parts,
        }
    }

    /// Value of the part stored under `key`, if it produced one
    pub fn value(&self, key: &str) -> Option<&V> {
        self.parts
            .iter()
            .find(|p| p.key == key)
            .and_then(|p| p.result.value.as_ref())
    }

    pub fn is_miss(&self) -> bool {
        self.origin == Origin::Miss
    }

    /// How long the merged document stays fresh: the shortest remaining
    /// TTL among parts that produced a value
    pub fn fresh_for(&self) -> Duration {
        self.parts
            .iter()
            .filter(|p| !p.result.is_miss())
            .map(|p| p.ttl.saturating_sub(p.result.age.unwrap_or_default()))
            .min()
            .unwrap_or_default()
    }

    /// Age of the oldest value served
    pub fn max_age(&self) -> Duration {
        self.parts
            .iter()
            .filter_map(|p| p.result.age)
            .max()
            .unwrap_or_default()
    }
}
