//! Core Module - Resilience Engine
//!
//! Backoff policy, timeout guard, retry loop, and the aggregator that puts
//! them in front of the response cache.

pub mod aggregator;
pub mod backoff;
pub mod retry;
pub mod timeout;

pub use aggregator::*;
pub use backoff::{is_retryable, next_delay};
pub use retry::*;
pub use timeout::guard;
