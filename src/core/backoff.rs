//! Backoff Policy
//!
//! Deterministic exponential backoff: `base * 2^attempt`, no jitter unless
//! the retry config asks for it. Retry eligibility is decided from the
//! failure kind and the attempt count only.

use rand::Rng;
use std::time::Duration;

use crate::models::errors::ErrorKind;

/// Delay to await after failed `attempt` (0-based).
///
/// Exact `base_delay * 2^attempt`, saturating at `Duration::MAX`.
pub fn next_delay(attempt: u32, base_delay: Duration) -> Duration {
    match 1u32.checked_shl(attempt) {
        Some(factor) => base_delay.saturating_mul(factor),
        None if base_delay.is_zero() => Duration::ZERO,
        None => Duration::MAX,
    }
}

/// Whether the loop may try again after `attempt` (0-based) failed with `kind`.
///
/// `max_retries` is the retry budget, so attempts run `0..=max_retries`.
/// `NonRetryableStatus` (4xx and friends) is never retried.
pub fn is_retryable(kind: ErrorKind, attempt: u32, max_retries: u32) -> bool {
    attempt < max_retries
        && matches!(
            kind,
            ErrorKind::Timeout | ErrorKind::RetryableStatus | ErrorKind::Transport
        )
}

/// Decorrelated jitter: uniform in `[base, 3 * previous]`, never above `cap`.
///
/// `cap` is the deterministic delay for the attempt so the documented
/// worst-case latency still holds.
pub fn decorrelated_delay(base: Duration, previous: Duration, cap: Duration) -> Duration {
    let low = base.min(cap);
    let high = previous.saturating_mul(3).min(cap);
    if high <= low {
        return low;
    }
    let millis = rand::thread_rng().gen_range(low.as_millis()..=high.as_millis());
    Duration::from_millis(u64::try_from(millis).unwrap_or(u64::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_delay_doubles() {
        let base = Duration::from_millis(500);
        for attempt in 0..10 {
            assert_eq!(next_delay(attempt, base), base * 2u32.pow(attempt));
        }
    }

    #[test]
    fn test_next_delay_saturates() {
        assert_eq!(next_delay(64, Duration::from_millis(1)), Duration::MAX);
        assert_eq!(next_delay(64, Duration::ZERO), Duration::ZERO);
    }

    #[test]
    fn test_non_retryable_status_never_retried() {
        for attempt in 0..5 {
            assert!(!is_retryable(ErrorKind::NonRetryableStatus, attempt, 10));
        }
    }

    #[test]
    fn test_transient_kinds_retried_until_budget() {
        assert!(is_retryable(ErrorKind::Timeout, 0, 2));
        assert!(is_retryable(ErrorKind::Transport, 1, 2));
        assert!(is_retryable(ErrorKind::RetryableStatus, 1, 2));
        assert!(!is_retryable(ErrorKind::RetryableStatus, 2, 2));
        assert!(!is_retryable(ErrorKind::InvalidPayload, 0, 2));
    }

    #[test]
    fn test_decorrelated_delay_stays_in_bounds() {
        let base = Duration::from_millis(100);
        let cap = Duration::from_millis(800);
        let mut previous = base;
        for _ in 0..50 {
            let delay = decorrelated_delay(base, previous, cap);
            assert!(delay >= base && delay <= cap, "delay {:?} out of bounds", delay);
            previous = delay;
        }
    }
}
