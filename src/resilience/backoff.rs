//! Exponential backoff for connection retries.

use std::time::Duration;

/// Calculate the delay before retry attempt `attempt` (1-based).
///
/// Delay doubles per attempt from `base_ms` and is capped at `max_ms`, so
/// successive delays are non-decreasing.
pub fn calculate_backoff(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    if attempt == 0 {
        return Duration::from_millis(0);
    }

    let exponential_base = 2u64.saturating_pow(attempt - 1);
    let delay_ms = base_ms.saturating_mul(exponential_base);

    Duration::from_millis(delay_ms.min(max_ms))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles() {
        assert_eq!(calculate_backoff(1, 100, 2000).as_millis(), 100);
        assert_eq!(calculate_backoff(2, 100, 2000).as_millis(), 200);
        assert_eq!(calculate_backoff(3, 100, 2000).as_millis(), 400);
    }

    #[test]
    fn test_backoff_caps_at_max() {
        assert_eq!(calculate_backoff(10, 100, 1000).as_millis(), 1000);
        assert_eq!(calculate_backoff(63, 100, 30_000).as_millis(), 30_000);
    }

    #[test]
    fn test_backoff_is_non_decreasing() {
        let mut previous = Duration::ZERO;
        for attempt in 1..=20 {
            let delay = calculate_backoff(attempt, 500, 30_000);
            assert!(delay >= previous, "attempt {attempt} decreased");
            previous = delay;
        }
    }

    #[test]
    fn test_zero_attempt_has_no_delay() {
        assert_eq!(calculate_backoff(0, 500, 30_000), Duration::ZERO);
    }
}
