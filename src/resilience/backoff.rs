//! Exponential backoff with jitter.

use rand::Rng;
use std::time::Duration;

use crate::config::RetryConfig;

/// Calculate the backoff delay for an endpoint with `consecutive_errors` failures.
///
/// `min(max_ms, base_ms * 2^consecutive_errors)` plus uniform jitter in `0..=jitter_ms`.
pub fn calculate_backoff(consecutive_errors: u32, base_ms: u64, max_ms: u64, jitter_ms: u64) -> Duration {
    let exponential_base = 2u64.saturating_pow(consecutive_errors);
    let delay_ms = base_ms.saturating_mul(exponential_base);
    let capped_delay = delay_ms.min(max_ms);

    let jitter = if jitter_ms > 0 {
        rand::thread_rng().gen_range(0..=jitter_ms)
    } else {
        0
    };

    Duration::from_millis(capped_delay + jitter)
}

/// Backoff using the configured retry settings.
pub fn backoff_for(consecutive_errors: u32, config: &RetryConfig) -> Duration {
    calculate_backoff(
        consecutive_errors,
        config.base_delay_ms,
        config.max_delay_ms,
        config.jitter_ms,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_calculation() {
        assert_eq!(calculate_backoff(0, 1000, 60_000, 0), Duration::from_millis(1000));
        assert_eq!(calculate_backoff(1, 1000, 60_000, 0), Duration::from_millis(2000));
        assert_eq!(calculate_backoff(3, 1000, 60_000, 0), Duration::from_millis(8000));

        // Capped, even for absurd exponents.
        assert_eq!(calculate_backoff(6, 1000, 60_000, 0), Duration::from_millis(60_000));
        assert_eq!(calculate_backoff(200, 1000, 60_000, 0), Duration::from_millis(60_000));
    }

    #[test]
    fn test_jitter_range() {
        for _ in 0..100 {
            let delay = calculate_backoff(1, 1000, 60_000, 1000);
            assert!(delay >= Duration::from_millis(2000));
            assert!(delay <= Duration::from_millis(3000));
        }
    }
}
