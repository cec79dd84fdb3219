//! Retry utilities: backoff builders for server connection.
//!
//! Uses `backon` for exponential backoff with jitter.

use std::time::Duration;

use backon::ExponentialBuilder;

/// Minimum delay between connection attempts.
pub const MIN_DELAY: Duration = Duration::from_millis(100);
/// Maximum delay between connection attempts.
pub const MAX_DELAY: Duration = Duration::from_secs(5);

/// Backoff for reaching the server at startup.
///
/// - Min delay: 100ms
/// - Max delay: 5s
/// - Max attempts: `max_times`
/// - Jitter enabled
pub fn connection_backoff(max_times: usize) -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(MIN_DELAY)
        .with_max_delay(MAX_DELAY)
        .with_max_times(max_times)
        .with_jitter()
}

#[cfg(test)]
mod tests {
    use super::*;
    use backon::BackoffBuilder;

    #[test]
    fn test_connection_backoff_attempts() {
        let delays: Vec<Duration> = connection_backoff(4).build().collect();
        assert_eq!(delays.len(), 4);
    }

    #[test]
    fn test_connection_backoff_is_capped() {
        for delay in connection_backoff(30).build() {
            assert!(delay >= MIN_DELAY);
            // Jitter adds up to one extra delay on top of the cap
            assert!(delay <= MAX_DELAY * 2);
        }
    }

    #[test]
    fn test_zero_retries_yields_no_delays() {
        assert_eq!(connection_backoff(0).build().count(), 0);
    }
}
