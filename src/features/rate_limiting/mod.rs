//! # Feature: Rate Limiting
//!
//! Caps chat traffic per client IP with a sliding window. Uses DashMap so
//! concurrent requests from different clients never contend on one lock.
//!
//! - **Version**: 1.0.0
//! - **Since**: 1.0.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 1.0.0: Initial release, keyed by client IP

use dashmap::DashMap;
use std::time::{Duration, Instant};

#[derive(Debug)]
pub struct RateLimiter {
    requests: DashMap<String, Vec<Instant>>,
    max_requests: usize,
    time_window: Duration,
}

impl RateLimiter {
    pub fn new(max_requests: usize, time_window: Duration) -> Self {
        RateLimiter {
            requests: DashMap::new(),
            max_requests,
            time_window,
        }
    }

    /// Record a request from `client` and report whether it is within the limit.
    /// Rejected requests are not recorded.
    pub fn check_rate_limit(&self, client: &str) -> bool {
        let now = Instant::now();
        let mut entry = self.requests.entry(client.to_string()).or_default();

        entry.retain(|&time| now.duration_since(time) < self.time_window);

        if entry.len() >= self.max_requests {
            false
        } else {
            entry.push(now);
            true
        }
    }

    /// Drop clients with no requests inside the current window
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.requests.len();
        self.requests.retain(|_, times| {
            times.retain(|&time| now.duration_since(time) < self.time_window);
            !times.is_empty()
        });
        before - self.requests.len()
    }

    pub fn tracked_clients(&self) -> usize {
        self.requests.len()
    }

    pub fn time_window(&self) -> Duration {
        self.time_window
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::sleep;

    #[test]
    fn test_rate_limiter_allows_under_limit() {
        let limiter = RateLimiter::new(3, Duration::from_secs(1));

        assert!(limiter.check_rate_limit("10.0.0.1"));
        assert!(limiter.check_rate_limit("10.0.0.1"));
        assert!(limiter.check_rate_limit("10.0.0.1"));
    }

    #[test]
    fn test_rate_limiter_blocks_over_limit() {
        let limiter = RateLimiter::new(2, Duration::from_secs(1));

        assert!(limiter.check_rate_limit("10.0.0.1"));
        assert!(limiter.check_rate_limit("10.0.0.1"));
        assert!(!limiter.check_rate_limit("10.0.0.1"));
    }

    #[tokio::test]
    async fn test_rate_limiter_resets_after_window() {
        let limiter = RateLimiter::new(1, Duration::from_millis(100));

        assert!(limiter.check_rate_limit("10.0.0.1"));
        assert!(!limiter.check_rate_limit("10.0.0.1"));

        sleep(Duration::from_millis(150)).await;
        assert!(limiter.check_rate_limit("10.0.0.1"));
    }

    #[test]
    fn test_rate_limiter_per_client() {
        let limiter = RateLimiter::new(1, Duration::from_secs(1));

        assert!(limiter.check_rate_limit("10.0.0.1"));
        assert!(limiter.check_rate_limit("10.0.0.2"));
        assert!(!limiter.check_rate_limit("10.0.0.1"));
        assert!(!limiter.check_rate_limit("10.0.0.2"));
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let limiter = RateLimiter::new(5, Duration::from_millis(50));
        limiter.check_rate_limit("10.0.0.1");
        limiter.check_rate_limit("10.0.0.2");
        assert_eq!(limiter.tracked_clients(), 2);

        sleep(Duration::from_millis(80)).await;
        limiter.check_rate_limit("10.0.0.3");

        assert_eq!(limiter.purge_expired(), 2);
        assert_eq!(limiter.tracked_clients(), 1);
    }
}
