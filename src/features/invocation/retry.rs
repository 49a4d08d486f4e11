//! Backoff scheduling and per-model retry budget
//!
//! - **Version**: 1.0.0
//! - **Since**: 1.0.0
//!
//! ## Changelog
//! - 1.0.0: Initial release

use log::debug;
use rand::Rng;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Attempts per model, including the first one
    pub max_retries: u32,
    pub base_delay: Duration,
    /// Upper bound (exclusive) of the random jitter added to each delay
    pub jitter_ceiling: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            jitter_ceiling: Duration::from_millis(200),
        }
    }
}

/// Returned when the request deadline passes during a backoff wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeadlineElapsed;

/// Attempt counter for one model. Lives only as long as that model is being tried.
#[derive(Debug)]
pub struct RetryState {
    attempt: u32,
    max_attempts: u32,
}

impl RetryState {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            attempt: 0,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// True while another attempt on the same model is still within budget
    pub fn can_retry(&self) -> bool {
        self.attempt + 1 < self.max_attempts
    }

    pub fn advance(&mut self) {
        self.attempt += 1;
    }
}

#[derive(Debug, Clone)]
pub struct RetryScheduler {
    config: RetryConfig,
}

impl RetryScheduler {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn max_attempts(&self) -> u32 {
        self.config.max_retries.max(1)
    }

    pub fn start(&self) -> RetryState {
        RetryState::new(self.max_attempts())
    }

    /// `base * 2^attempt + uniform[0, jitter)`, saturating instead of overflowing
    pub fn next_delay(&self, attempt: u32) -> Duration {
        let jitter_ms = self.config.jitter_ceiling.as_millis() as u64;
        let jitter = if jitter_ms > 0 {
            rand::rng().random_range(0..jitter_ms)
        } else {
            0
        };
        Self::exponential(self.config.base_delay, attempt) + Duration::from_millis(jitter)
    }

    fn exponential(base: Duration, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        base.checked_mul(factor).unwrap_or(Duration::MAX / 2)
    }

    /// Sleep for the backoff of `attempt`, giving up when `deadline` passes first
    pub async fn wait(
        &self,
        attempt: u32,
        deadline: Option<Instant>,
    ) -> Result<Duration, DeadlineElapsed> {
        let delay = self.next_delay(attempt);
        debug!(
            "Retry backoff: attempt {} -> {}, sleeping {}ms",
            attempt,
            attempt + 1,
            delay.as_millis()
        );

        match deadline {
            Some(deadline) => {
                tokio::time::timeout_at(deadline, tokio::time::sleep(delay))
                    .await
                    .map_err(|_| DeadlineElapsed)?;
            }
            None => tokio::time::sleep(delay).await,
        }
        Ok(delay)
    }

    /// Worst-case latency of a full chain run when no deadline interrupts it:
    /// every call times out and every permitted backoff hits its jitter ceiling.
    pub fn worst_case_latency(&self, candidates: usize, call_timeout: Duration) -> Duration {
        let attempts = self.max_attempts();
        let per_model = (0..attempts).fold(Duration::ZERO, |total, attempt| {
            let mut total = total.saturating_add(call_timeout);
            if attempt + 1 < attempts {
                total = total
                    .saturating_add(Self::exponential(self.config.base_delay, attempt))
                    .saturating_add(self.config.jitter_ceiling);
            }
            total
        });
        per_model.saturating_mul(candidates as u32)
    }
}
