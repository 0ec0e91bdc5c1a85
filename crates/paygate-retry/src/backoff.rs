//! Backoff Schedule
//!
//! Exponential delay between redelivery attempts, capped so the
//! schedule stays bounded no matter how many attempts accumulate.

use std::time::Duration;

use chrono::{DateTime, Utc};

/// Redelivery schedule: `base * 2^attempts`, capped at `cap`
#[derive(Clone, Debug)]
pub struct BackoffPolicy {
    /// Delay before the first retry
    pub base: Duration,

    /// Ceiling on any single delay
    pub cap: Duration,

    /// Failed attempts after which an entry is exhausted
    pub max_attempts: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(60),
            cap: Duration::from_secs(3600),
            max_attempts: 5,
        }
    }
}

impl BackoffPolicy {
    pub fn new(base: Duration, cap: Duration, max_attempts: u32) -> Self {
        Self {
            base,
            cap,
            max_attempts,
        }
    }

    /// Delay to wait after `attempts` completed failures
    ///
    /// `attempts = 0` yields the base interval, used when an entry is
    /// first stored.
    pub fn delay_for(&self, attempts: u32) -> Duration {
        let base_ms = self.base.as_millis() as u64;
        let factor = 2u64.saturating_pow(attempts);
        let delay_ms = base_ms.saturating_mul(factor);
        Duration::from_millis(delay_ms.min(self.cap.as_millis() as u64))
    }

    /// Scheduled time of the next attempt, `attempts` failures in
    pub fn next_retry_at(&self, now: DateTime<Utc>, attempts: u32) -> DateTime<Utc> {
        now + chrono::Duration::milliseconds(self.delay_for(attempts).as_millis() as i64)
    }
}
