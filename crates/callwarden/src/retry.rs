//! Linear retry policy for background dispatch.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default number of delivery attempts per dispatch task.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default pause between two attempts.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Verdict for a finished attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryVerdict {
    /// Try again after `delay`.
    RetryAfter(Duration),
    /// No attempts left.
    GiveUp,
}

/// Constant delay between attempts, bounded attempt count. No jitter, no
/// growth: the worst case is `max_attempts * delay` plus execution time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    max_attempts: u32,
    #[serde(with = "duration_ms")]
    delay: Duration,
}

impl RetryPolicy {
    /// Create a policy. `max_attempts` is clamped to at least one.
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Whether another attempt follows `attempt` (1-indexed).
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// Verdict after `attempt` (1-indexed) failed.
    pub fn after_attempt(&self, attempt: u32) -> RetryVerdict {
        if self.should_retry(attempt) {
            RetryVerdict::RetryAfter(self.delay)
        } else {
            RetryVerdict::GiveUp
        }
    }

    /// Total time spent waiting between attempts in the worst case.
    pub fn retry_budget(&self) -> Duration {
        self.delay.saturating_mul(self.max_attempts)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_DELAY)
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
