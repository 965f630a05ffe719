//! # Backoff
//!
//! Exponential backoff as a small explicit state machine. Shared by the
//! tool retry loop and the relay's upstream reconnect loop.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Backoff parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackoffPolicy {
    /// Delay before the first retry
    #[serde(with = "millis")]
    pub base_delay: Duration,
    /// Upper bound for any single delay
    #[serde(with = "millis")]
    pub max_delay: Duration,
    /// Maximum number of attempts (including the first one)
    pub max_attempts: u32,
}

impl BackoffPolicy {
    pub fn new(base_delay: Duration, max_delay: Duration, max_attempts: u32) -> Self {
        Self {
            base_delay,
            max_delay,
            max_attempts,
        }
    }

    /// Start a fresh backoff sequence
    pub fn start(&self) -> Backoff {
        Backoff {
            policy: *self,
            attempt: 0,
        }
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_attempts: 3,
        }
    }
}

/// Running backoff state
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: BackoffPolicy,
    attempt: u32,
}

impl Backoff {
    /// Number of attempts recorded so far
    pub fn attempts(&self) -> u32 {
        self.attempt
    }

    /// Record an attempt. Returns `false` once the attempt ceiling is hit.
    pub fn try_attempt(&mut self) -> bool {
        if self.attempt >= self.policy.max_attempts {
            return false;
        }
        self.attempt += 1;
        true
    }

    /// Delay to wait after the current (failed) attempt, or `None` when
    /// no attempts remain.
    pub fn next_delay(&self) -> Option<Duration> {
        if self.attempt == 0 || self.attempt >= self.policy.max_attempts {
            return None;
        }
        let factor = 1u32.checked_shl(self.attempt - 1).unwrap_or(u32::MAX);
        let delay = self
            .policy
            .base_delay
            .checked_mul(factor)
            .unwrap_or(self.policy.max_delay);
        Some(delay.min(self.policy.max_delay))
    }

    /// Forget previous failures (after a successful attempt)
    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delays_double_until_exhausted() {
        let policy = BackoffPolicy::new(Duration::from_millis(100), Duration::from_secs(10), 3);
        let mut backoff = policy.start();

        assert_eq!(backoff.next_delay(), None);
        assert!(backoff.try_attempt());
        assert_eq!(backoff.next_delay(), Some(Duration::from_millis(100)));
        assert!(backoff.try_attempt());
        assert_eq!(backoff.next_delay(), Some(Duration::from_millis(200)));
        assert!(backoff.try_attempt());
        assert_eq!(backoff.next_delay(), None);
        assert!(!backoff.try_attempt());
        assert_eq!(backoff.attempts(), 3);
    }

    #[test]
    fn test_delay_is_capped() {
        let policy = BackoffPolicy::new(Duration::from_secs(1), Duration::from_secs(3), 10);
        let mut backoff = policy.start();
        for _ in 0..5 {
            backoff.try_attempt();
        }
        assert_eq!(backoff.next_delay(), Some(Duration::from_secs(3)));
    }

    #[test]
    fn test_reset() {
        let mut backoff = BackoffPolicy::default().start();
        backoff.try_attempt();
        backoff.try_attempt();
        backoff.reset();
        assert_eq!(backoff.attempts(), 0);
        assert!(backoff.try_attempt());
        assert_eq!(backoff.next_delay(), Some(Duration::from_secs(1)));
    }
}
