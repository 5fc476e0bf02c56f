//! Bounded retry for storage contention
//!
//! Only transient failures (`SQLITE_BUSY`, `SQLITE_LOCKED`) are retried. The
//! operation is re-executed from scratch each time, so it must open its own
//! transaction inside the closure.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Error, Result};

/// Exponential backoff policy
///
/// # Default Values
///
/// - `max_attempts`: 5
/// - `initial_delay_ms`: 10
/// - `max_delay_ms`: 250
/// - `multiplier`: 2.0
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    /// Delay before the first retry
    pub initial_delay_ms: u64,
    /// Cap for the exponential delay
    pub max_delay_ms: u64,
    /// Growth factor per attempt
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay_ms: 10,
            max_delay_ms: 250,
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay before retry number `attempt` (0-based), without jitter
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay_ms = self.initial_delay_ms as f64 * self.multiplier.powi(attempt as i32);
        let capped = delay_ms.min(self.max_delay_ms as f64).max(0.0);
        Duration::from_millis(capped as u64)
    }

    /// Run `op` until it succeeds, fails non-transiently, or attempts run out
    pub fn run<T, F>(&self, operation: &'static str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Result<T>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            match op() {
                Err(e) if e.is_transient() => {
                    attempt += 1;
                    if attempt >= max_attempts {
                        warn!(operation, attempts = attempt, "Giving up after storage contention");
                        return Err(Error::Transient { attempts: attempt });
                    }

                    let base = self.delay_for_attempt(attempt - 1);
                    // Up to 50% jitter so contending callers spread out
                    let jitter_ms = rand::thread_rng().gen_range(0..=base.as_millis() as u64 / 2);
                    let delay = base + Duration::from_millis(jitter_ms);
                    warn!(operation, attempt, delay_ms = delay.as_millis() as u64, error = %e, "Retrying after storage contention");
                    std::thread::sleep(delay);
                }
                other => return other,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn busy() -> Error {
        Error::Database(rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            None,
        ))
    }

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_delay_ms: 0,
            max_delay_ms: 0,
            multiplier: 2.0,
        }
    }

    #[test]
    fn test_delay_grows_and_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(10));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(20));
        assert_eq!(policy.delay_for_attempt(10), Duration::from_millis(250));
    }

    #[test]
    fn test_retries_transient_then_succeeds() {
        let calls = Cell::new(0);
        let result = fast_policy(3).run("test", || {
            calls.set(calls.get() + 1);
            if calls.get() < 3 {
                Err(busy())
            } else {
                Ok(7)
            }
        });
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn test_gives_up_as_transient() {
        let calls = Cell::new(0);
        let result: Result<()> = fast_policy(2).run("test", || {
            calls.set(calls.get() + 1);
            Err(busy())
        });
        assert!(matches!(result, Err(Error::Transient { attempts: 2 })));
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn test_conflicts_are_not_retried() {
        let calls = Cell::new(0);
        let result: Result<()> = fast_policy(5).run("test", || {
            calls.set(calls.get() + 1);
            Err(Error::InvalidWindow)
        });
        assert!(matches!(result, Err(Error::InvalidWindow)));
        assert_eq!(calls.get(), 1);
    }
}
