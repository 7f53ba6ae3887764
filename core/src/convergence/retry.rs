//! Bounded state polling.
//!
//! `PollPolicy` says how many times a state may be checked and how long to
//! wait between checks (fixed, linear or exponential). `wait_until` runs
//! the loop and never blocks past the last attempt.

use std::cell::RefCell;
use std::time::Duration;

use crate::error::Result;
use crate::types::config::{BackoffStrategy, PollConfig};

// ---------------------------------------------------------------------------
// PollPolicy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollPolicy {
    pub max_attempts: u32,
    pub strategy: BackoffStrategy,
    pub base_delay_ms: u64,
}

impl PollPolicy {
    pub fn new(max_attempts: u32, strategy: BackoffStrategy, base_delay_ms: u64) -> Self {
        PollPolicy {
            max_attempts,
            strategy,
            base_delay_ms,
        }
    }

    /// Whether the given attempt number (0-indexed) is within the budget.
    pub fn allows(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// Delay after the given failed attempt (0-indexed).
    pub fn delay_ms(&self, attempt: u32) -> u64 {
        match self.strategy {
            BackoffStrategy::Fixed => self.base_delay_ms,
            BackoffStrategy::Linear => self.base_delay_ms.saturating_mul(attempt as u64 + 1),
            BackoffStrategy::Exponential => {
                self.base_delay_ms.saturating_mul(2u64.saturating_pow(attempt))
            }
        }
    }

    /// Longest total time `wait_until` can sleep under this policy.
    pub fn worst_case(&self) -> Duration {
        let total: u64 = (0..self.max_attempts.saturating_sub(1))
            .map(|a| self.delay_ms(a))
            .fold(0u64, u64::saturating_add);
        Duration::from_millis(total)
    }
}

impl Default for PollPolicy {
    /// Default: 20 checks, one second apart.
    fn default() -> Self {
        PollPolicy {
            max_attempts: 20,
            strategy: BackoffStrategy::Fixed,
            base_delay_ms: 1000,
        }
    }
}

impl From<&PollConfig> for PollPolicy {
    fn from(config: &PollConfig) -> Self {
        PollPolicy::new(config.max_attempts, config.strategy, config.interval_ms)
    }
}

// ---------------------------------------------------------------------------
// Sleeper
// ---------------------------------------------------------------------------

pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Records requested sleeps instead of sleeping.
#[derive(Default)]
pub struct RecordingSleeper {
    sleeps: RefCell<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        RecordingSleeper::default()
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.borrow().clone()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.sleeps.borrow_mut().push(duration);
    }
}

// ---------------------------------------------------------------------------
// wait_until
// ---------------------------------------------------------------------------

/// Outcome of a bounded wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The check returned true on this (1-based) attempt.
    Reached { attempts: u32 },
    /// The check never returned true within the budget.
    Exhausted { attempts: u32 },
}

/// Call `check` until it returns true or the policy's attempts run out,
/// sleeping between attempts. Probe errors abort the wait.
pub fn wait_until<F>(policy: &PollPolicy, sleeper: &dyn Sleeper, mut check: F) -> Result<WaitOutcome>
where
    F: FnMut() -> Result<bool>,
{
    let mut attempt = 0;
    while policy.allows(attempt) {
        if check()? {
            return Ok(WaitOutcome::Reached {
                attempts: attempt + 1,
            });
        }
        if policy.allows(attempt + 1) {
            sleeper.sleep(Duration::from_millis(policy.delay_ms(attempt)));
        }
        attempt += 1;
    }
    Ok(WaitOutcome::Exhausted { attempts: attempt })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BootstrapError;

    #[test]
    fn default_policy() {
        let p = PollPolicy::default();
        assert_eq!(p.max_attempts, 20);
        assert_eq!(p.base_delay_ms, 1000);
        assert_eq!(p.strategy, BackoffStrategy::Fixed);
        assert_eq!(p.worst_case(), Duration::from_secs(19));
    }

    #[test]
    fn allows_within_budget() {
        let p = PollPolicy::new(3, BackoffStrategy::Fixed, 100);
        assert!(p.allows(0));
        assert!(p.allows(2));
        assert!(!p.allows(3));
    }

    #[test]
    fn fixed_delay() {
        let p = PollPolicy::new(3, BackoffStrategy::Fixed, 500);
        assert_eq!(p.delay_ms(0), 500);
        assert_eq!(p.delay_ms(5), 500);
    }

    #[test]
    fn linear_delay() {
        let p = PollPolicy::new(5, BackoffStrategy::Linear, 1000);
        assert_eq!(p.delay_ms(0), 1000);
        assert_eq!(p.delay_ms(2), 3000);
    }

    #[test]
    fn huge_intervals_saturate() {
        let p = PollPolicy::new(5, BackoffStrategy::Linear, u64::MAX / 2);
        assert_eq!(p.delay_ms(4), u64::MAX);
        assert_eq!(p.worst_case(), Duration::from_millis(u64::MAX));
    }

    #[test]
    fn exponential_delay() {
        let p = PollPolicy::new(5, BackoffStrategy::Exponential, 1000);
        assert_eq!(p.delay_ms(0), 1000);
        assert_eq!(p.delay_ms(3), 8000);
        assert_eq!(p.delay_ms(200), u64::MAX);
    }

    #[test]
    fn from_config() {
        let p = PollPolicy::from(&PollConfig::default());
        assert_eq!(p, PollPolicy::default());
    }

    #[test]
    fn reached_on_first_check_does_not_sleep() {
        let sleeper = RecordingSleeper::new();
        let outcome = wait_until(&PollPolicy::default(), &sleeper, || Ok(true)).unwrap();
        assert_eq!(outcome, WaitOutcome::Reached { attempts: 1 });
        assert!(sleeper.sleeps().is_empty());
    }

    #[test]
    fn reached_after_some_checks() {
        let sleeper = RecordingSleeper::new();
        let mut calls = 0;
        let outcome = wait_until(&PollPolicy::default(), &sleeper, || {
            calls += 1;
            Ok(calls == 3)
        })
        .unwrap();
        assert_eq!(outcome, WaitOutcome::Reached { attempts: 3 });
        assert_eq!(sleeper.sleeps(), vec![Duration::from_secs(1); 2]);
    }

    #[test]
    fn exhausted_is_bounded() {
        let sleeper = RecordingSleeper::new();
        let policy = PollPolicy::new(4, BackoffStrategy::Fixed, 1000);
        let mut calls = 0;
        let outcome = wait_until(&policy, &sleeper, || {
            calls += 1;
            Ok(false)
        })
        .unwrap();
        assert_eq!(outcome, WaitOutcome::Exhausted { attempts: 4 });
        assert_eq!(calls, 4);
        // No sleep after the final check.
        assert_eq!(sleeper.sleeps().len(), 3);
    }

    #[test]
    fn check_error_aborts() {
        let sleeper = RecordingSleeper::new();
        let result = wait_until(&PollPolicy::default(), &sleeper, || {
            Err(BootstrapError::ConfigInvalid("boom".into()))
        });
        assert!(result.is_err());
        assert!(sleeper.sleeps().is_empty());
    }
}
