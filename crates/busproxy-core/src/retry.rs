//! Bounded retry with pluggable sleeping.
//!
//! Provides the loop shared by the retry procedures:
//! - Delay schedule taken from a [`RetrySchedule`]
//! - Customizable retry predicates
//! - Statistics tracking
//!
//! Sleeping goes through a [`Sleeper`] so schedules can be exercised without
//! actually blocking.

use crate::config::RetrySchedule;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, warn};

/// Blocks the calling thread between attempts.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration);
}

/// Sleeps on the current thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Records requested delays instead of sleeping.
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    delays: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every delay requested so far, in order.
    pub fn delays(&self) -> Vec<Duration> {
        self.delays
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Sum of every delay requested so far.
    pub fn total(&self) -> Duration {
        self.delays().iter().sum()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.delays
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(duration);
    }
}

/// Statistics about a retry operation.
#[derive(Debug, Clone, Default)]
pub struct RetryStats {
    /// Number of attempts made.
    pub attempts: u32,
    /// Total delay accumulated.
    pub total_delay: Duration,
    /// Whether the operation ultimately succeeded.
    pub success: bool,
    /// Whether every attempt failed with a retryable error.
    pub exhausted: bool,
    /// Last error message if failed.
    pub last_error: Option<String>,
}

/// Retry a blocking operation on the given schedule.
///
/// No delay follows the final attempt. A schedule of zero attempts still runs
/// the operation once.
///
/// # Arguments
///
/// * `schedule` - Attempt and delay schedule
/// * `sleeper` - Where delays are spent
/// * `operation` - Called with the 0-indexed attempt number
/// * `should_retry` - Predicate to determine if an error is retryable
///
/// # Returns
///
/// A tuple of (Result, RetryStats)
pub fn retry_blocking<T, E>(
    schedule: &RetrySchedule,
    sleeper: &dyn Sleeper,
    mut operation: impl FnMut(u32) -> Result<T, E>,
    should_retry: impl Fn(&E) -> bool,
) -> (Result<T, E>, RetryStats)
where
    E: std::fmt::Display,
{
    let max_attempts = schedule.max_attempts.max(1);
    let mut stats = RetryStats::default();
    let mut attempt = 0;

    loop {
        stats.attempts = attempt + 1;

        let err = match operation(attempt) {
            Ok(value) => {
                stats.success = true;
                if attempt > 0 {
                    debug!("Operation succeeded after {} attempts", attempt + 1);
                }
                return (Ok(value), stats);
            }
            Err(e) => e,
        };
        stats.last_error = Some(err.to_string());

        if !should_retry(&err) {
            debug!("Error is not retryable: {}", err);
            return (Err(err), stats);
        }

        if attempt + 1 >= max_attempts {
            warn!(
                "All {} retry attempts exhausted. Last error: {}",
                max_attempts, err
            );
            stats.exhausted = true;
            return (Err(err), stats);
        }

        let delay = schedule.calculate_delay(attempt);
        stats.total_delay += delay;

        warn!(
            "Attempt {}/{} failed: {}. Retrying in {:?}",
            attempt + 1,
            max_attempts,
            err,
            delay
        );

        sleeper.sleep(delay);
        attempt += 1;
    }
}
