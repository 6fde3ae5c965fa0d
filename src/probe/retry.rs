//! Fixed-delay retry policy
//!
//! A check cycle makes up to `max_attempts` attempts and stops at the first
//! success. Between two attempts the current task sleeps for a fixed delay.
//! The sleep is a tokio timer, so it only suspends the check that is retrying;
//! other checks on the same runtime keep running. No delay follows the last attempt.

use std::future::Future;
use std::time::Duration;

use tracing::trace;

/// Delay used when the configuration does not override it
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(DEFAULT_RETRY_DELAY)
    }
}

impl RetryPolicy {
    pub fn fixed(delay: Duration) -> Self {
        Self { delay }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Run `attempt` until `succeeded` returns true or `max_attempts` is reached
    ///
    /// `attempt` receives the 1-based attempt number. Returns the last attempt's
    /// value together with the number of attempts made. A `max_attempts` of 0 is
    /// treated as 1.
    pub async fn run<T, F, Fut, S>(&self, max_attempts: u32, mut attempt: F, succeeded: S) -> (T, u32)
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = T>,
        S: Fn(&T) -> bool,
    {
        let max_attempts = max_attempts.max(1);
        let mut number = 1;

        loop {
            let result = attempt(number).await;

            if succeeded(&result) || number >= max_attempts {
                return (result, number);
            }

            trace!(
                "attempt {number}/{max_attempts} failed, retrying in {:?}",
                self.delay
            );
            tokio::time::sleep(self.delay).await;
            number += 1;
        }
    }
}
