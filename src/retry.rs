use crate::error::{ReleaseError, Result};
use std::thread;
use std::time::Duration;

/// Bounded retry policy for host calls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            attempts: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    pub fn new(attempts: u32, base_delay: Duration) -> Self {
        RetryPolicy {
            attempts: attempts.max(1),
            base_delay,
        }
    }

    /// Backoff before the attempt following `attempt` (1-based), doubling
    /// each time
    fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}

/// Run `call` until it succeeds, it fails permanently, or the attempt budget
/// is exhausted. Only transient host errors are retried; exhaustion converts
/// the last error into [ReleaseError::RetriesExhausted].
pub fn with_retry<T, F>(policy: &RetryPolicy, op: &str, mut call: F) -> Result<T>
where
    F: FnMut() -> Result<T>,
{
    let mut attempt = 1;
    loop {
        match call() {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt < policy.attempts => {
                let delay = policy.delay_after(attempt);
                log::warn!(
                    "{}: transient failure (attempt {}/{}), retrying in {:?}: {}",
                    op,
                    attempt,
                    policy.attempts,
                    delay,
                    err
                );
                thread::sleep(delay);
                attempt += 1;
            }
            Err(err) if err.is_transient() => {
                return Err(ReleaseError::RetriesExhausted {
                    op: op.to_string(),
                    attempts: policy.attempts,
                    message: err.to_string(),
                });
            }
            Err(err) => return Err(err),
        }
    }
}
