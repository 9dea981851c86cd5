//! Bounded retry policy for transport calls.
//!
//! A failed query is retried exactly once, synchronously and without
//! backoff, before the unit of work is abandoned for the cycle. Centralized
//! here so every call site shares the same policy.

use anyhow::{anyhow, Result};
use log::warn;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    attempts: u32,
}

impl RetryPolicy {
    pub fn new(attempts: u32) -> Self {
        RetryPolicy {
            attempts: attempts.max(1),
        }
    }

    /// One initial attempt plus one retry.
    pub fn single_retry() -> Self {
        RetryPolicy::new(2)
    }

    /// Run `op` up to the configured number of attempts, returning the first
    /// success or the last error.
    pub fn run<T, F>(&self, what: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Result<T>,
    {
        let mut last_error = None;
        for attempt in 1..=self.attempts {
            match op() {
                Ok(value) => return Ok(value),
                Err(e) => {
                    warn!(
                        "{} failed (attempt {}/{}): {:#}",
                        what, attempt, self.attempts, e
                    );
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| anyhow!("{} failed", what)))
    }
}
