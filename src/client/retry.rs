use std::{thread, time::Duration};

use log::warn;

use crate::error::{Error, Result};

/// Bounded-attempt, fixed-delay retry around a single round trip.
///
/// Every failure is retried, remote execution failures included. A non-idempotent statement
/// whose acknowledgement was lost may therefore run twice on the server.
///
/// Protocol errors are retried as well, even though a malformed frame is otherwise fatal to
/// the call. Each retry logs at `warn`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    retry_interval: Duration,
}

impl RetryPolicy {
    pub const DEFAULT_MAX_RETRIES: u32 = 3;
    pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(30_000);

    /// `max_retries` counts total attempts and must be at least 1.
    pub fn new(max_retries: u32, retry_interval: Duration) -> Result<Self> {
        if max_retries == 0 {
            return Err(Error::usage("max retries must be at least 1"));
        }
        Ok(Self {
            max_retries,
            retry_interval,
        })
    }

    /// A single attempt, no retry.
    pub fn once() -> Self {
        Self {
            max_retries: 1,
            retry_interval: Duration::ZERO,
        }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn retry_interval(&self) -> Duration {
        self.retry_interval
    }

    /// Runs `op`, blocking the calling thread between attempts.
    pub fn run<T>(&self, op: impl FnMut() -> Result<T>) -> Result<T> {
        self.run_with(op, thread::sleep)
    }

    /// Like [`RetryPolicy::run`] with a caller-supplied sleep.
    pub fn run_with<T>(
        &self,
        mut op: impl FnMut() -> Result<T>,
        mut sleep: impl FnMut(Duration),
    ) -> Result<T> {
        let mut attempts = 0;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(e) => {
                    attempts += 1;
                    if attempts >= self.max_retries {
                        return Err(e);
                    }
                    warn!(
                        "attempt {attempts}/{} failed: {e}; retrying in {:?}",
                        self.max_retries, self.retry_interval
                    );
                    sleep(self.retry_interval);
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: Self::DEFAULT_MAX_RETRIES,
            retry_interval: Self::DEFAULT_INTERVAL,
        }
    }
}
