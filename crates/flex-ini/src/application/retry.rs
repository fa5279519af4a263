//! Bounded retry for transient file errors.
//!
//! Another program (an editor, a backup tool, a second copy of this
//! application) may hold the INI file open for a few milliseconds at the exact
//! moment we want to rewrite it.  Windows reports that as a sharing violation.
//! Waiting briefly and trying again almost always succeeds.
//!
//! The policy is deliberately narrow:
//!
//! - Only [`StoreError::Transient`] is retried.  Permission errors, a full
//!   disk or a missing directory fail on the first attempt.
//! - The budget is fixed per policy (default: 3 retries after the first try,
//!   10 ms apart), never chosen per call.
//! - When the budget runs out the caller receives
//!   [`StoreError::RetriesExhausted`] and decides what "give up" means: reads
//!   fall back to a default, writes report `false`.

use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::StoreError;

/// Retries after the first attempt (4 attempts in total).
pub const DEFAULT_MAX_RETRIES: u32 = 3;
/// Pause between attempts.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(10);

/// How many times to retry a transient failure, and how long to wait between
/// attempts.
///
/// # Examples
///
/// ```rust
/// use std::time::Duration;
/// use flex_ini::application::retry::RetryPolicy;
///
/// let policy = RetryPolicy::default();
/// assert_eq!(policy.total_attempts(), 4);
/// assert_eq!(policy.delay(), Duration::from_millis(10));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    delay: Duration,
}

impl RetryPolicy {
    pub const fn new(max_retries: u32, delay: Duration) -> Self {
        Self { max_retries, delay }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// First attempt plus retries.
    pub fn total_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Runs `op` until it succeeds, fails fatally, or the budget is spent.
    ///
    /// `operation` names the call in log lines and in the
    /// [`StoreError::RetriesExhausted`] error.
    ///
    /// # Errors
    ///
    /// - Any non-transient error from `op`, unchanged, on the attempt it occurs.
    /// - [`StoreError::RetriesExhausted`] wrapping the last transient error
    ///   once every attempt has failed transiently.
    pub fn run<T>(
        &self,
        operation: &'static str,
        mut op: impl FnMut() -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match op() {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(operation, attempt, "succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) if err.is_transient() => {
                    warn!(operation, attempt, error = %err, "transient file error");
                    if attempt >= self.total_attempts() {
                        return Err(StoreError::RetriesExhausted {
                            operation,
                            attempts: attempt,
                            last: Box::new(err),
                        });
                    }
                    debug!(
                        operation,
                        delay_ms = self.delay.as_millis() as u64,
                        "sleeping before retry"
                    );
                    thread::sleep(self.delay);
                }
                Err(err) => return Err(err),
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY)
    }
}
