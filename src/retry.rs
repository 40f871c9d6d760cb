use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crate::logger::{sanitize_log_value, Logger};

const SLEEP_SLICE: Duration = Duration::from_millis(100);

/// Bounded exponential backoff for control-endpoint queries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct RetryPolicy {
    pub(crate) max_attempts: u32,
    pub(crate) initial_delay: Duration,
    pub(crate) max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Delay after the `failed_attempt`-th failure (1-based).
    pub(crate) fn delay_after(&self, failed_attempt: u32) -> Duration {
        let exponent = failed_attempt.saturating_sub(1).min(31);
        self.initial_delay
            .checked_mul(1u32 << exponent)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum RetryError {
    Exhausted { attempts: u32, last_error: String },
    Interrupted,
}

impl fmt::Display for RetryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exhausted {
                attempts,
                last_error,
            } => write!(f, "failed after {} attempt(s): {}", attempts, last_error),
            Self::Interrupted => f.write_str("interrupted"),
        }
    }
}

fn interruptible_sleep(duration: Duration, interrupt: &AtomicBool) -> bool {
    let deadline = Instant::now() + duration;
    loop {
        if interrupt.load(Ordering::SeqCst) {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        thread::sleep((deadline - now).min(SLEEP_SLICE));
    }
}

pub(crate) fn retry<T, F>(
    policy: &RetryPolicy,
    label: &str,
    logger: &Logger,
    interrupt: &AtomicBool,
    mut op: F,
) -> Result<T, RetryError>
where
    F: FnMut() -> Result<T, String>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        if interrupt.load(Ordering::SeqCst) {
            return Err(RetryError::Interrupted);
        }
        attempt += 1;
        let err = match op() {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };
        if attempt >= max_attempts {
            logger.log_transition(&format!(
                "retry_exhausted label={} attempts={} err={}",
                label,
                attempt,
                sanitize_log_value(&err)
            ));
            return Err(RetryError::Exhausted {
                attempts: attempt,
                last_error: err,
            });
        }
        let delay = policy.delay_after(attempt);
        logger.log_transition(&format!(
            "retry label={} attempt={} delay_ms={} err={}",
            label,
            attempt,
            delay.as_millis(),
            sanitize_log_value(&err)
        ));
        if !interruptible_sleep(delay, interrupt) {
            return Err(RetryError::Interrupted);
        }
    }
}
