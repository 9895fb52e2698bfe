use std::time::Duration;

use super::api_error::ErrorKind;

pub const RATE_LIMIT_BASE_DELAY: Duration = Duration::from_secs(60);
pub const GENERAL_API_BASE_DELAY: Duration = Duration::from_secs(20);
pub const UNEXPECTED_BASE_DELAY: Duration = Duration::from_secs(5);

/// Bounded exponential backoff, parameterised by error class.
///
/// Only the base delay differs between classes; the delay before retry `k`
/// (0-indexed) is `base * 2^k`. The scheduler only computes, the caller
/// waits.
#[derive(Clone, Debug, PartialEq)]
pub struct RetryScheduler {
    rate_limit_base: Duration,
    general_base: Duration,
    unexpected_base: Duration,
}

impl Default for RetryScheduler {
    fn default() -> Self {
        Self {
            rate_limit_base: RATE_LIMIT_BASE_DELAY,
            general_base: GENERAL_API_BASE_DELAY,
            unexpected_base: UNEXPECTED_BASE_DELAY,
        }
    }
}

impl RetryScheduler {
    pub fn with_base_delays(rate_limit: Duration, general: Duration, unexpected: Duration) -> Self {
        Self {
            rate_limit_base: rate_limit,
            general_base: general,
            unexpected_base: unexpected,
        }
    }

    /// Authentication has no base delay: it is never waited out.
    pub fn base_delay(&self, kind: ErrorKind) -> Duration {
        match kind {
            ErrorKind::RateLimit => self.rate_limit_base,
            ErrorKind::GeneralApi => self.general_base,
            ErrorKind::Unexpected => self.unexpected_base,
            ErrorKind::Authentication => Duration::ZERO,
        }
    }

    pub fn next_delay(&self, kind: ErrorKind, attempt: u32) -> Duration {
        1u32.checked_shl(attempt)
            .and_then(|factor| self.base_delay(kind).checked_mul(factor))
            .unwrap_or(Duration::MAX)
    }

    /// `attempt` is 1-indexed: the number of attempts already made.
    pub fn should_retry(attempt: u32, max_attempts: u32) -> bool {
        attempt < max_attempts
    }
}

/// Attempt counter for one unit of work. Dropped once the unit succeeds,
/// fails fatally, or runs out of attempts.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RetryState {
    attempts: u32,
    last_error: Option<ErrorKind>,
}

impl RetryState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_attempt(&mut self) {
        self.attempts += 1;
    }

    pub fn record_failure(&mut self, kind: ErrorKind) {
        self.last_error = Some(kind);
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Delay to wait before the next attempt, or `None` when the error is
    /// final or the attempt ceiling is reached.
    pub fn next_wait(&self, scheduler: &RetryScheduler, max_attempts: u32) -> Option<Duration> {
        let kind = self.last_error?;
        if !kind.is_retryable() || !RetryScheduler::should_retry(self.attempts, max_attempts) {
            return None;
        }
        Some(scheduler.next_delay(kind, self.attempts.saturating_sub(1)))
    }
}
