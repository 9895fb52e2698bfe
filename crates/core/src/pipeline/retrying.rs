use std::time::Duration;

use crate::transcription::domain::api_error::ApiError;
use crate::transcription::domain::retry_scheduler::{RetryScheduler, RetryState};

/// Blocking wait, injectable so tests can record delays instead of sleeping.
pub type Sleeper = Box<dyn Fn(Duration) + Send>;

pub fn thread_sleeper() -> Sleeper {
    Box::new(std::thread::sleep)
}

/// Runs `op` until it succeeds, fails with a non-retryable error, or has
/// been attempted `max_attempts` times. Returns the final result and the
/// number of attempts made.
pub fn with_retry<T>(
    scheduler: &RetryScheduler,
    max_attempts: u32,
    sleep: &dyn Fn(Duration),
    label: &str,
    mut op: impl FnMut() -> Result<T, ApiError>,
) -> (Result<T, ApiError>, u32) {
    let mut state = RetryState::new();
    loop {
        state.record_attempt();
        match op() {
            Ok(value) => return (Ok(value), state.attempts()),
            Err(e) => {
                state.record_failure(e.kind);
                match state.next_wait(scheduler, max_attempts) {
                    Some(delay) => {
                        log::warn!(
                            "{label}: {e} (attempt {}/{max_attempts}), retrying in {:.1}s",
                            state.attempts(),
                            delay.as_secs_f64()
                        );
                        sleep(delay);
                    }
                    None => {
                        if e.is_retryable() {
                            log::error!("{label}: giving up after {} attempts: {e}", state.attempts());
                        }
                        return (Err(e), state.attempts());
                    }
                }
            }
        }
    }
}
