//! Bounded retry for flaky operations (network clones, post-install verification).
use std::fmt::Display;
use std::thread;
use std::time::Duration;

/// Run `operation` up to `attempts` times, sleeping `delay` between tries.
///
/// At least one attempt is always made. Returns the first success or the
/// last error.
///
/// # Errors
///
/// Returns the error from the final attempt when every attempt fails.
pub fn with_retry<T, E, F>(
    mut operation: F,
    operation_name: &str,
    attempts: u32,
    delay: Duration,
) -> Result<T, E>
where
    E: Display,
    F: FnMut() -> Result<T, E>,
{
    let attempts = attempts.max(1);
    let mut attempt = 1;
    loop {
        match operation() {
            Ok(value) => return Ok(value),
            Err(e) if attempt < attempts => {
                tracing::warn!(
                    "{operation_name} failed (attempt {attempt}/{attempts}), retrying in {}ms: {e}",
                    delay.as_millis()
                );
                thread::sleep(delay);
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
