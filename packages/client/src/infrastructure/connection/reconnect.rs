//! Pure retry decisions for the connection loop.

use crate::infrastructure::transport::TransportError;

/// Whether a failed connect must not be retried at all.
pub fn should_exit_immediately(error: &TransportError) -> bool {
    matches!(
        error,
        TransportError::Unauthorized | TransportError::InvalidUrl(_)
    )
}

/// Whether another attempt is allowed after `failures` consecutive failures.
///
/// `failures` counts the attempt that just failed, so with `max_attempts = 3`
/// the loop tries at most three times in a row.
pub fn should_attempt_reconnect(error: &TransportError, failures: u32, max_attempts: u32) -> bool {
    if should_exit_immediately(error) {
        return false;
    }

    failures < max_attempts
}
