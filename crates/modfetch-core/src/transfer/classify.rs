//! Map transport failures and HTTP statuses into retry policy inputs.

use std::time::Duration;

use super::error::AttemptError;
use super::policy::ErrorKind;

/// Classify an HTTP status for retry decisions.
pub fn classify_status(status: u16, retry_after: Option<Duration>) -> ErrorKind {
    match status {
        429 => ErrorKind::RateLimited { retry_after },
        500..=599 => ErrorKind::Http5xx(status),
        _ => ErrorKind::Fatal,
    }
}

/// Classify a reqwest transport error for retry decisions.
pub fn classify_request_error(e: &reqwest::Error) -> ErrorKind {
    if e.is_timeout() {
        return ErrorKind::Timeout;
    }
    if e.is_builder() || e.is_redirect() {
        return ErrorKind::Fatal;
    }
    // Connect failures, resets, and truncated bodies all read as
    // connection-level trouble worth retrying.
    ErrorKind::Connection
}

/// Classify a failed attempt into an [`ErrorKind`].
pub fn classify_attempt(e: &AttemptError) -> ErrorKind {
    match e {
        AttemptError::Network(err) => classify_request_error(err),
        AttemptError::Status { status, retry_after } => classify_status(*status, *retry_after),
        AttemptError::Partial { .. } => ErrorKind::Connection,
    }
}
