//! Attempt and transfer error types.

use std::time::Duration;
use thiserror::Error;

/// Failure of a single download attempt. Classified by
/// [`super::classify_attempt`] before the policy decides on a retry.
#[derive(Debug, Error)]
pub enum AttemptError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("HTTP {status}")]
    Status {
        status: u16,
        /// Retry-After hint captured from a 429 response.
        retry_after: Option<Duration>,
    },

    /// Transfer completed but the byte count disagrees with the size the
    /// API reported. Retried instead of silently keeping a short file.
    #[error("partial transfer: expected {expected} bytes, got {received}")]
    Partial { expected: u64, received: u64 },
}

/// Terminal outcome of the transfer engine.
#[derive(Debug, Error)]
pub enum TransferError {
    /// Non-retryable status (4xx other than 429); surfaced immediately.
    #[error("download rejected with HTTP {status}")]
    Rejected { status: u16 },

    /// Bounded retries exhausted; the last underlying cause is attached.
    #[error("download failed after {attempts} attempt(s)")]
    Unrecoverable {
        attempts: u32,
        #[source]
        source: AttemptError,
    },

    /// Local disk fault (not retried).
    #[error("storage error while writing download")]
    Storage(#[from] std::io::Error),
}
