//! API-boundary error type.

use std::time::Duration;
use thiserror::Error;

/// Error from a single mod.io API call.
///
/// `Status` carries the HTTP code so callers can distinguish the
/// access-restriction cases (401/403/404 look identical to "does not exist"
/// with a plain API key) from server faults.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("network error talking to mod.io: {0}")]
    Network(#[from] reqwest::Error),

    #[error("mod.io returned HTTP {status} while {context}")]
    Status { status: u16, context: &'static str },

    #[error("rate limited by mod.io (HTTP 429) while {context}")]
    RateLimited {
        context: &'static str,
        /// Server-provided retry hint, if any.
        retry_after: Option<Duration>,
    },

    #[error("unexpected response shape from mod.io while {context}")]
    Decode {
        context: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

impl ApiError {
    /// HTTP status carried by this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            ApiError::RateLimited { .. } => Some(429),
            ApiError::Network(e) => e.status().map(|s| s.as_u16()),
            ApiError::Decode { .. } => None,
        }
    }

    /// True for the statuses that mean "inaccessible with this credential":
    /// private, unlisted, OAuth-only, or genuinely absent content.
    pub fn is_not_found_or_restricted(&self) -> bool {
        matches!(self.status(), Some(401) | Some(403) | Some(404))
    }
}
