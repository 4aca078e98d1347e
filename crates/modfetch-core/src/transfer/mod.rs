//! Transfer engine: stream the selected file to disk, safely.
//!
//! Split the way retries are easiest to reason about: `policy` decides
//! whether and how long to wait, `classify` maps transport failures and
//! HTTP statuses into policy inputs, `engine` runs the bounded attempt
//! loop with the temp-file/rename discipline from [`crate::storage`].

mod classify;
mod engine;
mod error;
mod policy;

pub use classify::{classify_attempt, classify_request_error, classify_status};
pub use engine::{fetch, TransferResult};
pub use error::{AttemptError, TransferError};
pub use policy::{ErrorKind, RetryDecision, RetryPolicy};
