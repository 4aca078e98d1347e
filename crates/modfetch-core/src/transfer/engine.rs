//! Bounded-retry streaming download with atomic finalize.

use std::path::{Path, PathBuf};

use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;

use crate::api::parse_retry_after;
use crate::select::FileRecord;
use crate::storage;

use super::classify::classify_attempt;
use super::error::{AttemptError, TransferError};
use super::policy::{ErrorKind, RetryDecision, RetryPolicy};

/// Outcome of a completed transfer. Success is witnessed by `Ok`; the
/// attempt count includes the successful one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferResult {
    pub local_path: PathBuf,
    pub bytes_written: u64,
    pub attempts: u32,
}

enum AttemptOutcome {
    Done(u64),
    Failed(AttemptError),
}

/// Stream `record` into `dest_dir/<filename>`, retrying per `policy`.
///
/// Bytes go to a `.part` temp path; the final path only ever receives a
/// complete, length-verified file via rename. On terminal failure the temp
/// file is removed and the destination is left untouched.
pub async fn fetch(
    http: &reqwest::Client,
    record: &FileRecord,
    dest_dir: &Path,
    policy: &RetryPolicy,
) -> Result<TransferResult, TransferError> {
    let final_path = dest_dir.join(&record.filename);
    let temp = storage::temp_path(&final_path);

    let mut attempt = 1u32;
    loop {
        tracing::debug!(url = %record.download_url, attempt, "download attempt");
        let failure = match attempt_once(http, &record.download_url, &temp, record.size).await {
            Ok(AttemptOutcome::Done(bytes)) => {
                storage::finalize(&temp, &final_path).await?;
                tracing::info!(
                    path = %final_path.display(),
                    bytes,
                    attempts = attempt,
                    "download complete"
                );
                return Ok(TransferResult {
                    local_path: final_path,
                    bytes_written: bytes,
                    attempts: attempt,
                });
            }
            Ok(AttemptOutcome::Failed(e)) => e,
            Err(io) => {
                storage::discard(&temp).await;
                return Err(TransferError::Storage(io));
            }
        };

        let kind = classify_attempt(&failure);
        if kind == ErrorKind::Fatal {
            if let AttemptError::Status { status, .. } = failure {
                storage::discard(&temp).await;
                return Err(TransferError::Rejected { status });
            }
        }
        match policy.decide(attempt, kind) {
            RetryDecision::NoRetry => {
                storage::discard(&temp).await;
                return Err(TransferError::Unrecoverable {
                    attempts: attempt,
                    source: failure,
                });
            }
            RetryDecision::RetryAfter(delay) => {
                tracing::warn!(
                    error = %failure,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "transient download failure; backing off"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

/// One GET attempt. Transport and protocol failures come back as
/// `Failed` (candidates for retry); local disk errors propagate as
/// `io::Error` and are terminal.
async fn attempt_once(
    http: &reqwest::Client,
    url: &str,
    temp: &Path,
    expected: Option<u64>,
) -> std::io::Result<AttemptOutcome> {
    let resp = match http.get(url).send().await {
        Ok(r) => r,
        Err(e) => return Ok(AttemptOutcome::Failed(e.into())),
    };
    let status = resp.status();
    if !status.is_success() {
        let retry_after = if status.as_u16() == 429 {
            parse_retry_after(resp.headers())
        } else {
            None
        };
        return Ok(AttemptOutcome::Failed(AttemptError::Status {
            status: status.as_u16(),
            retry_after,
        }));
    }

    let mut out = tokio::fs::File::create(temp).await?;
    let mut stream = resp.bytes_stream();
    let mut written = 0u64;
    while let Some(chunk) = stream.next().await {
        let chunk = match chunk {
            Ok(c) => c,
            Err(e) => return Ok(AttemptOutcome::Failed(e.into())),
        };
        out.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    out.flush().await?;
    // Durability before the rename makes the final path trustworthy.
    out.sync_all().await?;
    drop(out);

    if let Some(expected) = expected {
        if written != expected {
            return Ok(AttemptOutcome::Failed(AttemptError::Partial {
                expected,
                received: written,
            }));
        }
    }
    Ok(AttemptOutcome::Done(written))
}
