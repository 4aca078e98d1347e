//! Batch mode: many URLs, bounded worker pool, independent pipelines.
//!
//! Workers each own one URL's pipeline end to end. A terminal failure is
//! tallied and the batch continues; siblings are never aborted. When the
//! shutdown flag is raised no new pipelines start, but in-flight ones run
//! to their atomic completion.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::task::JoinSet;

use crate::pipeline::{Pipeline, PipelineError, PipelineOutcome};

/// Comment marker for batch files.
const COMMENT_MARKER: char = '#';

/// Read a batch file: one URL per line, blank lines and `#` comments
/// ignored.
pub fn load_batch_urls(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("read batch file: {}", path.display()))?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with(COMMENT_MARKER))
        .map(String::from)
        .collect())
}

/// What happened across one batch run.
#[derive(Debug, Default)]
pub struct BatchSummary {
    pub succeeded: usize,
    pub skipped: usize,
    /// URLs that never started because shutdown was requested.
    pub aborted: usize,
    pub failures: Vec<(String, PipelineError)>,
}

impl BatchSummary {
    pub fn total(&self) -> usize {
        self.succeeded + self.skipped + self.aborted + self.failures.len()
    }

    /// True iff no URL failed terminally (skips and aborts are not failures).
    pub fn all_ok(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Run pipelines for `urls` with up to `max_workers` in flight at once.
pub async fn run_batch(
    pipeline: Arc<Pipeline>,
    urls: Vec<String>,
    max_workers: usize,
    shutdown: Arc<AtomicBool>,
) -> BatchSummary {
    let max_workers = max_workers.max(1);
    let mut queue = urls.into_iter();
    let mut join_set: JoinSet<(String, Result<PipelineOutcome, PipelineError>)> = JoinSet::new();
    let mut summary = BatchSummary::default();

    loop {
        while join_set.len() < max_workers && !shutdown.load(Ordering::SeqCst) {
            let Some(url) = queue.next() else { break };
            let pipeline = Arc::clone(&pipeline);
            join_set.spawn(async move {
                let result = pipeline.run_url(&url).await;
                (url, result)
            });
        }

        if join_set.is_empty() {
            break;
        }
        let Some(joined) = join_set.join_next().await else {
            break;
        };
        match joined {
            Ok((url, Ok(outcome))) => match outcome {
                PipelineOutcome::Skipped { mod_id, .. } => {
                    tracing::info!(url, mod_id, "up to date");
                    summary.skipped += 1;
                }
                PipelineOutcome::Downloaded {
                    mod_id,
                    bytes_written,
                    attempts,
                    ..
                } => {
                    tracing::info!(url, mod_id, bytes_written, attempts, "downloaded");
                    summary.succeeded += 1;
                }
            },
            Ok((url, Err(err))) => {
                tracing::error!(
                    url,
                    class = ?err.class(),
                    error = %err,
                    "pipeline failed; continuing with remaining URLs"
                );
                summary.failures.push((url, err));
            }
            Err(join_err) => {
                tracing::error!(error = %join_err, "pipeline task panicked");
                summary
                    .failures
                    .push((String::new(), PipelineError::TaskJoin(join_err)));
            }
        }
    }

    summary.aborted = queue.count();
    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_file_skips_blanks_and_comments() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mods.txt");
        std::fs::write(
            &path,
            "# my mods\n\
             https://mod.io/g/a/m/one\n\
             \n\
             \t  \n\
             # another comment\n\
             https://mod.io/g/a/m/two  \n",
        )
        .unwrap();
        let urls = load_batch_urls(&path).unwrap();
        assert_eq!(
            urls,
            vec![
                "https://mod.io/g/a/m/one".to_string(),
                "https://mod.io/g/a/m/two".to_string(),
            ]
        );
    }

    #[test]
    fn missing_batch_file_is_an_error() {
        assert!(load_batch_urls(Path::new("/definitely/not/here.txt")).is_err());
    }

    #[tokio::test]
    async fn raised_shutdown_flag_starts_no_pipelines() {
        let dir = tempfile::tempdir().unwrap();
        // Port 1 refuses connections, so any pipeline that actually ran
        // would show up as a failure.
        let pipeline = Arc::new(
            Pipeline::new(crate::pipeline::PipelineOptions {
                api: crate::api::ApiClient::with_base("key", "http://127.0.0.1:1").unwrap(),
                download_dir: dir.path().join("downloads"),
                ledger: Arc::new(crate::ledger::CacheLedger::in_memory()),
                retry: crate::transfer::RetryPolicy::default(),
                install_dir: None,
                force: false,
                write_sidecar: false,
            })
            .unwrap(),
        );
        let urls = vec![
            "https://mod.io/g/a/m/one".to_string(),
            "https://mod.io/g/a/m/two".to_string(),
        ];
        let shutdown = Arc::new(AtomicBool::new(true));

        let summary = run_batch(pipeline, urls, 4, shutdown).await;
        assert_eq!(summary.aborted, 2);
        assert_eq!(summary.total(), 2);
        assert_eq!(summary.succeeded, 0);
        assert_eq!(summary.skipped, 0);
        assert!(summary.failures.is_empty());
    }

    #[test]
    fn summary_counts_and_all_ok() {
        let mut s = BatchSummary::default();
        s.succeeded = 2;
        s.skipped = 1;
        assert_eq!(s.total(), 3);
        assert!(s.all_ok());

        s.failures.push((
            "u".into(),
            PipelineError::Selection(crate::select::SelectionError::NoFiles),
        ));
        assert_eq!(s.total(), 4);
        assert!(!s.all_ok());
    }
}
