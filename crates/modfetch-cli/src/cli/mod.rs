//! CLI surface for the modfetch downloader.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;

use modfetch_core::api::ApiClient;
use modfetch_core::batch::{self, BatchSummary};
use modfetch_core::config;
use modfetch_core::ledger::CacheLedger;
use modfetch_core::pipeline::{Pipeline, PipelineOptions};
use modfetch_core::transfer::RetryPolicy;

/// Environment variable consulted when `--api-key` is absent.
const API_KEY_ENV: &str = "MODFETCH_API_KEY";

/// Ledger filename inside the download directory.
const LEDGER_NAME: &str = "mod_cache.json";

#[derive(Debug, Parser)]
#[command(name = "modfetch")]
#[command(about = "Download mod.io mods from pasted URLs", long_about = None)]
pub struct Cli {
    /// mod.io mod URL (https://mod.io/g/<game>/m/<mod>).
    #[arg(value_name = "URL", conflicts_with = "batch")]
    pub url: Option<String>,

    /// Batch file with one URL per line; blank lines and '#' comments are ignored.
    #[arg(long, value_name = "FILE")]
    pub batch: Option<PathBuf>,

    /// Install each downloaded archive into this directory (must already exist).
    #[arg(long, value_name = "DIR")]
    pub install: Option<PathBuf>,

    /// Leave the on-disk cache ledger and metadata log untouched.
    #[arg(long)]
    pub no_persist: bool,

    /// Re-download (and re-install) even when the cache says the file is current.
    #[arg(long)]
    pub force: bool,

    /// Concurrent pipelines in batch mode (defaults to the config value).
    #[arg(long, value_name = "N")]
    pub jobs: Option<usize>,

    /// mod.io API key; overrides MODFETCH_API_KEY and the config file.
    #[arg(long, value_name = "KEY")]
    pub api_key: Option<String>,
}

pub async fn run_from_args() -> Result<bool> {
    run(Cli::parse()).await
}

/// Run the CLI; `Ok(true)` means every URL succeeded terminally.
pub async fn run(cli: Cli) -> Result<bool> {
    let cfg = config::load_or_init()?;
    tracing::debug!("loaded config: {:?}", cfg);

    let api_key = cli
        .api_key
        .or_else(|| std::env::var(API_KEY_ENV).ok().filter(|s| !s.is_empty()))
        .or_else(|| cfg.api_key.clone())
        .with_context(|| {
            format!("no API key; pass --api-key, set {API_KEY_ENV}, or add api_key to the config file")
        })?;

    let urls = match (&cli.url, &cli.batch) {
        (Some(url), None) => vec![url.clone()],
        (None, Some(path)) => {
            let urls = batch::load_batch_urls(path)?;
            if urls.is_empty() {
                bail!("batch file contains no URLs: {}", path.display());
            }
            urls
        }
        (None, None) => bail!("nothing to do; pass a URL or --batch <FILE>"),
        (Some(_), Some(_)) => unreachable!("clap rejects url together with --batch"),
    };

    let download_dir = cfg.download_dir()?;
    let ledger = if cli.no_persist {
        Arc::new(CacheLedger::in_memory())
    } else {
        Arc::new(CacheLedger::load(download_dir.join(LEDGER_NAME)))
    };
    let retry = cfg
        .retry
        .as_ref()
        .map(RetryPolicy::from_config)
        .unwrap_or_default();

    let pipeline = Pipeline::new(PipelineOptions {
        api: ApiClient::new(api_key)?,
        download_dir,
        ledger,
        retry,
        install_dir: cli.install.clone(),
        force: cli.force,
        write_sidecar: !cli.no_persist,
    })?;

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = Arc::clone(&shutdown);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("interrupt received; letting in-flight downloads finish");
                shutdown.store(true, Ordering::SeqCst);
            }
        });
    }

    let jobs = cli.jobs.unwrap_or(cfg.jobs);
    let summary = batch::run_batch(Arc::new(pipeline), urls, jobs, shutdown).await;
    report(&summary);
    Ok(summary.all_ok())
}

fn report(summary: &BatchSummary) {
    for (url, err) in &summary.failures {
        eprintln!("failed: {url}: {err:#} ({})", err.class().explanation());
    }
    println!(
        "{} downloaded, {} already up to date, {} failed{}",
        summary.succeeded,
        summary.skipped,
        summary.failures.len(),
        if summary.aborted > 0 {
            format!(", {} not started (interrupted)", summary.aborted)
        } else {
            String::new()
        }
    );
}
