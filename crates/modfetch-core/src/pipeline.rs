//! One-URL pipeline: resolve → select → skip-check → transfer → install.
//!
//! Each stage fails with its own structured error; the umbrella
//! [`PipelineError`] classifies them for user-facing reporting so "the mod
//! is private" reads differently from "the network is flaky" and from "my
//! disk is full". One URL's failure never corrupts state for another.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;

use crate::api::{ApiClient, ApiError};
use crate::install::{self, InstallError, InstallReport};
use crate::ledger::{CacheEntry, CacheLedger, ClaimOutcome};
use crate::resolver::{parse_mod_url, ModIdentity, ResolutionError, Resolver};
use crate::select::{self, FileRecord, SelectionError};
use crate::sidecar::{self, DownloadRecord};
use crate::transfer::{self, RetryPolicy, TransferError};

/// Coarse failure class for user-visible messaging and exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// The input URL itself is unusable.
    BadInput,
    /// The remote content does not exist or is not accessible with this
    /// API key (private, unlisted, OAuth-only).
    RemoteInaccessible,
    /// Network trouble; retry-eligible, retries were already spent.
    Network,
    /// Local fault: cache, disk, or filesystem.
    LocalFault,
}

impl FailureClass {
    pub fn explanation(self) -> &'static str {
        match self {
            FailureClass::BadInput => "the URL could not be understood",
            FailureClass::RemoteInaccessible => {
                "the remote content is missing, private, or requires credentials this API key does not have"
            }
            FailureClass::Network => "a network failure persisted after retries",
            FailureClass::LocalFault => "a local file or disk operation failed",
        }
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    Selection(#[from] SelectionError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Transfer(#[from] TransferError),

    #[error(transparent)]
    Install(#[from] InstallError),

    #[error("background task failed")]
    TaskJoin(#[from] tokio::task::JoinError),
}

impl PipelineError {
    pub fn class(&self) -> FailureClass {
        match self {
            PipelineError::Resolution(ResolutionError::InvalidUrl(_)) => FailureClass::BadInput,
            PipelineError::Resolution(ResolutionError::GameNotFound { .. })
            | PipelineError::Resolution(ResolutionError::ModNotFound { .. }) => {
                FailureClass::RemoteInaccessible
            }
            PipelineError::Resolution(ResolutionError::Api(e)) | PipelineError::Api(e) => {
                if e.is_not_found_or_restricted() {
                    FailureClass::RemoteInaccessible
                } else {
                    FailureClass::Network
                }
            }
            PipelineError::Selection(_) => FailureClass::RemoteInaccessible,
            PipelineError::Transfer(TransferError::Rejected { .. }) => {
                FailureClass::RemoteInaccessible
            }
            PipelineError::Transfer(TransferError::Unrecoverable { .. }) => FailureClass::Network,
            PipelineError::Transfer(TransferError::Storage(_)) => FailureClass::LocalFault,
            PipelineError::Install(_) => FailureClass::LocalFault,
            PipelineError::TaskJoin(_) => FailureClass::LocalFault,
        }
    }
}

/// Why a pipeline run ended without a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The ledger already records this exact file for this mod.
    UpToDate,
    /// Another worker in this batch owns the same mod right now.
    InFlightElsewhere,
}

#[derive(Debug)]
pub enum PipelineOutcome {
    Skipped {
        mod_id: u64,
        reason: SkipReason,
    },
    Downloaded {
        mod_id: u64,
        local_path: PathBuf,
        bytes_written: u64,
        attempts: u32,
        installed: Option<InstallReport>,
    },
}

pub struct PipelineOptions {
    pub api: ApiClient,
    pub download_dir: PathBuf,
    pub ledger: Arc<CacheLedger>,
    pub retry: RetryPolicy,
    /// When set, each successful download is also installed here.
    pub install_dir: Option<PathBuf>,
    /// Re-download even when the ledger says the file is current.
    pub force: bool,
    /// Write the metadata sidecar after each success (off for --no-persist).
    pub write_sidecar: bool,
}

/// Filename of the append-only metadata log in the download dir.
const SIDECAR_NAME: &str = "modinfo.jsonl";

pub struct Pipeline {
    api: ApiClient,
    resolver: Resolver,
    ledger: Arc<CacheLedger>,
    retry: RetryPolicy,
    download_dir: PathBuf,
    sidecar_path: Option<PathBuf>,
    install_dir: Option<PathBuf>,
    force: bool,
}

impl Pipeline {
    /// Build a pipeline, creating the download directory if needed. The
    /// user-chosen install directory is deliberately never created.
    pub fn new(opts: PipelineOptions) -> anyhow::Result<Self> {
        std::fs::create_dir_all(&opts.download_dir)?;
        let sidecar_path = opts
            .write_sidecar
            .then(|| opts.download_dir.join(SIDECAR_NAME));
        Ok(Self {
            resolver: Resolver::new(opts.api.clone()),
            api: opts.api,
            ledger: opts.ledger,
            retry: opts.retry,
            download_dir: opts.download_dir,
            sidecar_path,
            install_dir: opts.install_dir,
            force: opts.force,
        })
    }

    /// Run the full pipeline for one pasted URL.
    pub async fn run_url(&self, url: &str) -> Result<PipelineOutcome, PipelineError> {
        let reference = parse_mod_url(url)?;
        let identity = self.resolver.resolve(&reference).await?;
        tracing::info!(
            game_id = identity.game_id,
            mod_id = identity.id,
            mod_name = identity.name.as_deref().unwrap_or(&identity.slug),
            "resolved mod"
        );

        let chosen = self.select_file(&identity).await?;
        tracing::info!(
            mod_id = identity.id,
            file_id = chosen.file_id,
            filename = %chosen.filename,
            "selected latest file"
        );

        let claim = match self.ledger.begin(identity.id, chosen.file_id, self.force) {
            ClaimOutcome::UpToDate => {
                tracing::info!(mod_id = identity.id, "already latest version; skipping download");
                return Ok(PipelineOutcome::Skipped {
                    mod_id: identity.id,
                    reason: SkipReason::UpToDate,
                });
            }
            ClaimOutcome::InFlight => {
                tracing::info!(mod_id = identity.id, "another worker owns this mod; skipping");
                return Ok(PipelineOutcome::Skipped {
                    mod_id: identity.id,
                    reason: SkipReason::InFlightElsewhere,
                });
            }
            ClaimOutcome::Claimed(claim) => claim,
        };

        // An early return from here on drops the claim and releases the
        // in-flight guard; the ledger entry is only written on success.
        let result = transfer::fetch(self.api.http(), &chosen, &self.download_dir, &self.retry).await?;

        let downloaded_at = Utc::now();
        if let Err(e) = claim.complete(CacheEntry {
            file_id: chosen.file_id,
            downloaded_at,
            filename: Some(chosen.filename.clone()),
            version: chosen.version.clone(),
        }) {
            tracing::warn!(error = %e, "download succeeded but the cache ledger was not persisted");
        }

        if let Some(sidecar_path) = &self.sidecar_path {
            let record = DownloadRecord {
                mod_id: identity.id,
                file_id: chosen.file_id,
                filename: chosen.filename.clone(),
                downloaded_at,
            };
            if let Err(e) = sidecar::append(sidecar_path, &record) {
                tracing::warn!(error = %e, "could not append to metadata log");
            }
        }

        let installed = match &self.install_dir {
            Some(dir) => Some(self.install_archive(result.local_path.clone(), dir.clone()).await?),
            None => None,
        };

        Ok(PipelineOutcome::Downloaded {
            mod_id: identity.id,
            local_path: result.local_path,
            bytes_written: result.bytes_written,
            attempts: result.attempts,
            installed,
        })
    }

    async fn select_file(&self, identity: &ModIdentity) -> Result<FileRecord, PipelineError> {
        let files = self.api.mod_files(identity.game_id, identity.id).await?;
        let records = select::map_records(&files);
        Ok(select::select_latest(&records)?.clone())
    }

    async fn install_archive(
        &self,
        archive: PathBuf,
        dest: PathBuf,
    ) -> Result<InstallReport, PipelineError> {
        let report = tokio::task::spawn_blocking(move || install::install(&archive, &dest)).await??;
        Ok(report)
    }
}
