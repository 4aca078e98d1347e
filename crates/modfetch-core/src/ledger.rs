//! Persisted cache ledger: which file version was last downloaded per mod.
//!
//! One JSON document (`mod_cache.json` in the download dir), read fully at
//! startup and rewritten after each successful transfer. An absent or
//! malformed file is treated as empty, with a warning, never a crash.
//!
//! The read-check-then-write for a mod identity must be atomic across
//! batch workers: `begin` takes a claim under one lock, so two workers
//! processing duplicate URLs cannot both pass the skip-check.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One ledger entry per mod ever downloaded; overwritten on re-download.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CacheEntry {
    pub file_id: u64,
    pub downloaded_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// On-disk shape: `{ "mods": { "<mod_id>": entry } }`. String keys keep the
/// document plain JSON; BTreeMap keeps rewrites stable.
#[derive(Debug, Default, Serialize, Deserialize)]
struct PersistedLedger {
    #[serde(default)]
    mods: BTreeMap<String, CacheEntry>,
}

#[derive(Debug, Default)]
struct Inner {
    mods: HashMap<u64, CacheEntry>,
    /// Mods a worker is currently downloading. Guards the gap between the
    /// skip-check and the post-transfer record.
    in_flight: HashSet<u64>,
}

/// Outcome of the atomic skip-check.
#[derive(Debug)]
pub enum ClaimOutcome {
    /// The exact candidate file was already fetched; nothing to do.
    UpToDate,
    /// Another worker in this run is already fetching this mod.
    InFlight,
    /// Proceed with the transfer; record through the claim when done.
    Claimed(LedgerClaim),
}

pub struct CacheLedger {
    path: Option<PathBuf>,
    inner: Mutex<Inner>,
}

impl CacheLedger {
    /// Load the ledger at `path`, tolerating absence and corruption.
    pub fn load(path: PathBuf) -> Self {
        let mods = match std::fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice::<PersistedLedger>(&bytes) {
                Ok(persisted) => persisted
                    .mods
                    .into_iter()
                    .filter_map(|(k, v)| k.parse::<u64>().ok().map(|id| (id, v)))
                    .collect(),
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "cache ledger is malformed; starting from an empty cache"
                    );
                    HashMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "cache ledger is unreadable; starting from an empty cache"
                );
                HashMap::new()
            }
        };
        Self {
            path: Some(path),
            inner: Mutex::new(Inner {
                mods,
                in_flight: HashSet::new(),
            }),
        }
    }

    /// Ledger that never touches disk (the `--no-persist` mode). Skip
    /// semantics still apply within the run.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// True iff the exact candidate file was already fetched for this mod.
    /// A newer file id for the same mod never skips.
    pub fn should_skip(&self, mod_id: u64, candidate_file_id: u64) -> bool {
        self.inner
            .lock()
            .expect("ledger lock poisoned")
            .mods
            .get(&mod_id)
            .is_some_and(|e| e.file_id == candidate_file_id)
    }

    /// Atomic skip-check plus in-flight claim. With `force`, the up-to-date
    /// check is bypassed but the duplicate-worker guard still holds.
    pub fn begin(self: &Arc<Self>, mod_id: u64, candidate_file_id: u64, force: bool) -> ClaimOutcome {
        let mut inner = self.inner.lock().expect("ledger lock poisoned");
        if !force
            && inner
                .mods
                .get(&mod_id)
                .is_some_and(|e| e.file_id == candidate_file_id)
        {
            return ClaimOutcome::UpToDate;
        }
        if !inner.in_flight.insert(mod_id) {
            return ClaimOutcome::InFlight;
        }
        ClaimOutcome::Claimed(LedgerClaim {
            ledger: Arc::clone(self),
            mod_id,
            done: false,
        })
    }

    /// Entry currently recorded for a mod, if any.
    pub fn entry(&self, mod_id: u64) -> Option<CacheEntry> {
        self.inner
            .lock()
            .expect("ledger lock poisoned")
            .mods
            .get(&mod_id)
            .cloned()
    }

    fn record(&self, mod_id: u64, entry: CacheEntry) -> Result<()> {
        // The lock is held across the disk write: completions from
        // different workers must not interleave their rewrites of the
        // backing file.
        let mut inner = self.inner.lock().expect("ledger lock poisoned");
        inner.mods.insert(mod_id, entry);
        inner.in_flight.remove(&mod_id);
        if let Some(path) = self.path.as_ref() {
            let mods = inner
                .mods
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect::<BTreeMap<_, _>>();
            persist(path, PersistedLedger { mods })?;
        }
        Ok(())
    }

    fn release(&self, mod_id: u64) {
        self.inner
            .lock()
            .expect("ledger lock poisoned")
            .in_flight
            .remove(&mod_id);
    }
}

fn persist(path: &Path, doc: PersistedLedger) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create dir: {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(&doc).context("serialize cache ledger")?;
    // Same temp-then-rename discipline as downloads: the ledger path only
    // ever holds a complete document.
    let temp = crate::storage::temp_path(path);
    std::fs::write(&temp, json)
        .with_context(|| format!("write cache ledger: {}", temp.display()))?;
    std::fs::rename(&temp, path)
        .with_context(|| format!("replace cache ledger: {}", path.display()))?;
    Ok(())
}

/// Held by the worker that owns a mod's transfer. Dropping without
/// completing releases the in-flight guard so a failed download does not
/// wedge the mod for the rest of the run.
pub struct LedgerClaim {
    ledger: Arc<CacheLedger>,
    mod_id: u64,
    done: bool,
}

impl std::fmt::Debug for LedgerClaim {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerClaim")
            .field("mod_id", &self.mod_id)
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}

impl LedgerClaim {
    pub fn mod_id(&self) -> u64 {
        self.mod_id
    }

    /// Record the confirmed-successful transfer and persist the ledger.
    pub fn complete(mut self, entry: CacheEntry) -> Result<()> {
        self.done = true;
        self.ledger.record(self.mod_id, entry)
    }
}

impl Drop for LedgerClaim {
    fn drop(&mut self) {
        if !self.done {
            self.ledger.release(self.mod_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(file_id: u64) -> CacheEntry {
        CacheEntry {
            file_id,
            downloaded_at: Utc::now(),
            filename: Some("pack.zip".into()),
            version: None,
        }
    }

    #[test]
    fn skip_only_for_exact_file_id() {
        let ledger = Arc::new(CacheLedger::in_memory());
        match ledger.begin(77, 102, false) {
            ClaimOutcome::Claimed(claim) => claim.complete(entry(102)).unwrap(),
            other => panic!("expected claim, got {other:?}"),
        }
        assert!(ledger.should_skip(77, 102));
        // A newer file must never be skipped.
        assert!(!ledger.should_skip(77, 103));
        assert!(!ledger.should_skip(78, 102));
    }

    #[test]
    fn newer_file_overwrites_entry() {
        let ledger = Arc::new(CacheLedger::in_memory());
        if let ClaimOutcome::Claimed(c) = ledger.begin(77, 102, false) {
            c.complete(entry(102)).unwrap();
        }
        if let ClaimOutcome::Claimed(c) = ledger.begin(77, 103, false) {
            c.complete(entry(103)).unwrap();
        }
        assert_eq!(ledger.entry(77).unwrap().file_id, 103);
        assert!(!ledger.should_skip(77, 102));
    }

    #[test]
    fn duplicate_claim_is_rejected_until_release() {
        let ledger = Arc::new(CacheLedger::in_memory());
        let claim = match ledger.begin(77, 102, false) {
            ClaimOutcome::Claimed(c) => c,
            other => panic!("expected claim, got {other:?}"),
        };
        assert!(matches!(ledger.begin(77, 102, false), ClaimOutcome::InFlight));
        drop(claim); // failed download path
        assert!(matches!(ledger.begin(77, 102, false), ClaimOutcome::Claimed(_)));
    }

    #[test]
    fn force_bypasses_up_to_date_but_not_in_flight() {
        let ledger = Arc::new(CacheLedger::in_memory());
        if let ClaimOutcome::Claimed(c) = ledger.begin(77, 102, false) {
            c.complete(entry(102)).unwrap();
        }
        assert!(matches!(ledger.begin(77, 102, false), ClaimOutcome::UpToDate));
        let claim = match ledger.begin(77, 102, true) {
            ClaimOutcome::Claimed(c) => c,
            other => panic!("expected claim, got {other:?}"),
        };
        assert!(matches!(ledger.begin(77, 102, true), ClaimOutcome::InFlight));
        drop(claim);
    }

    #[test]
    fn persists_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mod_cache.json");
        {
            let ledger = Arc::new(CacheLedger::load(path.clone()));
            if let ClaimOutcome::Claimed(c) = ledger.begin(77, 102, false) {
                c.complete(entry(102)).unwrap();
            }
        }
        let reloaded = CacheLedger::load(path);
        assert!(reloaded.should_skip(77, 102));
        assert_eq!(reloaded.entry(77).unwrap().filename.as_deref(), Some("pack.zip"));
    }

    #[test]
    fn absent_and_malformed_files_start_empty() {
        let dir = tempfile::tempdir().unwrap();
        let missing = CacheLedger::load(dir.path().join("nope.json"));
        assert!(missing.entry(1).is_none());

        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, b"{ this is not json").unwrap();
        let corrupt = CacheLedger::load(bad.clone());
        assert!(corrupt.entry(1).is_none());
        // Corruption recovery must not prevent new records.
        let corrupt = Arc::new(corrupt);
        if let ClaimOutcome::Claimed(c) = corrupt.begin(5, 9, false) {
            c.complete(entry(9)).unwrap();
        }
        assert!(CacheLedger::load(bad).should_skip(5, 9));
    }

    #[test]
    fn claim_outcomes_are_debuggable() {
        let ledger = Arc::new(CacheLedger::in_memory());
        let outcome = ledger.begin(77, 102, false);
        let rendered = format!("{outcome:?}");
        assert!(rendered.contains("Claimed"));
        assert!(rendered.contains("mod_id: 77"));
    }

    #[test]
    fn concurrent_completions_keep_the_document_whole() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mod_cache.json");
        let ledger = Arc::new(CacheLedger::load(path.clone()));

        let handles: Vec<_> = (1..=64u64)
            .map(|mod_id| {
                let ledger = Arc::clone(&ledger);
                std::thread::spawn(move || match ledger.begin(mod_id, mod_id * 10, false) {
                    ClaimOutcome::Claimed(c) => c.complete(entry(mod_id * 10)).unwrap(),
                    other => panic!("expected claim for mod {mod_id}, got {other:?}"),
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        // The document must be valid JSON holding every completed entry.
        let doc: PersistedLedger =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(doc.mods.len(), 64);
        let reloaded = CacheLedger::load(path);
        for mod_id in 1..=64u64 {
            assert_eq!(
                reloaded.entry(mod_id).map(|e| e.file_id),
                Some(mod_id * 10),
                "entry for mod {mod_id} lost"
            );
        }
    }

    #[test]
    fn in_memory_ledger_never_writes() {
        let ledger = Arc::new(CacheLedger::in_memory());
        if let ClaimOutcome::Claimed(c) = ledger.begin(1, 2, false) {
            c.complete(entry(2)).unwrap();
        }
        assert!(ledger.path.is_none());
        assert!(ledger.should_skip(1, 2));
    }
}
