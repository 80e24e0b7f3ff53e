use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::errors::LedgerError;

/// Durable record of which artifacts SEI has already accepted, keyed by
/// process number.
///
/// The ledger is consulted before every upload attempt and extended only
/// after SEI confirmed the upload, so a crashed or partial run never
/// re-submits a file the external system already has. Entries are
/// append-only; there is no removal path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadLedger {
    path: PathBuf,
    entries: BTreeMap<String, Vec<String>>,
}

impl UploadLedger {
    /// Load the ledger from `path`.
    ///
    /// A missing file yields an empty ledger. A file that exists but cannot
    /// be read or parsed is fatal: running on top of unreadable state would
    /// re-upload everything the previous runs already submitted.
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self, LedgerError> {
        let path = path.into();
        let entries = match tokio::fs::read_to_string(&path).await {
            Ok(content) => serde_json::from_str(&content).map_err(|e| {
                LedgerError::StateUnreadable(format!("{}: {e}", path.display()))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("no upload ledger at {}, starting empty", path.display());
                BTreeMap::new()
            }
            Err(e) => {
                return Err(LedgerError::StateUnreadable(format!(
                    "{}: {e}",
                    path.display()
                )))
            }
        };
        Ok(Self { path, entries })
    }

    /// True iff `artifact_name` was already confirmed uploaded for `task_id`.
    pub fn has(&self, task_id: &str, artifact_name: &str) -> bool {
        self.entries
            .get(task_id)
            .is_some_and(|names| names.iter().any(|n| n == artifact_name))
    }

    /// Record a confirmed upload and immediately flush the ledger to disk.
    ///
    /// Must only be called after SEI confirmed the upload — the whole
    /// no-duplicates guarantee rests on that ordering. If the flush fails
    /// the in-memory insertion is rolled back, so `has` keeps answering
    /// false and the next run retries the artifact.
    pub async fn record(&mut self, task_id: &str, artifact_name: &str) -> Result<(), LedgerError> {
        if self.has(task_id, artifact_name) {
            return Ok(());
        }
        self.entries
            .entry(task_id.to_string())
            .or_default()
            .push(artifact_name.to_string());

        if let Err(e) = self.flush().await {
            if let Some(names) = self.entries.get_mut(task_id) {
                names.pop();
                if names.is_empty() {
                    self.entries.remove(task_id);
                }
            }
            return Err(e);
        }
        debug!(task = task_id, artifact = artifact_name, "upload recorded");
        Ok(())
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of tasks with at least one recorded artifact (or an explicit
    /// empty entry carried over from a previous run).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    async fn flush(&self) -> Result<(), LedgerError> {
        let json = serde_json::to_string_pretty(&self.entries)
            .map_err(|e| LedgerError::PersistFailure(e.to_string()))?;
        tokio::fs::write(&self.path, json).await.map_err(|e| {
            LedgerError::PersistFailure(format!("{}: {e}", self.path.display()))
        })
    }
}
