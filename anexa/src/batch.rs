use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::artifacts::{matching_folders, scan_artifacts, Artifact};
use crate::errors::{AutomationError, LedgerError};
use crate::ledger::UploadLedger;
use crate::worksheet::TaskRecord;

/// Performs one upload attempt against the external system.
///
/// The production implementation drives the SEI form; tests substitute a
/// scripted fake.
#[async_trait]
pub trait DocumentUploader: Send {
    /// Returns Ok(()) only once the external system confirmed the upload.
    async fn upload(&mut self, process: &str, artifact: &Artifact) -> Result<(), AutomationError>;
}

/// What happened to a single candidate artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactOutcome {
    /// Confirmed by the external system and recorded in the ledger.
    Uploaded,
    /// Present in the ledger from an earlier run; upload not attempted.
    AlreadyRecorded,
    /// Recoverable failure: the batch moves on, the ledger stays untouched,
    /// and a re-run retries this exact artifact.
    Failed { reason: String },
}

/// Errors that stop the whole batch.
#[derive(Error, Debug)]
pub enum BatchError {
    /// The ledger could not be persisted (or loaded). Continuing without a
    /// trustworthy ledger risks duplicate submissions on the next run.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("Filesystem error under {path}: {source}")]
    Scan {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Totals and per-artifact outcomes of one batch pass.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub uploaded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub tasks_without_folder: usize,
    /// (process, artifact name, outcome) in processing order.
    pub outcomes: Vec<(String, String, ArtifactOutcome)>,
}

/// Sequential batch driver: worksheet rows → folders → artifacts → ledger
/// check → upload → record. One task at a time, one artifact at a time.
pub struct BatchRunner<'a, U: DocumentUploader> {
    uploader: &'a mut U,
    ledger: &'a mut UploadLedger,
    base_dir: PathBuf,
}

impl<'a, U: DocumentUploader> BatchRunner<'a, U> {
    pub fn new(uploader: &'a mut U, ledger: &'a mut UploadLedger, base_dir: PathBuf) -> Self {
        Self {
            uploader,
            ledger,
            base_dir,
        }
    }

    pub async fn run(&mut self, tasks: &[TaskRecord]) -> Result<BatchReport, BatchError> {
        let mut report = BatchReport::default();
        for task in tasks {
            self.run_task(task, &mut report).await?;
        }
        info!(
            uploaded = report.uploaded,
            skipped = report.skipped,
            failed = report.failed,
            "batch finished"
        );
        Ok(report)
    }

    async fn run_task(
        &mut self,
        task: &TaskRecord,
        report: &mut BatchReport,
    ) -> Result<(), BatchError> {
        info!(process = %task.process, "processing worksheet row");

        if task.instrument.is_empty() {
            warn!(process = %task.process, "row has no instrument number, skipping");
            report.tasks_without_folder += 1;
            return Ok(());
        }

        let folders = matching_folders(&self.base_dir, &task.instrument).map_err(|source| {
            BatchError::Scan {
                path: self.base_dir.clone(),
                source,
            }
        })?;
        if folders.is_empty() {
            warn!(
                instrument = %task.instrument,
                "no document folder matches this instrument, skipping"
            );
            report.tasks_without_folder += 1;
            return Ok(());
        }

        for folder in folders {
            let artifacts = scan_artifacts(&folder).map_err(|source| BatchError::Scan {
                path: folder.clone(),
                source,
            })?;
            if artifacts.is_empty() {
                info!(folder = %folder.display(), "no .pdf or .zip files here");
                continue;
            }
            for artifact in artifacts {
                let outcome = self.run_artifact(task, &artifact).await?;
                match &outcome {
                    ArtifactOutcome::Uploaded => report.uploaded += 1,
                    ArtifactOutcome::AlreadyRecorded => report.skipped += 1,
                    ArtifactOutcome::Failed { reason } => {
                        warn!(
                            process = %task.process,
                            artifact = %artifact.name,
                            %reason,
                            "upload failed, will retry on the next run"
                        );
                        report.failed += 1;
                    }
                }
                report
                    .outcomes
                    .push((task.process.clone(), artifact.name.clone(), outcome));
            }
        }
        Ok(())
    }

    async fn run_artifact(
        &mut self,
        task: &TaskRecord,
        artifact: &Artifact,
    ) -> Result<ArtifactOutcome, BatchError> {
        if self.ledger.has(&task.process, &artifact.name) {
            debug!(artifact = %artifact.name, "already uploaded in an earlier run");
            return Ok(ArtifactOutcome::AlreadyRecorded);
        }

        match self.uploader.upload(&task.process, artifact).await {
            Ok(()) => {
                // A persist failure here is fatal: without a durable record
                // the next run would submit this file again.
                self.ledger.record(&task.process, &artifact.name).await?;
                info!(artifact = %artifact.name, "uploaded and recorded");
                Ok(ArtifactOutcome::Uploaded)
            }
            Err(e) => Ok(ArtifactOutcome::Failed {
                reason: e.to_string(),
            }),
        }
    }
}
