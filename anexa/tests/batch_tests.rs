use std::collections::HashSet;
use std::path::Path;

use anexa::{
    Artifact, ArtifactOutcome, AutomationError, BatchError, BatchRunner, DocumentUploader,
    LedgerError, TaskRecord, UploadLedger,
};
use async_trait::async_trait;
use tempfile::{tempdir, TempDir};

/// Scripted stand-in for the SEI driver: records every attempt and fails
/// the artifacts it was told to fail.
#[derive(Default)]
struct FakeUploader {
    attempted: Vec<(String, String)>,
    fail_names: HashSet<String>,
}

impl FakeUploader {
    fn failing(names: &[&str]) -> Self {
        Self {
            fail_names: names.iter().map(|n| n.to_string()).collect(),
            ..Self::default()
        }
    }

    fn attempted_names(&self) -> Vec<&str> {
        self.attempted.iter().map(|(_, n)| n.as_str()).collect()
    }
}

#[async_trait]
impl DocumentUploader for FakeUploader {
    async fn upload(&mut self, process: &str, artifact: &Artifact) -> Result<(), AutomationError> {
        self.attempted
            .push((process.to_string(), artifact.name.clone()));
        if self.fail_names.contains(&artifact.name) {
            Err(AutomationError::Timeout(format!(
                "upload of '{}' was not confirmed",
                artifact.name
            )))
        } else {
            Ok(())
        }
    }
}

fn touch(path: &Path) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, b"x").unwrap();
}

/// Base dir with one folder for instrument 914708 holding fileA.pdf and
/// fileB.zip.
fn fixture() -> (TempDir, Vec<TaskRecord>) {
    let base = tempdir().unwrap();
    let folder = base.path().join("CT 914708 - Projetos");
    touch(&folder.join("fileA.pdf"));
    touch(&folder.join("fileB.zip"));
    let tasks = vec![TaskRecord {
        process: "2024/001".to_string(),
        instrument: "914708".to_string(),
    }];
    (base, tasks)
}

#[tokio::test]
async fn ledger_hits_are_skipped_not_attempted() {
    let (base, tasks) = fixture();
    let ledger_dir = tempdir().unwrap();
    let ledger_path = ledger_dir.path().join("upload_log.json");
    std::fs::write(&ledger_path, r#"{"2024/001": ["fileA.pdf"]}"#).unwrap();

    let mut ledger = UploadLedger::load(&ledger_path).await.unwrap();
    let mut uploader = FakeUploader::default();
    let report = BatchRunner::new(&mut uploader, &mut ledger, base.path().to_path_buf())
        .run(&tasks)
        .await
        .unwrap();

    assert_eq!(uploader.attempted_names(), vec!["fileB.zip"]);
    assert_eq!(report.uploaded, 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.failed, 0);
}

#[tokio::test]
async fn second_run_attempts_nothing() {
    let (base, tasks) = fixture();
    let ledger_dir = tempdir().unwrap();
    let ledger_path = ledger_dir.path().join("upload_log.json");

    let mut ledger = UploadLedger::load(&ledger_path).await.unwrap();
    let mut first = FakeUploader::default();
    BatchRunner::new(&mut first, &mut ledger, base.path().to_path_buf())
        .run(&tasks)
        .await
        .unwrap();
    assert_eq!(first.attempted.len(), 2);

    // Fresh ledger instance, as a new process would see it.
    let mut ledger = UploadLedger::load(&ledger_path).await.unwrap();
    let mut second = FakeUploader::default();
    let report = BatchRunner::new(&mut second, &mut ledger, base.path().to_path_buf())
        .run(&tasks)
        .await
        .unwrap();

    assert!(second.attempted.is_empty());
    assert_eq!(report.skipped, 2);
    assert_eq!(report.uploaded, 0);
}

#[tokio::test]
async fn recoverable_failure_continues_and_is_retried_next_run() {
    let (base, tasks) = fixture();
    let ledger_dir = tempdir().unwrap();
    let ledger_path = ledger_dir.path().join("upload_log.json");

    let mut ledger = UploadLedger::load(&ledger_path).await.unwrap();
    let mut uploader = FakeUploader::failing(&["fileA.pdf"]);
    let report = BatchRunner::new(&mut uploader, &mut ledger, base.path().to_path_buf())
        .run(&tasks)
        .await
        .unwrap();

    // The failure did not stop fileB.zip from going through.
    assert_eq!(uploader.attempted.len(), 2);
    assert_eq!(report.failed, 1);
    assert_eq!(report.uploaded, 1);
    assert!(matches!(
        report.outcomes[0].2,
        ArtifactOutcome::Failed { .. }
    ));
    assert!(!ledger.has("2024/001", "fileA.pdf"));
    assert!(ledger.has("2024/001", "fileB.zip"));

    // Next run retries exactly the failed artifact.
    let mut ledger = UploadLedger::load(&ledger_path).await.unwrap();
    let mut retry = FakeUploader::default();
    BatchRunner::new(&mut retry, &mut ledger, base.path().to_path_buf())
        .run(&tasks)
        .await
        .unwrap();
    assert_eq!(retry.attempted_names(), vec!["fileA.pdf"]);
}

#[tokio::test]
async fn rows_without_instrument_or_folder_are_warned_and_skipped() {
    let base = tempdir().unwrap();
    let ledger_dir = tempdir().unwrap();
    let tasks = vec![
        TaskRecord {
            process: "2024/010".to_string(),
            instrument: String::new(),
        },
        TaskRecord {
            process: "2024/011".to_string(),
            instrument: "999999".to_string(),
        },
    ];

    let mut ledger = UploadLedger::load(ledger_dir.path().join("upload_log.json"))
        .await
        .unwrap();
    let mut uploader = FakeUploader::default();
    let report = BatchRunner::new(&mut uploader, &mut ledger, base.path().to_path_buf())
        .run(&tasks)
        .await
        .unwrap();

    assert!(uploader.attempted.is_empty());
    assert_eq!(report.tasks_without_folder, 2);
}

#[tokio::test]
async fn duplicate_worksheet_rows_are_processed_independently() {
    let (base, mut tasks) = fixture();
    tasks.push(tasks[0].clone());
    let ledger_dir = tempdir().unwrap();

    let mut ledger = UploadLedger::load(ledger_dir.path().join("upload_log.json"))
        .await
        .unwrap();
    let mut uploader = FakeUploader::default();
    let report = BatchRunner::new(&mut uploader, &mut ledger, base.path().to_path_buf())
        .run(&tasks)
        .await
        .unwrap();

    // The second pass over the same row finds everything recorded already.
    assert_eq!(report.uploaded, 2);
    assert_eq!(report.skipped, 2);
    assert_eq!(uploader.attempted.len(), 2);
}

#[tokio::test]
async fn ledger_persist_failure_halts_the_batch() {
    let (base, tasks) = fixture();
    let ledger_dir = tempdir().unwrap();

    // The ledger's parent directory does not exist, so the post-upload
    // flush fails.
    let ledger_path = ledger_dir.path().join("missing").join("upload_log.json");
    let mut ledger = UploadLedger::load(&ledger_path).await.unwrap();
    let mut uploader = FakeUploader::default();
    let err = BatchRunner::new(&mut uploader, &mut ledger, base.path().to_path_buf())
        .run(&tasks)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        BatchError::Ledger(LedgerError::PersistFailure(_))
    ));
    // Only the first artifact was attempted before the halt, and it was not
    // marked done in memory.
    assert_eq!(uploader.attempted.len(), 1);
    assert!(!ledger.has("2024/001", "fileA.pdf"));
}

#[tokio::test]
async fn artifacts_are_processed_in_path_order() {
    let base = tempdir().unwrap();
    let folder = base.path().join("914708");
    touch(&folder.join("b.pdf"));
    touch(&folder.join("a.zip"));
    touch(&folder.join("notas.txt"));
    touch(&folder.join("sub").join("c.PDF"));
    let tasks = vec![TaskRecord {
        process: "2024/001".to_string(),
        instrument: "914708".to_string(),
    }];
    let ledger_dir = tempdir().unwrap();

    let mut ledger = UploadLedger::load(ledger_dir.path().join("upload_log.json"))
        .await
        .unwrap();
    let mut uploader = FakeUploader::default();
    BatchRunner::new(&mut uploader, &mut ledger, base.path().to_path_buf())
        .run(&tasks)
        .await
        .unwrap();

    assert_eq!(uploader.attempted_names(), vec!["a.zip", "b.pdf", "c.PDF"]);
}
