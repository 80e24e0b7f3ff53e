//! Batch upload of external documents into SEI processes
//!
//! This crate drives an already authenticated Chrome session over the
//! DevTools protocol, walking a worksheet of processes and a tree of local
//! document folders, and keeps a durable ledger of confirmed uploads so
//! interrupted or repeated runs never submit the same file twice.

pub mod artifacts;
pub mod batch;
pub mod cdp;
pub mod config;
pub mod errors;
pub mod ledger;
pub mod sei;
pub mod worksheet;

pub use artifacts::Artifact;
pub use batch::{ArtifactOutcome, BatchError, BatchReport, BatchRunner, DocumentUploader};
pub use cdp::CdpClient;
pub use config::Config;
pub use errors::{AutomationError, LedgerError, WorksheetError};
pub use ledger::UploadLedger;
pub use sei::SeiDriver;
pub use worksheet::TaskRecord;
