use thiserror::Error;

/// Errors raised while driving the browser.
#[derive(Error, Debug)]
pub enum AutomationError {
    #[error("Browser connection failed: {0}")]
    Connection(String),

    #[error("No open tab matches '{0}' in the debugged browser")]
    TabNotFound(String),

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Operation timed out: {0}")]
    Timeout(String),

    #[error("DevTools protocol error: {0}")]
    Protocol(String),

    #[error("Page script failed: {0}")]
    Script(String),
}

/// Errors raised by the upload ledger. Both variants are fatal for a batch
/// run: once the ledger can no longer be read or written, re-runs cannot be
/// trusted to suppress duplicate submissions.
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Upload ledger is unreadable: {0}")]
    StateUnreadable(String),

    #[error("Failed to persist upload ledger: {0}")]
    PersistFailure(String),
}

/// Errors raised while reading the task worksheet.
#[derive(Error, Debug)]
pub enum WorksheetError {
    #[error("Failed to open worksheet: {0}")]
    Open(String),

    #[error("Worksheet has no usable sheet: {0}")]
    NoSheet(String),

    #[error("Column '{0}' not found in the worksheet header row")]
    MissingColumn(String),
}
