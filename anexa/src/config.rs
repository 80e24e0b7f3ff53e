use std::path::PathBuf;
use std::time::Duration;

/// Everything site-specific the robot needs, assembled by the binary and
/// passed down by reference. Nothing in the library reads the environment
/// or carries ambient state.
#[derive(Debug, Clone)]
pub struct Config {
    /// Worksheet with the process and instrument columns (`.xlsx`).
    pub worksheet: PathBuf,
    /// Base directory holding one folder per instrument.
    pub documents_dir: PathBuf,
    /// Upload ledger file; created on first run.
    pub ledger_file: PathBuf,
    /// DevTools port of the authenticated Chrome session.
    pub debug_port: u16,
    /// How long to wait for SEI page elements and the upload confirmation.
    pub wait_timeout: Duration,
    /// Substring identifying the SEI tab among the open tabs.
    pub tab_url_pattern: String,
    /// Header of the process number column.
    pub process_column: String,
    /// Header of the instrument number column.
    pub instrument_column: String,
}

impl Config {
    pub const DEFAULT_DEBUG_PORT: u16 = 9222;
    pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(20);
    pub const DEFAULT_TAB_URL_PATTERN: &'static str = "sei";
    pub const DEFAULT_PROCESS_COLUMN: &'static str = "Processo SEI (nº)";
    pub const DEFAULT_INSTRUMENT_COLUMN: &'static str = "Instrumento nº";

    /// A config with the three site paths and defaults for the rest.
    pub fn new(
        worksheet: impl Into<PathBuf>,
        documents_dir: impl Into<PathBuf>,
        ledger_file: impl Into<PathBuf>,
    ) -> Self {
        Self {
            worksheet: worksheet.into(),
            documents_dir: documents_dir.into(),
            ledger_file: ledger_file.into(),
            debug_port: Self::DEFAULT_DEBUG_PORT,
            wait_timeout: Self::DEFAULT_WAIT_TIMEOUT,
            tab_url_pattern: Self::DEFAULT_TAB_URL_PATTERN.to_string(),
            process_column: Self::DEFAULT_PROCESS_COLUMN.to_string(),
            instrument_column: Self::DEFAULT_INSTRUMENT_COLUMN.to_string(),
        }
    }
}
