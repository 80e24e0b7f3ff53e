//! anexa CLI
//!
//! Batch-uploads PDF/ZIP attachments into SEI processes through an already
//! authenticated Chrome session, keeping a durable ledger so interrupted or
//! repeated runs never submit the same file twice.
//!
//! Usage:
//!   anexa run --worksheet plan.xlsx --documents-dir ./docs
//!   anexa check --worksheet plan.xlsx --documents-dir ./docs

use std::path::PathBuf;
use std::time::Duration;

use anexa::{
    artifacts, worksheet, ArtifactOutcome, BatchReport, BatchRunner, Config, SeiDriver,
    UploadLedger,
};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "anexa", version)]
#[command(about = "Batch uploader of external documents into SEI processes")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Parser, Debug)]
struct RunArgs {
    /// Worksheet with the process and instrument columns (.xlsx)
    #[arg(long, env = "ANEXA_WORKSHEET")]
    worksheet: PathBuf,

    /// Base directory holding one folder per instrument
    #[arg(long, env = "ANEXA_DOCUMENTS_DIR")]
    documents_dir: PathBuf,

    /// Upload ledger file, created on first run
    #[arg(long, env = "ANEXA_LEDGER", default_value = "upload_log.json")]
    ledger: PathBuf,

    /// DevTools port of the authenticated Chrome session
    #[arg(long, env = "ANEXA_DEBUG_PORT", default_value_t = Config::DEFAULT_DEBUG_PORT)]
    port: u16,

    /// Seconds to wait for SEI page elements and upload confirmation
    #[arg(long, default_value_t = 20)]
    timeout: u64,

    /// Substring identifying the SEI tab among the open tabs
    #[arg(long, default_value = Config::DEFAULT_TAB_URL_PATTERN)]
    tab: String,

    /// Header of the process number column
    #[arg(long, default_value = Config::DEFAULT_PROCESS_COLUMN)]
    process_column: String,

    /// Header of the instrument number column
    #[arg(long, default_value = Config::DEFAULT_INSTRUMENT_COLUMN)]
    instrument_column: String,
}

impl RunArgs {
    fn into_config(self) -> Config {
        let mut config = Config::new(self.worksheet, self.documents_dir, self.ledger);
        config.debug_port = self.port;
        config.wait_timeout = Duration::from_secs(self.timeout);
        config.tab_url_pattern = self.tab;
        config.process_column = self.process_column;
        config.instrument_column = self.instrument_column;
        config
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Upload everything the ledger does not already record
    Run(RunArgs),
    /// Preview the pending work without touching the browser
    Check(RunArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_logging();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run(args) => run(args.into_config()).await,
        Commands::Check(args) => check(args.into_config()).await,
    }
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

async fn run(config: Config) -> Result<()> {
    let tasks = worksheet::read_tasks(
        &config.worksheet,
        &config.process_column,
        &config.instrument_column,
    )
    .context("reading the worksheet")?;
    tracing::info!("worksheet loaded, {} rows to process", tasks.len());

    let mut ledger = UploadLedger::load(&config.ledger_file)
        .await
        .context("loading the upload ledger")?;

    let mut driver = SeiDriver::connect(&config)
        .await
        .context("attaching to the debugged Chrome session")?;

    let mut runner = BatchRunner::new(&mut driver, &mut ledger, config.documents_dir.clone());
    let report = runner
        .run(&tasks)
        .await
        .context("the batch stopped on a fatal error")?;

    print_report(&report);
    Ok(())
}

/// Dry pass: resolve folders and artifacts, consult the ledger, and print
/// what a `run` would upload, without opening the browser.
async fn check(config: Config) -> Result<()> {
    let tasks = worksheet::read_tasks(
        &config.worksheet,
        &config.process_column,
        &config.instrument_column,
    )
    .context("reading the worksheet")?;
    let ledger = UploadLedger::load(&config.ledger_file)
        .await
        .context("loading the upload ledger")?;

    let mut pending = 0usize;
    let mut done = 0usize;
    for task in &tasks {
        if task.instrument.is_empty() {
            println!(
                "{} {} has no instrument number",
                "skip".yellow(),
                task.process
            );
            continue;
        }
        let folders = artifacts::matching_folders(&config.documents_dir, &task.instrument)
            .with_context(|| format!("listing {}", config.documents_dir.display()))?;
        if folders.is_empty() {
            println!(
                "{} no folder matches instrument {} ({})",
                "skip".yellow(),
                task.instrument,
                task.process
            );
            continue;
        }
        for folder in folders {
            for artifact in artifacts::scan_artifacts(&folder)
                .with_context(|| format!("scanning {}", folder.display()))?
            {
                if ledger.has(&task.process, &artifact.name) {
                    done += 1;
                } else {
                    println!("{} {} -> {}", "pending".green(), artifact.name, task.process);
                    pending += 1;
                }
            }
        }
    }

    println!("{}", "─".repeat(60));
    println!(
        "{pending} pending, {done} already in the ledger, {} worksheet rows",
        tasks.len()
    );
    Ok(())
}

fn print_report(report: &BatchReport) {
    println!("{}", "═".repeat(60));
    println!("{} {}", "uploaded:".green().bold(), report.uploaded);
    println!("{} {}", "already in ledger:".yellow(), report.skipped);
    println!(
        "{} {}",
        "failed (retried on next run):".red(),
        report.failed
    );
    if report.tasks_without_folder > 0 {
        println!(
            "{} {}",
            "rows without documents:".yellow(),
            report.tasks_without_folder
        );
    }
    let failures: Vec<_> = report
        .outcomes
        .iter()
        .filter_map(|(process, name, outcome)| match outcome {
            ArtifactOutcome::Failed { reason } => Some((process, name, reason)),
            _ => None,
        })
        .collect();
    if !failures.is_empty() {
        println!("{}", "─".repeat(60));
        for (process, name, reason) in failures {
            println!("{} {name} ({process}): {reason}", "failed:".red());
        }
    }
    println!("{}", "═".repeat(60));
}
