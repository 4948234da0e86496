//! Running the CLI

// Allow exits because in this file we ideally handle all errors with known exit codes
#![allow(clippy::exit)]

use crate::db::init;
use crate::job::config::JobFile;
use crate::job::{Job, Layer, RunMode};
use crate::report::test_output::diff_report;
use crate::report::Reporter;
use crate::store::{DocId, SqlStore, StoreClient as _};
use clap::Parser;
use std::fs::write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;
use tracing_subscriber::EnvFilter;

/// Docbatch runs batch corrections against a versioned XML document store.
/// Every eligible layer of each selected document is transformed and only
/// changed layers are written back.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the `SQLite` document store. `DATABASE_URL` takes precedence.
    #[arg(short, long, default_value = "docstore.sqlite3")]
    store: PathBuf,
    /// Also write diagnostic traces to this file.
    #[arg(long)]
    trace_file: Option<PathBuf>,
    /// Docbatch cli subcommands
    #[command(subcommand)]
    subcommands: Subcommands,
}

///
#[derive(Clone, clap::Subcommand)]
enum Subcommands {
    /// Run a correction job
    Run {
        /// Job file (TOML).
        #[arg(short, long)]
        job: PathBuf,
        /// User the job checks documents out as.
        #[arg(short, long)]
        user: String,
        /// `test` saves nothing, `live` writes changed layers.
        #[arg(short, long, value_enum, default_value_t = RunMode::Test)]
        mode: RunMode,
        /// Process at most this many documents. Overrides the job file.
        #[arg(long)]
        max_docs: Option<usize>,
        /// Comment recorded with every save. Overrides the job file.
        #[arg(short, long)]
        comment: Option<String>,
        /// Run log, appended to.
        #[arg(long, default_value = "docbatch.log")]
        log_file: PathBuf,
        /// In test mode, write before/after bodies and diffs here.
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
        /// Also write the run summary as JSON to this file.
        #[arg(long)]
        summary_json: Option<PathBuf>,
    },
    /// Release check-out locks left behind by an interrupted run
    Unlock {
        /// User holding the locks.
        #[arg(short, long)]
        user: String,
        /// Documents to release, `CDR0000000101` or `101`.
        #[arg(required = true)]
        ids: Vec<DocId>,
    },
    /// Concatenate the diffs of a test mode run
    DiffReport {
        /// Output directory of the test mode run.
        #[arg(short, long)]
        dir: PathBuf,
        /// Layers to include, any of `cwd`, `lastv`, `pub`. Defaults to all.
        layers: Vec<Layer>,
    },
}

/// Install the global subscriber: `RUST_LOG` filtered (default `info`) output on stderr,
/// plus an optional trace file. The returned guard flushes the file when dropped.
fn init_tracing(trace_file: Option<&Path>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let console_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
    let (file_layer, guard) = match trace_file {
        Some(path) => {
            let directory = path
                .parent()
                .filter(|parent| !parent.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let file_name = path.file_name().unwrap_or(path.as_os_str());
            let appender = tracing_appender::rolling::never(directory, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .init();
    guard
}

/// Main entrypoint to application
///
/// Exits with status 1 when a command fails. A job run that completes counts as success even
/// if individual documents failed; those are in the run log.
pub fn run() {
    let cli = Cli::parse();
    let _guard = init_tracing(cli.trace_file.as_deref());
    tracing::debug!("Starting application");
    if let Err(err) = async_std::task::block_on(execute(cli)) {
        tracing::error!("{err:#}");
        std::process::exit(1);
    }
}

/// Dispatch a parsed command line.
#[allow(clippy::print_stdout)]
async fn execute(cli: Cli) -> anyhow::Result<()> {
    match cli.subcommands {
        Subcommands::Run {
            job,
            user,
            mode,
            max_docs,
            comment,
            log_file,
            output_dir,
            summary_json,
        } => {
            let file = JobFile::load(&job)?;
            let mut settings = file.settings(mode);
            if let Some(comment) = comment {
                settings.comment = comment;
            }
            if settings.comment.trim().is_empty() {
                anyhow::bail!(
                    "A run comment is required: set `comment` in the job file or pass --comment"
                );
            }
            if max_docs.is_some() {
                settings.max_docs = max_docs;
            }
            settings.output_dir = output_dir;

            let conn = init::connect(&cli.store).await?;
            let selector = file.selector(&conn)?;
            let transformer = Box::new(file.transformer()?);
            let store = Arc::new(SqlStore::new(conn, user));
            let reporter = Reporter::append_to(&log_file)?;
            let summary = Job::new(store, selector, transformer, settings, reporter)
                .run()
                .await?;

            let counts = summary.counts();
            tracing::info!(
                processed = summary.processed(),
                updated = counts.updated(),
                unchanged = counts.unchanged,
                skipped_missing = counts.skipped_missing,
                failed = counts.failed,
                "Run finished"
            );
            if let Some(path) = summary_json {
                write(&path, summary.to_json()?)?;
            }
            Ok(())
        }
        Subcommands::Unlock { user, ids } => {
            let conn = init::connect(&cli.store).await?;
            let store = SqlStore::new(conn, user);
            let mut failures = 0_usize;
            for id in ids {
                match store.unlock(id).await {
                    Ok(()) => tracing::info!(%id, "Released lock"),
                    Err(err) => {
                        tracing::error!(%id, "{err}");
                        failures += 1;
                    }
                }
            }
            if failures > 0 {
                anyhow::bail!("{failures} lock(s) could not be released");
            }
            Ok(())
        }
        Subcommands::DiffReport { dir, layers } => {
            print!("{}", diff_report(&dir, &layers)?);
            Ok(())
        }
    }
}
