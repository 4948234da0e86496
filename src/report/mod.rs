//! The run log.
//!
//! One timestamped line per processed document and a closing summary block, appended to a
//! plain text file so successive runs against the same path accumulate an audit trail.
use std::fs::{create_dir_all, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use crate::job::outcome::{RecordEntry, RunSummary};

/// Artifacts written by test mode runs.
pub mod test_output;

/// Append-only, human readable run log.
pub struct Reporter {
    /// Where lines go.
    sink: Box<dyn Write + Send>,
}

impl Reporter {
    /// Open `path` for appending, creating it and its parent directories if needed.
    ///
    /// # Errors
    /// Errors if the file cannot be opened for appending.
    pub fn append_to(path: &Path) -> anyhow::Result<Self> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self::from_writer(file))
    }

    /// Log into any writer.
    #[must_use]
    pub fn from_writer(writer: impl Write + Send + 'static) -> Self {
        Self {
            sink: Box::new(writer),
        }
    }

    /// A reporter that discards everything.
    #[must_use]
    pub fn discard() -> Self {
        Self::from_writer(io::sink())
    }

    /// Log a free form line.
    ///
    /// # Errors
    /// Errors if the log cannot be written.
    pub fn note(&mut self, message: &str) -> io::Result<()> {
        tracing::info!("{message}");
        self.line(message)
    }

    /// Log the outcome of one document.
    ///
    /// # Errors
    /// Errors if the log cannot be written.
    pub fn document(&mut self, entry: &RecordEntry) -> io::Result<()> {
        self.line(&format!(
            "{}: {} ({:.3}s)",
            entry.id,
            entry.outcome,
            entry.elapsed.as_secs_f64()
        ))
    }

    /// Log the closing summary block.
    ///
    /// # Errors
    /// Errors if the log cannot be written.
    pub fn summary(&mut self, summary: &RunSummary) -> io::Result<()> {
        let counts = summary.counts();
        self.line(&format!("Run summary (mode: {})", summary.mode))?;
        let rows: [(&str, String); 11] = [
            ("comment", summary.comment.clone()),
            ("candidates", summary.candidates.to_string()),
            ("duplicates dropped", summary.duplicates.to_string()),
            ("processed", summary.processed().to_string()),
            ("unchanged", counts.unchanged.to_string()),
            ("updated", counts.updated().to_string()),
            ("  live copy only", counts.updated_live_only.to_string()),
            ("  with snapshots", counts.updated_with_snapshots.to_string()),
            ("skipped (missing)", counts.skipped_missing.to_string()),
            ("failed", counts.failed.to_string()),
            (
                "elapsed",
                format!("{:.3}s", summary.elapsed.as_secs_f64()),
            ),
        ];
        for (label, value) in rows {
            writeln!(self.sink, "    {:<22}{value}", format!("{label}:"))?;
        }
        self.sink.flush()
    }

    /// Write one timestamped line and flush, so the log doubles as a progress indicator.
    fn line(&mut self, text: &str) -> io::Result<()> {
        let stamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
        writeln!(self.sink, "{stamp} {text}")?;
        self.sink.flush()
    }
}
