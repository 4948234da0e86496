//! What happened to each document, and the totals for a run.
use derive_more::Display;
use serde_derive::Serialize;
use std::fmt;
use std::time::Duration;

use super::layer::Layer;
use super::RunMode;
use crate::store::{DocId, StoreError};

/// An ordered list of layers, displayed comma separated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct LayerSet(pub Vec<Layer>);

impl LayerSet {
    /// Whether the set holds any snapshot layer.
    #[must_use]
    pub fn touches_snapshots(&self) -> bool {
        self.0.iter().any(|layer| *layer != Layer::Live)
    }
}

impl fmt::Display for LayerSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let labels: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        write!(f, "{}", labels.join(","))
    }
}

/// Why a document could not be processed.
#[derive(Debug, Display)]
pub enum DocumentFailure {
    /// The document could not be checked out. No lock was taken.
    #[display(fmt = "checkout failed: {}", _0)]
    Checkout(StoreError),
    /// Reading the document's versions failed.
    #[display(fmt = "reading versions failed: {}", _0)]
    Snapshots(StoreError),
    /// The transformation rejected a layer. Nothing was saved.
    #[display(fmt = "transform failed on {}: {:#}", layer, error)]
    Transform {
        /// Layer being transformed.
        layer: Layer,
        /// Error raised by the transformer.
        error: anyhow::Error,
    },
    /// The store refused a save. Layers in `saved` were already written.
    #[display(fmt = "saving {} failed (already saved: [{}]): {}", layer, saved, error)]
    Save {
        /// Layer being saved.
        layer: Layer,
        /// Layers saved before the failure.
        saved: LayerSet,
        /// Store error.
        error: StoreError,
    },
    /// Processing finished but the lock could not be released.
    #[display(fmt = "unlock failed after {}: {}", completed, error)]
    Unlock {
        /// Outcome reached before the release was attempted.
        completed: OutcomeKind,
        /// Store error.
        error: StoreError,
    },
}

/// The final state of one document.
#[derive(Debug)]
pub enum DocumentOutcome {
    /// Every eligible layer already held the corrected body.
    Unchanged,
    /// These layers were saved, or in test mode would have been.
    Updated(LayerSet),
    /// The store has no such document.
    SkippedMissing,
    /// Processing failed; see the failure for what, if anything, was written.
    Failed(DocumentFailure),
}

impl DocumentOutcome {
    /// Classify the outcome for the run totals.
    #[must_use]
    pub fn kind(&self) -> OutcomeKind {
        match self {
            Self::Unchanged => OutcomeKind::Unchanged,
            Self::Updated(layers) if layers.touches_snapshots() => {
                OutcomeKind::UpdatedWithSnapshots
            }
            Self::Updated(_) => OutcomeKind::UpdatedLiveOnly,
            Self::SkippedMissing => OutcomeKind::SkippedMissing,
            Self::Failed(_) => OutcomeKind::Failed,
        }
    }

    /// Layers saved (or to be saved in test mode). Empty unless updated.
    #[must_use]
    pub fn saved_layers(&self) -> &[Layer] {
        match self {
            Self::Updated(layers) => &layers.0,
            _ => &[],
        }
    }
}

impl fmt::Display for DocumentOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Updated(layers) => write!(f, "{} [{layers}]", self.kind()),
            Self::Failed(failure) => write!(f, "{}: {failure}", self.kind()),
            Self::Unchanged | Self::SkippedMissing => write!(f, "{}", self.kind()),
        }
    }
}

/// Outcome categories counted in the run summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutcomeKind {
    /// Nothing to save.
    #[display(fmt = "unchanged")]
    Unchanged,
    /// Only the live copy changed.
    #[display(fmt = "updated-live-only")]
    UpdatedLiveOnly,
    /// At least one snapshot changed.
    #[display(fmt = "updated-with-snapshots")]
    UpdatedWithSnapshots,
    /// Document does not exist.
    #[display(fmt = "skipped-missing")]
    SkippedMissing,
    /// Processing failed.
    #[display(fmt = "failed")]
    Failed,
}

/// Per-category totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OutcomeCounts {
    /// Documents needing no change.
    pub unchanged: usize,
    /// Documents where only the live copy changed.
    pub updated_live_only: usize,
    /// Documents where a snapshot changed.
    pub updated_with_snapshots: usize,
    /// Documents the store did not know.
    pub skipped_missing: usize,
    /// Documents that failed.
    pub failed: usize,
}

impl OutcomeCounts {
    /// Count one more outcome of `kind`.
    pub fn add(&mut self, kind: OutcomeKind) {
        match kind {
            OutcomeKind::Unchanged => self.unchanged += 1,
            OutcomeKind::UpdatedLiveOnly => self.updated_live_only += 1,
            OutcomeKind::UpdatedWithSnapshots => self.updated_with_snapshots += 1,
            OutcomeKind::SkippedMissing => self.skipped_missing += 1,
            OutcomeKind::Failed => self.failed += 1,
        }
    }

    /// All updated documents, with or without snapshots.
    #[must_use]
    pub const fn updated(&self) -> usize {
        self.updated_live_only + self.updated_with_snapshots
    }

    /// Every counted document.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.unchanged + self.updated() + self.skipped_missing + self.failed
    }
}

/// One processed document.
#[derive(Debug)]
pub struct RecordEntry {
    /// Document identifier.
    pub id: DocId,
    /// Final state.
    pub outcome: DocumentOutcome,
    /// Wall clock time spent on the document.
    pub elapsed: Duration,
}

/// Outcomes of a run, in processing order.
#[derive(Debug, Default)]
pub struct RunRecord {
    /// Entries in processing order.
    entries: Vec<RecordEntry>,
    /// Running totals.
    counts: OutcomeCounts,
}

impl RunRecord {
    /// Append the outcome for one document.
    pub fn push(&mut self, id: DocId, outcome: DocumentOutcome, elapsed: Duration) {
        self.counts.add(outcome.kind());
        self.entries.push(RecordEntry {
            id,
            outcome,
            elapsed,
        });
    }

    /// Totals so far.
    #[must_use]
    pub const fn counts(&self) -> OutcomeCounts {
        self.counts
    }

    /// All entries, in processing order.
    #[must_use]
    pub fn entries(&self) -> &[RecordEntry] {
        &self.entries
    }

    /// Outcome recorded for `id`, if it was processed.
    #[must_use]
    pub fn outcome_of(&self, id: DocId) -> Option<&DocumentOutcome> {
        self.entries
            .iter()
            .find(|entry| entry.id == id)
            .map(|entry| &entry.outcome)
    }
}

/// The result of a finished run.
#[derive(Debug)]
pub struct RunSummary {
    /// Test or live.
    pub mode: RunMode,
    /// Comment recorded with every save.
    pub comment: String,
    /// Candidates returned by the selector, after removing duplicates.
    pub candidates: usize,
    /// Duplicate ids the selector returned.
    pub duplicates: usize,
    /// Per-document outcomes.
    pub record: RunRecord,
    /// Wall clock time of the run.
    pub elapsed: Duration,
}

impl RunSummary {
    /// Totals by outcome.
    #[must_use]
    pub const fn counts(&self) -> OutcomeCounts {
        self.record.counts()
    }

    /// Documents processed, which is fewer than the candidates when a ceiling applied.
    #[must_use]
    pub fn processed(&self) -> usize {
        self.record.entries().len()
    }

    /// Render the summary as pretty JSON.
    ///
    /// # Errors
    /// Errors if serialization fails.
    pub fn to_json(&self) -> anyhow::Result<String> {
        let documents = self
            .record
            .entries()
            .iter()
            .map(|entry| JsonEntry {
                id: entry.id.to_string(),
                outcome: entry.outcome.kind(),
                layers: entry.outcome.saved_layers(),
                error: match &entry.outcome {
                    DocumentOutcome::Failed(failure) => Some(failure.to_string()),
                    _ => None,
                },
                elapsed_ms: entry.elapsed.as_millis(),
            })
            .collect();
        let json = JsonSummary {
            mode: self.mode,
            comment: &self.comment,
            candidates: self.candidates,
            duplicates: self.duplicates,
            processed: self.processed(),
            counts: self.counts(),
            updated: self.counts().updated(),
            elapsed_ms: self.elapsed.as_millis(),
            documents,
        };
        Ok(serde_json::to_string_pretty(&json)?)
    }
}

/// Serialized shape of a run summary.
#[derive(Serialize)]
struct JsonSummary<'run> {
    mode: RunMode,
    comment: &'run str,
    candidates: usize,
    duplicates: usize,
    processed: usize,
    counts: OutcomeCounts,
    updated: usize,
    elapsed_ms: u128,
    documents: Vec<JsonEntry<'run>>,
}

/// Serialized shape of one record entry.
#[derive(Serialize)]
struct JsonEntry<'run> {
    id: String,
    outcome: OutcomeKind,
    layers: &'run [Layer],
    error: Option<String>,
    elapsed_ms: u128,
}
