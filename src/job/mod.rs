//! Batch correction jobs.
//!
//! A [`Job`] asks its [`Selector`] for candidate documents once, then handles each document
//! in turn: check it out, plan which layers are eligible, transform all of them, save the
//! ones whose body changed, release the lock. Whatever goes wrong with one document is
//! recorded against that document and the loop moves on. Only a failed selection aborts the
//! run.
//!
//! Transformations are expected to be pure, so running the same job twice leaves the second
//! run with nothing to save.
use derive_more::Display;
use serde_derive::Serialize;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use crate::report::test_output::TestOutput;
use crate::report::Reporter;
use crate::store::{DocId, LiveCopy, SaveOptions, Snapshots, StoreClient, StoreError};
use crate::utils::md5;

/// Job files.
pub mod config;
/// Document layers and layer planning.
pub mod layer;
/// Per-document outcomes and run totals.
pub mod outcome;
/// Layer switches.
pub mod policy;
/// Candidate selection.
pub mod select;
/// Document transformation.
pub mod transform;

pub use layer::{plan_layers, Layer, LayerTarget};
pub use outcome::{
    DocumentFailure, DocumentOutcome, LayerSet, OutcomeCounts, OutcomeKind, RunRecord, RunSummary,
};
pub use policy::VersionPolicy;
pub use select::{IdListSelector, QuerySelector, Selector};
pub use transform::{FnTransformer, LayerBody, RegexTransformer, Transformer};

/// Whether a run writes to the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Do everything except save. Locks are still taken and released.
    #[default]
    #[display(fmt = "test")]
    Test,
    /// Save changed layers.
    #[display(fmt = "live")]
    Live,
}

/// Errors that end a run before any document is processed.
#[derive(Debug, Display)]
pub enum JobError {
    /// The selector failed.
    #[display(fmt = "candidate selection failed: {:#}", _0)]
    Selection(anyhow::Error),
    /// The test output directory could not be created.
    #[display(fmt = "cannot prepare test output directory: {:#}", _0)]
    Output(anyhow::Error),
}

impl std::error::Error for JobError {}

/// Run parameters, fixed for the lifetime of a job.
#[derive(Debug, Clone, Default)]
pub struct JobSettings {
    /// Layer switches.
    pub policy: VersionPolicy,
    /// Test or live.
    pub mode: RunMode,
    /// Process at most this many candidates.
    pub max_docs: Option<usize>,
    /// Comment recorded with every save.
    pub comment: String,
    /// Reject transformed bodies that are not well-formed XML.
    pub validate: bool,
    /// In test mode, write before/after bodies and diffs here.
    pub output_dir: Option<PathBuf>,
}

/// A configured batch correction job. Consumed by [`Job::run`].
pub struct Job {
    /// Store the job reads and writes.
    store: Arc<dyn StoreClient>,
    /// Produces the candidates.
    selector: Box<dyn Selector>,
    /// Produces corrected bodies.
    transformer: Box<dyn Transformer>,
    /// Run parameters.
    settings: JobSettings,
    /// Run log.
    reporter: Reporter,
}

/// A layer whose body the transformation changed.
type LayerChange = (LayerTarget, String);

impl Job {
    /// Assemble a job.
    #[must_use]
    pub fn new(
        store: Arc<dyn StoreClient>,
        selector: Box<dyn Selector>,
        transformer: Box<dyn Transformer>,
        settings: JobSettings,
        reporter: Reporter,
    ) -> Self {
        Self {
            store,
            selector,
            transformer,
            settings,
            reporter,
        }
    }

    /// Run the job to completion.
    ///
    /// # Errors
    /// Errors only when the candidates cannot be selected or the test output directory cannot
    /// be prepared. Per-document failures are recorded in the returned summary.
    pub async fn run(mut self) -> Result<RunSummary, JobError> {
        let started = Instant::now();
        let selected = self
            .selector
            .select_candidates()
            .await
            .map_err(JobError::Selection)?;
        let (mut ids, duplicates) = dedupe(selected);
        let candidates = ids.len();
        if duplicates > 0 {
            tracing::warn!(duplicates, "Dropped duplicate candidate ids");
        }
        if let Some(max_docs) = self.settings.max_docs {
            ids.truncate(max_docs);
        }
        let output = self.test_output()?;

        let banner = format!(
            "Starting {} run: {candidates} candidate(s), {} to process, comment {:?}",
            self.settings.mode,
            ids.len(),
            self.settings.comment
        );
        self.note(&banner);
        if duplicates > 0 {
            self.note(&format!("Dropped {duplicates} duplicate candidate id(s)"));
        }

        let mut record = RunRecord::default();
        for id in ids {
            let doc_started = Instant::now();
            let outcome = self.process_document(id, output.as_ref()).await;
            match &outcome {
                DocumentOutcome::Failed(failure) => tracing::error!(%id, "{failure}"),
                other => tracing::info!(%id, "{other}"),
            }
            record.push(id, outcome, doc_started.elapsed());
            if let Some(entry) = record.entries().last() {
                if let Err(err) = self.reporter.document(entry) {
                    tracing::warn!("Could not write run log: {err}");
                }
            }
        }

        let summary = RunSummary {
            mode: self.settings.mode,
            comment: self.settings.comment.clone(),
            candidates,
            duplicates,
            record,
            elapsed: started.elapsed(),
        };
        if let Err(err) = self.reporter.summary(&summary) {
            tracing::warn!("Could not write run summary: {err}");
        }
        Ok(summary)
    }

    /// Check out, correct and release the single document `id`, outside of a batch.
    ///
    /// The job's settings apply as in [`Job::run`], but no selection happens and nothing is
    /// written to the run log. The document's lock is released on every path.
    ///
    /// # Errors
    /// Errors only when the test output directory cannot be prepared. A failure to correct the
    /// document is returned as [`DocumentOutcome::Failed`].
    pub async fn process_one(&self, id: DocId) -> Result<DocumentOutcome, JobError> {
        let output = self.test_output()?;
        Ok(self.process_document(id, output.as_ref()).await)
    }

    /// The artifact directory, when running in test mode with one configured.
    fn test_output(&self) -> Result<Option<TestOutput>, JobError> {
        match (self.settings.mode, &self.settings.output_dir) {
            (RunMode::Test, Some(dir)) => TestOutput::create(dir)
                .map(Some)
                .map_err(JobError::Output),
            _ => Ok(None),
        }
    }

    /// Log a note to the run log, warning if it cannot be written.
    fn note(&mut self, message: &str) {
        if let Err(err) = self.reporter.note(message) {
            tracing::warn!("Could not write run log: {err}");
        }
    }

    /// Check out, correct and release one document.
    #[tracing::instrument(name = "document", skip_all, fields(id = %id))]
    async fn process_document(&self, id: DocId, output: Option<&TestOutput>) -> DocumentOutcome {
        let live = match self.store.checkout(id).await {
            Ok(live) => live,
            Err(StoreError::NotFound(_)) => return DocumentOutcome::SkippedMissing,
            Err(err) => return DocumentOutcome::Failed(DocumentFailure::Checkout(err)),
        };
        let outcome = self
            .correct(&live, output)
            .await
            .unwrap_or_else(DocumentOutcome::Failed);

        match self.store.unlock(id).await {
            Ok(()) => outcome,
            Err(error) if matches!(outcome, DocumentOutcome::Failed(_)) => {
                tracing::error!("Could not release lock: {error}");
                outcome
            }
            Err(error) => DocumentOutcome::Failed(DocumentFailure::Unlock {
                completed: outcome.kind(),
                error,
            }),
        }
    }

    /// Transform every eligible layer of a checked out document, then save the changed ones.
    async fn correct(
        &self,
        live: &LiveCopy,
        output: Option<&TestOutput>,
    ) -> Result<DocumentOutcome, DocumentFailure> {
        let policy = &self.settings.policy;
        let snapshots = if policy.patch_last_snapshot || policy.patch_last_publishable_snapshot {
            self.store
                .last_snapshots(live.id)
                .await
                .map_err(DocumentFailure::Snapshots)?
        } else {
            Snapshots::default()
        };

        let mut changes: Vec<LayerChange> = Vec::new();
        for target in plan_layers(policy, live, snapshots) {
            let body = LayerBody {
                id: live.id,
                layer: target.layer,
                version: target.version,
                doc_type: &live.doc_type,
                title: &live.title,
                xml: &target.xml,
            };
            let validate = self.settings.validate;
            let corrected = transform::transform_checked(self.transformer.as_ref(), &body, validate)
                .map_err(|error| DocumentFailure::Transform {
                    layer: target.layer,
                    error,
                })?;
            if corrected == target.xml {
                tracing::debug!(layer = %target.layer, "Layer already correct");
            } else {
                changes.push((target, corrected));
            }
        }
        if changes.is_empty() {
            return Ok(DocumentOutcome::Unchanged);
        }

        match self.settings.mode {
            RunMode::Test => preview(live.id, &changes, output),
            RunMode::Live => self.save(live.id, &changes).await?,
        }
        Ok(DocumentOutcome::Updated(LayerSet(
            changes.iter().map(|(target, _)| target.layer).collect(),
        )))
    }

    /// Write changed layers, live copy first.
    async fn save(&self, id: DocId, changes: &[LayerChange]) -> Result<(), DocumentFailure> {
        let policy = &self.settings.policy;
        let options = SaveOptions {
            comment: &self.settings.comment,
            create_snapshot: policy.create_new_snapshot_on_save,
            active_status: policy.forced_status(),
        };
        let mut saved = Vec::new();
        for (target, corrected) in changes {
            let result = match target.version {
                None => self
                    .store
                    .save_live(id, corrected, &options)
                    .await
                    .map(|receipt| {
                        if let Some(num) = receipt.promoted_version {
                            tracing::info!(version = num, "Prior live copy kept as a version");
                        }
                        if let Some(num) = receipt.new_version {
                            tracing::info!(version = num, "Created version");
                        }
                    }),
                Some(num) => {
                    self.store
                        .patch_snapshot(id, num, corrected, &self.settings.comment)
                        .await
                }
            };
            if let Err(error) = result {
                return Err(DocumentFailure::Save {
                    layer: target.layer,
                    saved: LayerSet(saved),
                    error,
                });
            }
            tracing::info!(
                layer = %target.layer,
                version = ?target.version,
                old_md5 = %md5::compute(&target.xml),
                new_md5 = %md5::compute(corrected),
                "Saved layer"
            );
            saved.push(target.layer);
        }
        Ok(())
    }
}

/// Log what a live run would save and write the test output artifacts.
fn preview(id: DocId, changes: &[LayerChange], output: Option<&TestOutput>) {
    for (target, corrected) in changes {
        tracing::info!(
            layer = %target.layer,
            version = ?target.version,
            old_md5 = %md5::compute(&target.xml),
            new_md5 = %md5::compute(corrected),
            "Test mode, layer would be saved"
        );
        if let Some(output) = output {
            if let Err(err) = output.write_layer(id, target.layer, &target.xml, corrected) {
                tracing::warn!(layer = %target.layer, "Could not write test output: {err:#}");
            }
        }
    }
}

/// Drop repeated ids, keeping the first occurrence. Returns the ids and how many were dropped.
fn dedupe(ids: Vec<DocId>) -> (Vec<DocId>, usize) {
    let total = ids.len();
    let mut seen = HashSet::new();
    let unique: Vec<DocId> = ids.into_iter().filter(|id| seen.insert(*id)).collect();
    let dropped = total - unique.len();
    (unique, dropped)
}
