use async_trait::async_trait;
use docbatch::db::init;
use docbatch::db::models::document::NewDocument;
use docbatch::job::{
    IdListSelector, Job, JobSettings, RegexTransformer, RunMode, RunSummary, Selector, Transformer,
};
use docbatch::report::Reporter;
use docbatch::store::{
    ActiveStatus, DocId, LiveCopy, SaveOptions, SaveReceipt, Snapshot, Snapshots, SqlStore,
    StoreClient, StoreError,
};
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, Once};
use tempfile::TempDir;

static INIT: Once = Once::new();

pub const USER: &str = "batch-user";
pub const COMMENT: &str = "Request 3724: review pending statuses";

pub fn initialize() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    });
}

/// Marks pending statuses as reviewed. Already reviewed bodies come back unchanged.
pub fn review_transformer() -> Box<dyn Transformer> {
    let rules = [("<Status>Pending</Status>", "<Status>Reviewed</Status>")];
    Box::new(RegexTransformer::new(rules).unwrap())
}

pub fn pending(tag: &str) -> String {
    format!("<Term><Name>{tag}</Name><Status>Pending</Status></Term>")
}

pub fn reviewed(tag: &str) -> String {
    format!("<Term><Name>{tag}</Name><Status>Reviewed</Status></Term>")
}

pub fn settings(mode: RunMode) -> JobSettings {
    JobSettings {
        mode,
        comment: COMMENT.to_owned(),
        ..JobSettings::default()
    }
}

pub async fn run_job(
    store: &Arc<MemoryStore>,
    ids: &[i64],
    transformer: Box<dyn Transformer>,
    settings: JobSettings,
) -> RunSummary {
    let selector = IdListSelector::new(ids.iter().copied().map(DocId));
    run_with_selector(store, Box::new(selector), transformer, settings).await
}

pub async fn run_with_selector(
    store: &Arc<MemoryStore>,
    selector: Box<dyn Selector>,
    transformer: Box<dyn Transformer>,
    settings: JobSettings,
) -> RunSummary {
    initialize();
    Job::new(store.clone(), selector, transformer, settings, Reporter::discard())
        .run()
        .await
        .unwrap()
}

/// A selector whose query always fails.
pub struct FailingSelector;

#[async_trait]
impl Selector for FailingSelector {
    async fn select_candidates(&self) -> anyhow::Result<Vec<DocId>> {
        anyhow::bail!("no such table: documents")
    }
}

/// Store operations, as recorded by [`MemoryStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Checkout,
    LastSnapshots,
    SaveLive,
    PatchSnapshot,
    Unlock,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredVersion {
    pub num: i64,
    pub publishable: bool,
    pub xml: String,
    pub comment: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredDoc {
    pub xml: String,
    pub active_status: ActiveStatus,
    pub locked_by: Option<String>,
    pub comment: Option<String>,
    pub versions: Vec<StoredVersion>,
}

#[derive(Default)]
struct State {
    docs: BTreeMap<DocId, StoredDoc>,
    calls: Vec<(Op, DocId)>,
    failures: HashSet<(Op, DocId)>,
    peak_locks: usize,
}

impl State {
    fn locks_held_by(&self, user: &str) -> usize {
        self.docs
            .values()
            .filter(|doc| doc.locked_by.as_deref() == Some(user))
            .count()
    }

    fn locked_doc(&mut self, id: DocId, user: &str) -> Result<&mut StoredDoc, StoreError> {
        let doc = self.docs.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        if doc.locked_by.as_deref() == Some(user) {
            Ok(doc)
        } else {
            Err(StoreError::NotCheckedOut {
                id,
                user: user.to_owned(),
            })
        }
    }
}

/// In-memory store that records every call and can be told to fail.
pub struct MemoryStore {
    user: String,
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            user: USER.to_owned(),
            state: Mutex::new(State::default()),
        })
    }

    /// Add a document. `versions` are `(publishable, xml)` pairs, oldest first.
    pub fn insert(&self, id: i64, live: &str, versions: &[(bool, &str)]) {
        let versions = versions
            .iter()
            .zip(1..)
            .map(|((publishable, xml), num)| StoredVersion {
                num,
                publishable: *publishable,
                xml: (*xml).to_owned(),
                comment: "seed".to_owned(),
            })
            .collect();
        self.state.lock().unwrap().docs.insert(
            DocId(id),
            StoredDoc {
                xml: live.to_owned(),
                active_status: ActiveStatus::Active,
                locked_by: None,
                comment: None,
                versions,
            },
        );
    }

    pub fn lock_as(&self, id: i64, owner: &str) {
        let mut state = self.state.lock().unwrap();
        state.docs.get_mut(&DocId(id)).unwrap().locked_by = Some(owner.to_owned());
    }

    pub fn fail_on(&self, op: Op, id: i64) {
        self.state.lock().unwrap().failures.insert((op, DocId(id)));
    }

    pub fn doc(&self, id: i64) -> StoredDoc {
        self.state.lock().unwrap().docs[&DocId(id)].clone()
    }

    pub fn calls(&self) -> Vec<(Op, DocId)> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn calls_for(&self, id: i64) -> Vec<Op> {
        self.calls()
            .into_iter()
            .filter(|(_, doc)| *doc == DocId(id))
            .map(|(op, _)| op)
            .collect()
    }

    /// Saves and patches, in call order.
    pub fn writes(&self) -> Vec<(Op, DocId)> {
        self.calls()
            .into_iter()
            .filter(|(op, _)| matches!(op, Op::SaveLive | Op::PatchSnapshot))
            .collect()
    }

    pub fn held_locks(&self) -> Vec<DocId> {
        let state = self.state.lock().unwrap();
        state
            .docs
            .iter()
            .filter(|(_, doc)| doc.locked_by.as_deref() == Some(self.user.as_str()))
            .map(|(id, _)| *id)
            .collect()
    }

    /// Most locks this store's user ever held at once.
    pub fn peak_locks(&self) -> usize {
        self.state.lock().unwrap().peak_locks
    }

    /// Record the call and return the injected failure, if any.
    fn enter(&self, op: Op, id: DocId) -> Result<std::sync::MutexGuard<'_, State>, StoreError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push((op, id));
        if state.failures.contains(&(op, id)) {
            return Err(StoreError::Backend(anyhow::anyhow!(
                "injected {op:?} failure"
            )));
        }
        Ok(state)
    }
}

#[async_trait]
impl StoreClient for MemoryStore {
    async fn checkout(&self, id: DocId) -> Result<LiveCopy, StoreError> {
        let mut state = self.enter(Op::Checkout, id)?;
        let doc = state.docs.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        if let Some(owner) = &doc.locked_by {
            return Err(StoreError::Locked {
                id,
                owner: owner.clone(),
            });
        }
        doc.locked_by = Some(self.user.clone());
        let live = LiveCopy {
            id,
            title: format!("Document {}", id.0),
            doc_type: "Term".to_owned(),
            xml: doc.xml.clone(),
            active_status: doc.active_status,
            locked_by: doc.locked_by.clone(),
        };
        let held = state.locks_held_by(&self.user);
        state.peak_locks = state.peak_locks.max(held);
        Ok(live)
    }

    async fn last_snapshots(&self, id: DocId) -> Result<Snapshots, StoreError> {
        let state = self.enter(Op::LastSnapshots, id)?;
        let doc = state.docs.get(&id).ok_or(StoreError::NotFound(id))?;
        let snapshot = |version: &StoredVersion| Snapshot {
            num: version.num,
            publishable: version.publishable,
            xml: version.xml.clone(),
        };
        Ok(Snapshots {
            last: doc.versions.last().map(snapshot),
            last_publishable: doc
                .versions
                .iter()
                .rev()
                .find(|version| version.publishable)
                .map(snapshot),
        })
    }

    async fn save_live(
        &self,
        id: DocId,
        xml: &str,
        options: &SaveOptions<'_>,
    ) -> Result<SaveReceipt, StoreError> {
        let mut state = self.enter(Op::SaveLive, id)?;
        let doc = state.locked_doc(id, &self.user)?;
        let mut receipt = SaveReceipt::default();
        if !options.create_snapshot
            && doc.versions.last().map_or(true, |last| last.xml != doc.xml)
        {
            let num = i64::try_from(doc.versions.len()).unwrap() + 1;
            doc.versions.push(StoredVersion {
                num,
                publishable: false,
                xml: doc.xml.clone(),
                comment: "promoted".to_owned(),
            });
            receipt.promoted_version = Some(num);
        }
        doc.xml = xml.to_owned();
        doc.comment = Some(options.comment.to_owned());
        if let Some(status) = options.active_status {
            doc.active_status = status;
        }
        if options.create_snapshot {
            let num = i64::try_from(doc.versions.len()).unwrap() + 1;
            doc.versions.push(StoredVersion {
                num,
                publishable: false,
                xml: xml.to_owned(),
                comment: options.comment.to_owned(),
            });
            receipt.new_version = Some(num);
        }
        Ok(receipt)
    }

    async fn patch_snapshot(
        &self,
        id: DocId,
        num: i64,
        xml: &str,
        comment: &str,
    ) -> Result<(), StoreError> {
        let mut state = self.enter(Op::PatchSnapshot, id)?;
        let doc = state.locked_doc(id, &self.user)?;
        let version = doc
            .versions
            .iter_mut()
            .find(|version| version.num == num)
            .ok_or_else(|| StoreError::Rejected {
                id,
                reason: format!("version {num} does not exist"),
            })?;
        version.xml = xml.to_owned();
        version.comment = comment.to_owned();
        Ok(())
    }

    async fn unlock(&self, id: DocId) -> Result<(), StoreError> {
        let mut state = self.enter(Op::Unlock, id)?;
        let doc = state.locked_doc(id, &self.user)?;
        doc.locked_by = None;
        Ok(())
    }
}

/// A migrated `SQLite` store in a temporary directory, acting as `user`.
pub async fn sql_store(user: &str) -> (TempDir, SqlStore) {
    initialize();
    let dir = tempfile::tempdir().unwrap();
    let url = init::sqlite_url(&dir.path().join("store.sqlite3"));
    let conn = init::connect_url(&url).await.unwrap();
    (dir, SqlStore::new(conn, user))
}

pub async fn seed_document(store: &SqlStore, id: i64, xml: &str) {
    store
        .create_document(&NewDocument {
            id,
            title: "Aspirin",
            doc_type: "Term",
            xml,
        })
        .await
        .unwrap();
}
