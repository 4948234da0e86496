use crate::common::{pending, review_transformer, reviewed, run_job, settings, MemoryStore, Op};
use docbatch::job::{Layer, RunMode, VersionPolicy};
use docbatch::store::DocId;

fn saved(summary: &docbatch::job::RunSummary, id: i64) -> Vec<Layer> {
    summary
        .record
        .outcome_of(DocId(id))
        .unwrap()
        .saved_layers()
        .to_vec()
}

#[async_std::test]
async fn test_run_when_all_layers_differ_expect_each_corrected_in_place() {
    let store = MemoryStore::new();
    store.insert(
        1,
        &pending("cwd"),
        &[
            (true, &pending("v1")),
            (true, &pending("v2")),
            (false, &pending("v3")),
        ],
    );

    let summary = run_job(&store, &[1], review_transformer(), settings(RunMode::Live)).await;

    assert_eq!(
        saved(&summary, 1),
        vec![Layer::Live, Layer::LastSnapshot, Layer::LastPublishable]
    );
    let doc = store.doc(1);
    assert_eq!(doc.xml, reviewed("cwd"));
    // Older history is never touched.
    assert_eq!(doc.versions[0].xml, pending("v1"));
    assert_eq!(doc.versions[1].xml, reviewed("v2"));
    assert_eq!(doc.versions[2].xml, reviewed("v3"));
    // The live save appended a version holding the new body, after the patched ones.
    assert_eq!(doc.versions.len(), 4);
    assert_eq!(doc.versions[3].xml, reviewed("cwd"));
    assert!(!doc.versions[3].publishable);
}

#[async_std::test]
async fn test_run_expect_live_saved_before_snapshots_patched() {
    let store = MemoryStore::new();
    store.insert(1, &pending("cwd"), &[(true, &pending("v1")), (false, &pending("v2"))]);

    run_job(&store, &[1], review_transformer(), settings(RunMode::Live)).await;

    assert_eq!(
        store.writes(),
        vec![
            (Op::SaveLive, DocId(1)),
            (Op::PatchSnapshot, DocId(1)),
            (Op::PatchSnapshot, DocId(1)),
        ]
    );
}

#[async_std::test]
async fn test_run_when_only_a_snapshot_needs_correction_expect_live_not_saved() {
    let store = MemoryStore::new();
    store.insert(1, &reviewed("cwd"), &[(true, &pending("v1"))]);

    let summary = run_job(&store, &[1], review_transformer(), settings(RunMode::Live)).await;

    assert_eq!(saved(&summary, 1), vec![Layer::LastSnapshot]);
    assert_eq!(store.writes(), vec![(Op::PatchSnapshot, DocId(1))]);
    assert_eq!(store.doc(1).versions.len(), 1);
    assert_eq!(store.doc(1).versions[0].xml, reviewed("v1"));
}

#[async_std::test]
async fn test_run_when_snapshot_equals_live_expect_covered_by_live_save() {
    let store = MemoryStore::new();
    store.insert(1, &pending("same"), &[(true, &pending("same"))]);

    let summary = run_job(&store, &[1], review_transformer(), settings(RunMode::Live)).await;

    assert_eq!(saved(&summary, 1), vec![Layer::Live]);
    assert_eq!(store.writes(), vec![(Op::SaveLive, DocId(1))]);
    // The old version stays as it was; the new version carries the correction.
    let doc = store.doc(1);
    assert_eq!(doc.versions[0].xml, pending("same"));
    assert_eq!(doc.versions[1].xml, reviewed("same"));
}

#[async_std::test]
async fn test_run_when_snapshot_patching_disabled_expect_live_only() {
    let store = MemoryStore::new();
    store.insert(1, &pending("cwd"), &[(true, &pending("v1")), (false, &pending("v2"))]);
    let mut job_settings = settings(RunMode::Live);
    job_settings.policy = VersionPolicy::live_only();

    let summary = run_job(&store, &[1], review_transformer(), job_settings).await;

    assert_eq!(saved(&summary, 1), vec![Layer::Live]);
    assert!(!store.calls_for(1).contains(&Op::LastSnapshots));
    let doc = store.doc(1);
    assert_eq!(doc.versions[0].xml, pending("v1"));
    assert_eq!(doc.versions[1].xml, pending("v2"));
}

#[async_std::test]
async fn test_run_when_not_versioning_saves_expect_no_version_for_new_body() {
    let store = MemoryStore::new();
    store.insert(1, &pending("cwd"), &[(true, &pending("cwd"))]);
    let mut job_settings = settings(RunMode::Live);
    job_settings.policy = VersionPolicy {
        create_new_snapshot_on_save: false,
        ..VersionPolicy::default()
    };

    run_job(&store, &[1], review_transformer(), job_settings).await;

    let doc = store.doc(1);
    assert_eq!(doc.xml, reviewed("cwd"));
    assert_eq!(doc.versions.len(), 1);
    assert_eq!(doc.versions[0].xml, pending("cwd"));
}
