use crate::common::{self, pending, review_transformer, reviewed, seed_document, sql_store};
use docbatch::job::{Job, JobSettings, QuerySelector, RunMode};
use docbatch::db::init;
use docbatch::report::Reporter;
use docbatch::store::sql::PROMOTION_COMMENT;
use docbatch::store::{ActiveStatus, DocId, SaveOptions, SqlStore, StoreClient, StoreError};
use std::sync::Arc;

fn options(create_snapshot: bool) -> SaveOptions<'static> {
    SaveOptions {
        comment: common::COMMENT,
        create_snapshot,
        active_status: None,
    }
}

#[async_std::test]
async fn test_checkout_when_missing_expect_not_found() {
    let (_dir, store) = sql_store("alice").await;
    let actual = store.checkout(DocId(9)).await.unwrap_err();
    assert!(matches!(actual, StoreError::NotFound(DocId(9))));
}

#[async_std::test]
async fn test_checkout_when_locked_by_other_user_expect_locked_with_owner() {
    let (_dir, alice) = sql_store("alice").await;
    seed_document(&alice, 1, &pending("a")).await;
    let bob = SqlStore::new(alice.connection().clone(), "bob");

    let live = alice.checkout(DocId(1)).await.unwrap();
    assert_eq!(live.xml, pending("a"));
    assert_eq!(live.active_status, ActiveStatus::Active);
    assert_eq!(live.locked_by.as_deref(), Some("alice"));

    let actual = bob.checkout(DocId(1)).await.unwrap_err();
    let expected = "CDR0000000001 is checked out by alice";
    assert!(
        actual.to_string().contains(expected),
        "\"{actual}\" doesn't contain {expected}"
    );
    assert_eq!(alice.held_locks().await.unwrap(), vec![DocId(1)]);
    assert!(bob.held_locks().await.unwrap().is_empty());
}

#[async_std::test]
async fn test_checkout_when_already_held_by_same_user_expect_locked() {
    let (_dir, store) = sql_store("alice").await;
    seed_document(&store, 1, &pending("a")).await;
    store.checkout(DocId(1)).await.unwrap();
    let actual = store.checkout(DocId(1)).await.unwrap_err();
    assert!(matches!(actual, StoreError::Locked { ref owner, .. } if owner == "alice"));
}

#[async_std::test]
async fn test_save_live_when_versioning_expect_sequential_version_numbers() {
    let (_dir, store) = sql_store("alice").await;
    seed_document(&store, 1, &pending("a")).await;
    store.checkout(DocId(1)).await.unwrap();

    let first = store.save_live(DocId(1), &reviewed("a"), &options(true)).await.unwrap();
    let second = store.save_live(DocId(1), &reviewed("b"), &options(true)).await.unwrap();

    assert_eq!(first.new_version, Some(1));
    assert_eq!(second.new_version, Some(2));
    assert_eq!(second.promoted_version, None);
    let versions = store.find_versions(DocId(1)).await.unwrap();
    assert_eq!(versions.len(), 2);
    assert_eq!(versions[1].xml, reviewed("b"));
    assert!(!versions[1].is_publishable());
    assert_eq!(versions[1].saved_by.as_deref(), Some("alice"));
    let doc = store.find_document(DocId(1)).await.unwrap().unwrap();
    assert_eq!(doc.xml, reviewed("b"));
    assert_eq!(doc.comment.as_deref(), Some(common::COMMENT));
}

#[async_std::test]
async fn test_save_live_when_not_versioning_and_unversioned_expect_prior_body_promoted() {
    let (_dir, store) = sql_store("alice").await;
    seed_document(&store, 1, &pending("a")).await;
    store.checkout(DocId(1)).await.unwrap();

    let receipt = store.save_live(DocId(1), &reviewed("a"), &options(false)).await.unwrap();

    assert_eq!(receipt.promoted_version, Some(1));
    assert_eq!(receipt.new_version, None);
    let versions = store.find_versions(DocId(1)).await.unwrap();
    assert_eq!(versions.len(), 1);
    assert_eq!(versions[0].xml, pending("a"));
    assert_eq!(versions[0].comment.as_deref(), Some(PROMOTION_COMMENT));
    let doc = store.find_document(DocId(1)).await.unwrap().unwrap();
    assert_eq!(doc.xml, reviewed("a"));
}

#[async_std::test]
async fn test_save_live_when_not_versioning_and_live_matches_last_version_expect_no_promotion() {
    let (_dir, store) = sql_store("alice").await;
    seed_document(&store, 1, &pending("a")).await;
    store.append_version(DocId(1), &pending("a"), true, "seed").await.unwrap();
    store.checkout(DocId(1)).await.unwrap();

    let receipt = store.save_live(DocId(1), &reviewed("a"), &options(false)).await.unwrap();

    assert_eq!(receipt, docbatch::store::SaveReceipt::default());
    assert_eq!(store.find_versions(DocId(1)).await.unwrap().len(), 1);
}

#[async_std::test]
async fn test_save_live_when_blocking_expect_inactive_status() {
    let (_dir, store) = sql_store("alice").await;
    seed_document(&store, 1, &pending("a")).await;
    store.checkout(DocId(1)).await.unwrap();
    let blocking = SaveOptions {
        active_status: Some(ActiveStatus::Blocked),
        ..options(true)
    };

    store.save_live(DocId(1), &reviewed("a"), &blocking).await.unwrap();

    let doc = store.find_document(DocId(1)).await.unwrap().unwrap();
    assert_eq!(doc.active_status, "I");
}

#[async_std::test]
async fn test_save_live_when_not_checked_out_expect_error_and_no_change() {
    let (_dir, store) = sql_store("alice").await;
    seed_document(&store, 1, &pending("a")).await;

    let actual = store
        .save_live(DocId(1), &reviewed("a"), &options(true))
        .await
        .unwrap_err();

    assert!(matches!(actual, StoreError::NotCheckedOut { .. }));
    let doc = store.find_document(DocId(1)).await.unwrap().unwrap();
    assert_eq!(doc.xml, pending("a"));
    assert!(store.find_versions(DocId(1)).await.unwrap().is_empty());
}

#[async_std::test]
async fn test_last_snapshots_expect_last_and_last_publishable() {
    let (_dir, store) = sql_store("alice").await;
    seed_document(&store, 1, &pending("a")).await;
    assert_eq!(
        store.last_snapshots(DocId(1)).await.unwrap(),
        docbatch::store::Snapshots::default()
    );
    store.append_version(DocId(1), &pending("v1"), true, "seed").await.unwrap();
    store.append_version(DocId(1), &pending("v2"), true, "seed").await.unwrap();
    store.append_version(DocId(1), &pending("v3"), false, "seed").await.unwrap();

    let snapshots = store.last_snapshots(DocId(1)).await.unwrap();

    let last = snapshots.last.unwrap();
    let publishable = snapshots.last_publishable.unwrap();
    assert_eq!((last.num, last.publishable), (3, false));
    assert_eq!((publishable.num, publishable.xml), (2, pending("v2")));
}

#[async_std::test]
async fn test_patch_snapshot_expect_body_replaced_in_place() {
    let (_dir, store) = sql_store("alice").await;
    seed_document(&store, 1, &pending("a")).await;
    store.append_version(DocId(1), &pending("v1"), true, "seed").await.unwrap();
    store.checkout(DocId(1)).await.unwrap();

    store
        .patch_snapshot(DocId(1), 1, &reviewed("v1"), common::COMMENT)
        .await
        .unwrap();

    let versions = store.find_versions(DocId(1)).await.unwrap();
    assert_eq!(versions.len(), 1);
    assert_eq!(versions[0].num, 1);
    assert_eq!(versions[0].xml, reviewed("v1"));
    assert!(versions[0].is_publishable());
}

#[async_std::test]
async fn test_patch_snapshot_when_version_missing_expect_rejected() {
    let (_dir, store) = sql_store("alice").await;
    seed_document(&store, 1, &pending("a")).await;
    store.checkout(DocId(1)).await.unwrap();

    let actual = store
        .patch_snapshot(DocId(1), 7, &reviewed("v7"), common::COMMENT)
        .await
        .unwrap_err();

    let expected = "version 7 does not exist";
    assert!(
        actual.to_string().contains(expected),
        "\"{actual}\" doesn't contain {expected}"
    );
}

#[async_std::test]
async fn test_unlock_expect_release_only_by_owner() {
    let (_dir, alice) = sql_store("alice").await;
    seed_document(&alice, 1, &pending("a")).await;
    let bob = SqlStore::new(alice.connection().clone(), "bob");

    assert!(matches!(
        alice.unlock(DocId(1)).await.unwrap_err(),
        StoreError::NotCheckedOut { .. }
    ));
    assert!(matches!(
        alice.unlock(DocId(2)).await.unwrap_err(),
        StoreError::NotFound(DocId(2))
    ));

    alice.checkout(DocId(1)).await.unwrap();
    assert!(matches!(
        bob.unlock(DocId(1)).await.unwrap_err(),
        StoreError::Locked { ref owner, .. } if owner == "alice"
    ));
    alice.unlock(DocId(1)).await.unwrap();
    assert!(alice.held_locks().await.unwrap().is_empty());
    bob.checkout(DocId(1)).await.unwrap();
}

#[async_std::test]
async fn test_job_over_sql_store_with_query_selector_expect_layers_corrected() {
    let (_dir, store) = sql_store("batch").await;
    seed_document(&store, 1, &pending("a")).await;
    store.append_version(DocId(1), &pending("v1"), true, "seed").await.unwrap();
    seed_document(&store, 2, &reviewed("b")).await;
    seed_document(&store, 3, &pending("c")).await;
    let selector = QuerySelector::new(
        store.connection().clone(),
        "SELECT id FROM document WHERE xml LIKE '%Pending%' ORDER BY id DESC",
    );
    let store = Arc::new(store);
    let settings = JobSettings {
        mode: RunMode::Live,
        comment: common::COMMENT.to_owned(),
        ..JobSettings::default()
    };

    let summary = Job::new(
        store.clone(),
        Box::new(selector),
        review_transformer(),
        settings,
        Reporter::discard(),
    )
    .run()
    .await
    .unwrap();

    let order: Vec<DocId> = summary.record.entries().iter().map(|entry| entry.id).collect();
    assert_eq!(order, vec![DocId(3), DocId(1)]);
    assert_eq!(summary.counts().updated_with_snapshots, 1);
    assert_eq!(summary.counts().updated_live_only, 1);
    let versions = store.find_versions(DocId(1)).await.unwrap();
    assert_eq!(versions[0].xml, reviewed("v1"));
    assert_eq!(versions[1].xml, reviewed("a"));
    assert!(store.held_locks().await.unwrap().is_empty());
}

#[async_std::test]
async fn test_connect_when_in_memory_url_expect_one_shared_migrated_database() {
    common::initialize();
    let conn = init::connect_url("sqlite::memory:").await.unwrap();
    let alice = SqlStore::new(conn.clone(), "alice");
    let bob = SqlStore::new(conn, "bob");
    seed_document(&alice, 1, &pending("a")).await;

    let readers: Vec<_> = (0..8)
        .map(|_| {
            let reader = SqlStore::new(alice.connection().clone(), "reader");
            async_std::task::spawn(async move { reader.find_document(DocId(1)).await })
        })
        .collect();
    for reader in readers {
        assert_eq!(reader.await.unwrap().unwrap().xml, pending("a"));
    }
    alice.checkout(DocId(1)).await.unwrap();
    assert!(matches!(
        bob.checkout(DocId(1)).await.unwrap_err(),
        StoreError::Locked { ref owner, .. } if owner == "alice"
    ));
}
