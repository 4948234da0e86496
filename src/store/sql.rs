//! Store client over the `SQL` document tables.
use async_trait::async_trait;
use tracing::instrument;

use crate::db::models::document::{self, Document, NewDocument, TxManager as _};
use crate::db::models::version::{self, NewVersion, TxManager as _, Version};
use crate::db::{DatabaseConnection, DatabaseTransaction, Tx as _};

use super::{
    ActiveStatus, DocId, LiveCopy, SaveOptions, SaveReceipt, Snapshot, Snapshots, StoreClient,
    StoreError,
};

/// Comment recorded on a version the store creates on its own to preserve an unversioned
/// live copy before overwriting it.
pub const PROMOTION_COMMENT: &str = "Preserving unversioned working copy before save";

/// A [`StoreClient`] acting as `user` against a [`DatabaseConnection`].
#[derive(Debug, Clone)]
pub struct SqlStore {
    /// Database connection.
    conn: DatabaseConnection,
    /// User that owns check-outs and saves.
    user: String,
}

impl SqlStore {
    /// Create a client acting as `user`.
    #[must_use]
    pub fn new<U: Into<String>>(conn: DatabaseConnection, user: U) -> Self {
        Self {
            conn,
            user: user.into(),
        }
    }

    /// The underlying connection.
    #[must_use]
    pub const fn connection(&self) -> &DatabaseConnection {
        &self.conn
    }

    /// Insert a new, unversioned document.
    ///
    /// # Errors
    /// Errors if the insert fails, e.g. the id is already taken.
    pub async fn create_document(&self, new_document: &NewDocument<'_>) -> anyhow::Result<()> {
        let mut tx = self.conn.begin().await?;
        tx.create(new_document).await?;
        tx.commit().await
    }

    /// Append a version to a document's history, outside of any check-out.
    ///
    /// Used to seed stores and by administrative tooling.
    ///
    /// # Errors
    /// Errors if the insert fails.
    pub async fn append_version(
        &self,
        id: DocId,
        xml: &str,
        publishable: bool,
        comment: &str,
    ) -> anyhow::Result<i64> {
        let saved_at = now();
        let mut tx = self.conn.begin().await?;
        let num = tx
            .insert_next(&NewVersion {
                doc_id: id.0,
                publishable,
                xml,
                comment,
                saved_by: &self.user,
                saved_at: &saved_at,
            })
            .await?;
        tx.commit().await?;
        Ok(num)
    }

    /// Fetch the live copy without checking it out.
    ///
    /// # Errors
    /// Errors if the query fails.
    pub async fn find_document(&self, id: DocId) -> anyhow::Result<Option<Document>> {
        document::Manager::find_by_id(&self.conn, id.0).await
    }

    /// Fetch all versions of a document, oldest first.
    ///
    /// # Errors
    /// Errors if the query fails.
    pub async fn find_versions(&self, id: DocId) -> anyhow::Result<Vec<Version>> {
        version::Manager::find_all_by_doc_id(&self.conn, id.0).await
    }

    /// Ids of all documents this client's user currently has checked out.
    ///
    /// # Errors
    /// Errors if the query fails.
    pub async fn held_locks(&self) -> anyhow::Result<Vec<DocId>> {
        let ids = document::Manager::find_ids_locked_by(&self.conn, &self.user).await?;
        Ok(ids.into_iter().map(DocId).collect())
    }

    /// Load the document inside `tx` and make sure this user holds its lock.
    async fn locked_document(
        &self,
        tx: &mut DatabaseTransaction,
        id: DocId,
    ) -> Result<Document, StoreError> {
        let doc = tx
            .find_for_update(id.0)
            .await?
            .ok_or(StoreError::NotFound(id))?;
        if doc.locked_by.as_deref() == Some(self.user.as_str()) {
            Ok(doc)
        } else {
            Err(StoreError::NotCheckedOut {
                id,
                user: self.user.clone(),
            })
        }
    }
}

#[async_trait]
impl StoreClient for SqlStore {
    #[instrument(level = "debug", skip(self), fields(user = %self.user))]
    async fn checkout(&self, id: DocId) -> Result<LiveCopy, StoreError> {
        let mut tx = self.conn.begin().await?;
        let doc = tx
            .find_for_update(id.0)
            .await?
            .ok_or(StoreError::NotFound(id))?;
        let active_status = ActiveStatus::from_code(&doc.active_status)?;
        if !tx.acquire_lock(id.0, &self.user, &now()).await? {
            return Err(StoreError::Locked {
                id,
                owner: doc.locked_by.unwrap_or_default(),
            });
        }
        tx.commit().await?;
        Ok(LiveCopy {
            id,
            title: doc.title,
            doc_type: doc.doc_type,
            xml: doc.xml,
            active_status,
            locked_by: Some(self.user.clone()),
        })
    }

    #[instrument(level = "debug", skip(self))]
    async fn last_snapshots(&self, id: DocId) -> Result<Snapshots, StoreError> {
        let last = version::Manager::find_last(&self.conn, id.0).await?;
        let last_publishable = version::Manager::find_last_publishable(&self.conn, id.0).await?;
        Ok(Snapshots {
            last: last.map(snapshot_from),
            last_publishable: last_publishable.map(snapshot_from),
        })
    }

    /// Without `create_snapshot` the store still keeps history intact: a live copy whose body
    /// was never recorded in a version is first promoted into a new, non-publishable version.
    #[instrument(
        level = "debug",
        skip(self, xml, options),
        fields(create_snapshot = options.create_snapshot)
    )]
    async fn save_live(
        &self,
        id: DocId,
        xml: &str,
        options: &SaveOptions<'_>,
    ) -> Result<SaveReceipt, StoreError> {
        let saved_at = now();
        let mut tx = self.conn.begin().await?;
        let doc = self.locked_document(&mut tx, id).await?;
        let mut receipt = SaveReceipt::default();

        if !options.create_snapshot {
            let unversioned = tx
                .find_latest(id.0)
                .await?
                .map_or(true, |last| last.xml != doc.xml);
            if unversioned {
                let num = tx
                    .insert_next(&NewVersion {
                        doc_id: id.0,
                        publishable: false,
                        xml: &doc.xml,
                        comment: PROMOTION_COMMENT,
                        saved_by: &self.user,
                        saved_at: &saved_at,
                    })
                    .await?;
                tracing::debug!(%id, num, "Promoted unversioned live copy");
                receipt.promoted_version = Some(num);
            }
        }

        tx.update_live(
            id.0,
            xml,
            options.comment,
            options.active_status.map(ActiveStatus::code),
        )
        .await?;

        if options.create_snapshot {
            let num = tx
                .insert_next(&NewVersion {
                    doc_id: id.0,
                    publishable: false,
                    xml,
                    comment: options.comment,
                    saved_by: &self.user,
                    saved_at: &saved_at,
                })
                .await?;
            receipt.new_version = Some(num);
        }
        tx.commit().await?;
        Ok(receipt)
    }

    #[instrument(level = "debug", skip(self, xml, comment))]
    async fn patch_snapshot(
        &self,
        id: DocId,
        num: i64,
        xml: &str,
        comment: &str,
    ) -> Result<(), StoreError> {
        let mut tx = self.conn.begin().await?;
        self.locked_document(&mut tx, id).await?;
        if !tx.update_xml(id.0, num, xml, comment).await? {
            return Err(StoreError::Rejected {
                id,
                reason: format!("version {num} does not exist"),
            });
        }
        tx.commit().await?;
        Ok(())
    }

    #[instrument(level = "debug", skip(self), fields(user = %self.user))]
    async fn unlock(&self, id: DocId) -> Result<(), StoreError> {
        let mut tx = self.conn.begin().await?;
        if tx.release_lock(id.0, &self.user).await? {
            tx.commit().await?;
            return Ok(());
        }
        match tx.find_for_update(id.0).await? {
            None => Err(StoreError::NotFound(id)),
            Some(Document {
                locked_by: Some(owner),
                ..
            }) => Err(StoreError::Locked { id, owner }),
            Some(_) => Err(StoreError::NotCheckedOut {
                id,
                user: self.user.clone(),
            }),
        }
    }
}

/// Map a version row to the store's snapshot type.
fn snapshot_from(version: Version) -> Snapshot {
    Snapshot {
        num: version.num,
        publishable: version.is_publishable(),
        xml: version.xml,
    }
}

/// Current time, RFC 3339.
fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}
