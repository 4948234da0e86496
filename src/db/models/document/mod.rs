use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::{any::AnyRow, FromRow, Row as _};

pub mod manager;

/// Trait for managing documents.
#[async_trait]
pub trait Manager {
    /// Find a document's live copy by id.
    async fn find_by_id(&self, id: i64) -> anyhow::Result<Option<Document>>;
    /// Find the ids of all documents currently checked out by `user`.
    async fn find_ids_locked_by(&self, user: &str) -> anyhow::Result<Vec<i64>>;
}

/// Trait for managing transactional documents.
#[async_trait]
pub trait TxManager {
    /// Insert a new document's live copy.
    async fn create(&mut self, document: &NewDocument<'_>) -> anyhow::Result<()>;
    /// Find a document's live copy by id within the transaction.
    async fn find_for_update(&mut self, id: i64) -> anyhow::Result<Option<Document>>;
    /// Take the lock on an unlocked document. Returns whether the lock was taken.
    async fn acquire_lock(&mut self, id: i64, user: &str, at: &str) -> anyhow::Result<bool>;
    /// Release a lock held by `user`. Returns whether a lock was released.
    async fn release_lock(&mut self, id: i64, user: &str) -> anyhow::Result<bool>;
    /// Overwrite the live copy body, optionally changing the active status.
    async fn update_live(
        &mut self,
        id: i64,
        xml: &str,
        comment: &str,
        active_status: Option<&str>,
    ) -> anyhow::Result<()>;
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
/// Model for a document's live copy.
pub struct Document {
    /// Numeric document identifier.
    pub id: i64,
    /// Human readable title.
    pub title: String,
    /// Document type name, e.g. `Term` or `Summary`.
    pub doc_type: String,
    /// Current working XML.
    pub xml: String,
    /// `A` for active, `I` for blocked.
    pub active_status: String,
    /// User currently holding the check-out lock.
    pub locked_by: Option<String>,
    /// When the lock was taken, RFC 3339.
    pub locked_at: Option<String>,
    /// Comment recorded with the last save.
    pub comment: Option<String>,
}

impl FromRow<'_, AnyRow> for Document {
    fn from_row(row: &AnyRow) -> anyhow::Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            title: row.try_get("title")?,
            doc_type: row.try_get("doc_type")?,
            xml: row.try_get("xml")?,
            active_status: row.try_get("active_status")?,
            locked_by: row.try_get("locked_by")?,
            locked_at: row.try_get("locked_at")?,
            comment: row.try_get("comment")?,
        })
    }
}

/// Values for inserting a document.
#[derive(Debug, Clone, Copy)]
pub struct NewDocument<'doc> {
    /// Numeric document identifier.
    pub id: i64,
    /// Human readable title.
    pub title: &'doc str,
    /// Document type name.
    pub doc_type: &'doc str,
    /// Initial working XML.
    pub xml: &'doc str,
}
