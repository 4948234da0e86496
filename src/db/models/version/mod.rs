use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::{any::AnyRow, FromRow, Row as _};

pub mod manager;

/// Trait for managing versions.
#[async_trait]
pub trait Manager {
    /// Find the most recent version of a document.
    async fn find_last(&self, doc_id: i64) -> anyhow::Result<Option<Version>>;
    /// Find the most recent publishable version of a document.
    async fn find_last_publishable(&self, doc_id: i64) -> anyhow::Result<Option<Version>>;
    /// Find all versions of a document, oldest first.
    async fn find_all_by_doc_id(&self, doc_id: i64) -> anyhow::Result<Vec<Version>>;
}

/// Trait for managing transactional versions.
#[async_trait]
pub trait TxManager {
    /// Find the most recent version of a document within the transaction.
    async fn find_latest(&mut self, doc_id: i64) -> anyhow::Result<Option<Version>>;
    /// Append a version with the next free number. Returns the new number.
    async fn insert_next(&mut self, version: &NewVersion<'_>) -> anyhow::Result<i64>;
    /// Rewrite the body of an existing version in place. Returns whether a row was updated.
    async fn update_xml(
        &mut self,
        doc_id: i64,
        num: i64,
        xml: &str,
        comment: &str,
    ) -> anyhow::Result<bool>;
}

#[derive(Deserialize, Serialize, Debug, Clone, Eq, PartialEq)]
/// Model for a historical version of a document.
pub struct Version {
    /// Document the version belongs to.
    pub doc_id: i64,
    /// Version number, strictly increasing per document.
    pub num: i64,
    /// `Y` if the version may be published.
    pub publishable: String,
    /// XML body recorded in this version.
    pub xml: String,
    /// Comment recorded with the version.
    pub comment: Option<String>,
    /// User who saved the version.
    pub saved_by: Option<String>,
    /// When the version was saved, RFC 3339.
    pub saved_at: String,
}

impl Version {
    /// Whether the version is flagged publishable.
    #[must_use]
    pub fn is_publishable(&self) -> bool {
        self.publishable == "Y"
    }
}

impl FromRow<'_, AnyRow> for Version {
    fn from_row(row: &AnyRow) -> anyhow::Result<Self, sqlx::Error> {
        Ok(Self {
            doc_id: row.try_get("doc_id")?,
            num: row.try_get("num")?,
            publishable: row.try_get("publishable")?,
            xml: row.try_get("xml")?,
            comment: row.try_get("comment")?,
            saved_by: row.try_get("saved_by")?,
            saved_at: row.try_get("saved_at")?,
        })
    }
}

/// Values for appending a version.
#[derive(Debug, Clone, Copy)]
pub struct NewVersion<'ver> {
    /// Document the version belongs to.
    pub doc_id: i64,
    /// Whether the version is publishable.
    pub publishable: bool,
    /// XML body.
    pub xml: &'ver str,
    /// Comment recorded with the version.
    pub comment: &'ver str,
    /// User saving the version.
    pub saved_by: &'ver str,
    /// Timestamp, RFC 3339.
    pub saved_at: &'ver str,
}
