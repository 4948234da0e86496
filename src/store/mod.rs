//! The document store boundary.
//!
//! A document has one mutable live copy and any number of immutable historical versions. The
//! [`StoreClient`] trait exposes exactly the operations a correction job needs: check out a
//! document, look at its last two interesting versions, save the live copy, rewrite a version
//! in place, and release the check-out again.

use async_trait::async_trait;
use derive_more::Display;
use serde_derive::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// `SQL` implementation of the store client.
pub mod sql;

pub use sql::SqlStore;

/// Stable numeric identifier of a document.
///
/// Displayed in the store's canonical form, `CDR` followed by ten zero padded digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocId(pub i64);

impl fmt::Display for DocId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CDR{:010}", self.0)
    }
}

impl From<i64> for DocId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl FromStr for DocId {
    type Err = anyhow::Error;

    /// Accepts `CDR0000012345`, `cdr12345` or a bare `12345`.
    fn from_str(raw: &str) -> anyhow::Result<Self> {
        let trimmed = raw.trim();
        let digits = trimmed
            .get(..3)
            .filter(|prefix| prefix.eq_ignore_ascii_case("cdr"))
            .and_then(|_| trimmed.get(3..))
            .unwrap_or(trimmed);
        let id: i64 = digits
            .parse()
            .map_err(|_| anyhow::anyhow!("invalid document id: {raw:?}"))?;
        if id <= 0 {
            anyhow::bail!("invalid document id: {raw:?}");
        }
        Ok(Self(id))
    }
}

/// Whether a document is active or blocked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ActiveStatus {
    /// Document is active.
    #[display(fmt = "A")]
    Active,
    /// Document is blocked.
    #[display(fmt = "I")]
    Blocked,
}

impl ActiveStatus {
    /// The single letter code stored in the database.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Active => "A",
            Self::Blocked => "I",
        }
    }

    /// Parse the stored single letter code.
    ///
    /// # Errors
    /// Errors on anything but `A` or `I`.
    pub fn from_code(code: &str) -> anyhow::Result<Self> {
        match code {
            "A" => Ok(Self::Active),
            "I" => Ok(Self::Blocked),
            other => anyhow::bail!("unknown active status code: {other:?}"),
        }
    }
}

/// The current working copy of a document, as returned by a check-out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveCopy {
    /// Document identifier.
    pub id: DocId,
    /// Human readable title.
    pub title: String,
    /// Document type name.
    pub doc_type: String,
    /// Current working XML.
    pub xml: String,
    /// Active or blocked.
    pub active_status: ActiveStatus,
    /// Lock owner, set once checked out.
    pub locked_by: Option<String>,
}

/// A historical version of a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// Version number.
    pub num: i64,
    /// Whether the version may be published.
    pub publishable: bool,
    /// XML body recorded in the version.
    pub xml: String,
}

/// The two versions a correction job may patch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshots {
    /// The most recent version, if the document was ever versioned.
    pub last: Option<Snapshot>,
    /// The most recent publishable version. May be the same version as `last`.
    pub last_publishable: Option<Snapshot>,
}

/// How to save a live copy.
#[derive(Debug, Clone, Copy)]
pub struct SaveOptions<'opt> {
    /// Comment recorded with the save.
    pub comment: &'opt str,
    /// Also append a new version holding the saved body.
    pub create_snapshot: bool,
    /// Force the document's active status. `None` leaves it unchanged.
    pub active_status: Option<ActiveStatus>,
}

/// What a live save did to the version history.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaveReceipt {
    /// Version number allocated for the saved body, if one was requested.
    pub new_version: Option<i64>,
    /// Version number the store allocated on its own for the prior live copy.
    pub promoted_version: Option<i64>,
}

/// Errors reported by a store client.
#[derive(Debug, Display)]
pub enum StoreError {
    /// The document does not exist.
    #[display(fmt = "{} not found", _0)]
    NotFound(DocId),
    /// Somebody already holds the check-out lock.
    #[display(fmt = "{} is checked out by {}", id, owner)]
    Locked {
        /// Document identifier.
        id: DocId,
        /// Current lock owner.
        owner: String,
    },
    /// A write or release was attempted without holding the lock.
    #[display(fmt = "{} is not checked out by {}", id, user)]
    NotCheckedOut {
        /// Document identifier.
        id: DocId,
        /// User attempting the operation.
        user: String,
    },
    /// The store refused the operation.
    #[display(fmt = "{} rejected: {}", id, reason)]
    Rejected {
        /// Document identifier.
        id: DocId,
        /// Reason given by the store.
        reason: String,
    },
    /// Transport or database failure.
    #[display(fmt = "store backend error: {:#}", _0)]
    Backend(anyhow::Error),
}

impl std::error::Error for StoreError {}

impl From<anyhow::Error> for StoreError {
    fn from(err: anyhow::Error) -> Self {
        Self::Backend(err)
    }
}

/// Operations a correction job performs against the document store.
///
/// A client acts on behalf of one user. Every write requires that user to hold the
/// document's check-out lock.
#[async_trait]
pub trait StoreClient: Send + Sync {
    /// Lock the document for this client's user and return its live copy.
    ///
    /// # Errors
    /// [`StoreError::NotFound`] for unknown documents, [`StoreError::Locked`] when somebody
    /// already holds the lock.
    async fn checkout(&self, id: DocId) -> Result<LiveCopy, StoreError>;

    /// Fetch the last version and the last publishable version.
    ///
    /// # Errors
    /// [`StoreError::Backend`] when the store cannot be read. Unknown documents simply have no
    /// snapshots.
    async fn last_snapshots(&self, id: DocId) -> Result<Snapshots, StoreError>;

    /// Replace the live copy's body.
    ///
    /// # Errors
    /// [`StoreError::NotFound`] for unknown documents, [`StoreError::NotCheckedOut`] unless this
    /// client's user holds the lock. Nothing is written on error.
    async fn save_live(
        &self,
        id: DocId,
        xml: &str,
        options: &SaveOptions<'_>,
    ) -> Result<SaveReceipt, StoreError>;

    /// Rewrite the body of version `num` in place, keeping its number.
    ///
    /// # Errors
    /// [`StoreError::NotCheckedOut`] unless this client's user holds the lock,
    /// [`StoreError::Rejected`] when version `num` does not exist.
    async fn patch_snapshot(
        &self,
        id: DocId,
        num: i64,
        xml: &str,
        comment: &str,
    ) -> Result<(), StoreError>;

    /// Release the check-out lock.
    ///
    /// # Errors
    /// [`StoreError::NotFound`] for unknown documents, [`StoreError::NotCheckedOut`] when the
    /// document is not locked, [`StoreError::Locked`] when another user holds the lock.
    async fn unlock(&self, id: DocId) -> Result<(), StoreError>;
}
