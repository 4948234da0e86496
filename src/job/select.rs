//! Candidate selection.
use async_trait::async_trait;

use crate::db::{DatabaseConnection, DatabaseKind};
use crate::store::DocId;

/// Produces the ordered list of documents a job should look at.
///
/// Selection may be loose: documents that turn out not to need a correction are simply
/// reported unchanged. A selection failure aborts the run before any document is touched.
#[async_trait]
pub trait Selector: Send + Sync {
    /// Return the candidate ids, in processing order.
    ///
    /// # Errors
    /// Any error is fatal to the run.
    async fn select_candidates(&self) -> anyhow::Result<Vec<DocId>>;
}

/// Selects a fixed list of ids.
#[derive(Debug, Clone, Default)]
pub struct IdListSelector {
    /// Ids in processing order.
    ids: Vec<DocId>,
}

impl IdListSelector {
    /// Select exactly `ids`, in the given order.
    #[must_use]
    pub fn new<I: IntoIterator<Item = DocId>>(ids: I) -> Self {
        Self {
            ids: ids.into_iter().collect(),
        }
    }
}

#[async_trait]
impl Selector for IdListSelector {
    async fn select_candidates(&self) -> anyhow::Result<Vec<DocId>> {
        Ok(self.ids.clone())
    }
}

/// Selects ids with a `SQL` query whose first column is the document id.
#[derive(Debug, Clone)]
pub struct QuerySelector {
    /// Connection to run the query on.
    conn: DatabaseConnection,
    /// Query text.
    query: String,
}

impl QuerySelector {
    /// Select with `query` against `conn`.
    #[must_use]
    pub fn new<Q: Into<String>>(conn: DatabaseConnection, query: Q) -> Self {
        Self {
            conn,
            query: query.into(),
        }
    }
}

#[async_trait]
impl Selector for QuerySelector {
    #[tracing::instrument(level = "debug", skip(self), fields(query = %self.query))]
    async fn select_candidates(&self) -> anyhow::Result<Vec<DocId>> {
        let ids = match self.conn.kind {
            DatabaseKind::Sqlite => {
                let mut connection = self.conn.pool.acquire().await?;
                sqlx::query_scalar::<_, i64>(&self.query)
                    .fetch_all(&mut *connection)
                    .await?
            }
        };
        Ok(ids.into_iter().map(DocId).collect())
    }
}
