//! Manager for the document model.
use crate::db::{DatabaseConnection, DatabaseKind, DatabaseTransaction};
use async_trait::async_trait;

use super::{Document, NewDocument};

#[async_trait]
impl super::Manager for DatabaseConnection {
    /// Find a document's live copy by id.
    ///
    /// # Errors
    /// Errors if can't establish a connection to the database.
    async fn find_by_id(&self, id: i64) -> anyhow::Result<Option<Document>> {
        let statement = "
            SELECT *
            FROM document
            WHERE id = $1
        ";
        let row = match self.kind {
            DatabaseKind::Sqlite => {
                let mut connection = self.pool.acquire().await?;
                sqlx::query_as::<_, Document>(statement)
                    .bind(id)
                    .fetch_optional(&mut *connection)
                    .await?
            }
        };
        Ok(row)
    }

    /// Find ids of documents checked out by `user`, in id order.
    ///
    /// # Errors
    /// Errors if can't establish a connection to the database.
    async fn find_ids_locked_by(&self, user: &str) -> anyhow::Result<Vec<i64>> {
        let statement = "
            SELECT id
            FROM document
            WHERE locked_by = $1
            ORDER BY id
        ";
        let ids = match self.kind {
            DatabaseKind::Sqlite => {
                let mut connection = self.pool.acquire().await?;
                sqlx::query_scalar::<_, i64>(statement)
                    .bind(user)
                    .fetch_all(&mut *connection)
                    .await?
            }
        };
        Ok(ids)
    }
}

#[async_trait]
impl super::TxManager for DatabaseTransaction {
    /// Insert a new document.
    ///
    /// # Errors
    /// Errors if the document cannot be inserted, e.g. the id is taken.
    async fn create(&mut self, document: &NewDocument<'_>) -> anyhow::Result<()> {
        let statement = "
            INSERT INTO document ( id, title, doc_type, xml, active_status )
            VALUES ( $1, $2, $3, $4, 'A' )
        ";
        sqlx::query(statement)
            .bind(document.id)
            .bind(document.title)
            .bind(document.doc_type)
            .bind(document.xml)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    /// Find a document by id.
    ///
    /// # Errors
    /// Errors if the query fails.
    async fn find_for_update(&mut self, id: i64) -> anyhow::Result<Option<Document>> {
        let statement = "
            SELECT *
            FROM document
            WHERE id = $1
        ";
        let row = sqlx::query_as::<_, Document>(statement)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(row)
    }

    /// Lock the document for `user` if nobody holds it.
    ///
    /// # Errors
    /// Errors if the update fails.
    async fn acquire_lock(&mut self, id: i64, user: &str, at: &str) -> anyhow::Result<bool> {
        let statement = "
            UPDATE document
            SET locked_by = $1, locked_at = $2
            WHERE id = $3 AND locked_by IS NULL
        ";
        let result = sqlx::query(statement)
            .bind(user)
            .bind(at)
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Clear the lock if `user` holds it.
    ///
    /// # Errors
    /// Errors if the update fails.
    async fn release_lock(&mut self, id: i64, user: &str) -> anyhow::Result<bool> {
        let statement = "
            UPDATE document
            SET locked_by = NULL, locked_at = NULL
            WHERE id = $1 AND locked_by = $2
        ";
        let result = sqlx::query(statement)
            .bind(id)
            .bind(user)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Overwrite the live copy.
    ///
    /// # Errors
    /// Errors if the update fails.
    async fn update_live(
        &mut self,
        id: i64,
        xml: &str,
        comment: &str,
        active_status: Option<&str>,
    ) -> anyhow::Result<()> {
        let statement = "
            UPDATE document
            SET xml = $1, comment = $2, active_status = COALESCE($3, active_status)
            WHERE id = $4
        ";
        sqlx::query(statement)
            .bind(xml)
            .bind(comment)
            .bind(active_status)
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }
}
