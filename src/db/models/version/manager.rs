//! Manager for the version model.
use crate::db::{DatabaseConnection, DatabaseKind, DatabaseTransaction};
use async_trait::async_trait;

use super::{NewVersion, Version};

#[async_trait]
impl super::Manager for DatabaseConnection {
    /// Find the most recent version of a document.
    ///
    /// # Errors
    /// Errors if can't establish a connection to the database.
    async fn find_last(&self, doc_id: i64) -> anyhow::Result<Option<Version>> {
        let statement = "
            SELECT *
            FROM doc_version
            WHERE doc_id = $1
            ORDER BY num DESC
            LIMIT 1
        ";
        let row = match self.kind {
            DatabaseKind::Sqlite => {
                let mut connection = self.pool.acquire().await?;
                sqlx::query_as::<_, Version>(statement)
                    .bind(doc_id)
                    .fetch_optional(&mut *connection)
                    .await?
            }
        };
        Ok(row)
    }

    /// Find the most recent publishable version of a document.
    ///
    /// # Errors
    /// Errors if can't establish a connection to the database.
    async fn find_last_publishable(&self, doc_id: i64) -> anyhow::Result<Option<Version>> {
        let statement = "
            SELECT *
            FROM doc_version
            WHERE doc_id = $1 AND publishable = 'Y'
            ORDER BY num DESC
            LIMIT 1
        ";
        let row = match self.kind {
            DatabaseKind::Sqlite => {
                let mut connection = self.pool.acquire().await?;
                sqlx::query_as::<_, Version>(statement)
                    .bind(doc_id)
                    .fetch_optional(&mut *connection)
                    .await?
            }
        };
        Ok(row)
    }

    /// Find all versions of a document, oldest first.
    ///
    /// # Errors
    /// Errors if can't establish a connection to the database.
    async fn find_all_by_doc_id(&self, doc_id: i64) -> anyhow::Result<Vec<Version>> {
        let statement = "
            SELECT *
            FROM doc_version
            WHERE doc_id = $1
            ORDER BY num
        ";
        let rows = match self.kind {
            DatabaseKind::Sqlite => {
                let mut connection = self.pool.acquire().await?;
                sqlx::query_as::<_, Version>(statement)
                    .bind(doc_id)
                    .fetch_all(&mut *connection)
                    .await?
            }
        };
        Ok(rows)
    }
}

#[async_trait]
impl super::TxManager for DatabaseTransaction {
    /// Find the most recent version of a document.
    ///
    /// # Errors
    /// Errors if the query fails.
    async fn find_latest(&mut self, doc_id: i64) -> anyhow::Result<Option<Version>> {
        let statement = "
            SELECT *
            FROM doc_version
            WHERE doc_id = $1
            ORDER BY num DESC
            LIMIT 1
        ";
        let row = sqlx::query_as::<_, Version>(statement)
            .bind(doc_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(row)
    }

    /// Append a version numbered one past the current last version.
    ///
    /// # Errors
    /// Errors if the version cannot be inserted.
    async fn insert_next(&mut self, version: &NewVersion<'_>) -> anyhow::Result<i64> {
        let num = super::TxManager::find_latest(self, version.doc_id)
            .await?
            .map_or(1, |last| last.num + 1);
        let statement = "
            INSERT INTO doc_version ( doc_id, num, publishable, xml, comment, saved_by, saved_at )
            VALUES ( $1, $2, $3, $4, $5, $6, $7 )
        ";
        sqlx::query(statement)
            .bind(version.doc_id)
            .bind(num)
            .bind(if version.publishable { "Y" } else { "N" })
            .bind(version.xml)
            .bind(version.comment)
            .bind(version.saved_by)
            .bind(version.saved_at)
            .execute(&mut *self.tx)
            .await?;
        Ok(num)
    }

    /// Rewrite a version's body without changing its number.
    ///
    /// # Errors
    /// Errors if the update fails.
    async fn update_xml(
        &mut self,
        doc_id: i64,
        num: i64,
        xml: &str,
        comment: &str,
    ) -> anyhow::Result<bool> {
        let statement = "
            UPDATE doc_version
            SET xml = $1, comment = $2
            WHERE doc_id = $3 AND num = $4
        ";
        let result = sqlx::query(statement)
            .bind(xml)
            .bind(comment)
            .bind(doc_id)
            .bind(num)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected() == 1)
    }
}
