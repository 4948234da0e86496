use crate::db::{DatabaseConnection, DatabaseKind, Db as _};
use std::env;
use std::path::Path;

/// Connects to the document store database and applies migrations.
/// The store is the `SQLite` file at `store_path`, but we can override this by setting the
/// `DATABASE_URL` environment variable.
///
/// # Errors
/// Errors if connection to database fails.
/// Connections can fail if the database file cannot be created, or if the database URL is invalid.
pub async fn connect(store_path: &Path) -> anyhow::Result<DatabaseConnection> {
    let db_url = env::var("DATABASE_URL").unwrap_or_else(|_| sqlite_url(store_path));
    connect_url(&db_url).await
}

/// Connects to the database at `db_url` and applies migrations.
///
/// # Errors
/// Errors if the connection or a migration fails.
pub async fn connect_url(db_url: &str) -> anyhow::Result<DatabaseConnection> {
    let connection = DatabaseConnection::connect(db_url).await?;
    tracing::info!("Connected to database");
    match connection.kind {
        DatabaseKind::Sqlite => {
            sqlx::migrate!("./migrations/sqlite")
                .run(&connection.pool)
                .await?;
        }
    }
    Ok(connection)
}

/// Build a read-write-create `SQLite` URL for the file at `path`.
#[must_use]
pub fn sqlite_url(path: &Path) -> String {
    format!("sqlite://{}?mode=rwc", path.to_string_lossy())
}
