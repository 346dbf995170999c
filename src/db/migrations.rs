//! Database lifecycle and schema migrations.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool};
use sqlx::{Connection, SqliteConnection};
use std::path::Path;

use crate::error::DatabaseError;
use crate::{Error, Result};

use super::Database;

/// Ordered schema migrations; position + 1 is the schema version
const MIGRATIONS: &[(&str, &str)] = &[(
    "sessions table",
    r#"
    CREATE TABLE IF NOT EXISTS sessions (
        user_id INTEGER PRIMARY KEY,
        data TEXT NOT NULL,
        updated_at INTEGER NOT NULL
    )
    "#,
)];

fn db_error(
    kind: fn(String) -> DatabaseError,
    context: &'static str,
) -> impl FnOnce(sqlx::Error) -> Error {
    move |e| Error::Database(kind(format!("{context}: {e}")))
}

impl Database {
    /// Open (or create) the session database at `path` and bring its schema up to date
    pub async fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                Error::Database(DatabaseError::ConnectionFailed(format!(
                    "Failed to create database directory {}: {e}",
                    parent.display()
                )))
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePool::connect_with(options).await.map_err(db_error(
            DatabaseError::ConnectionFailed,
            "Failed to connect to database",
        ))?;

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    async fn migrate(&self) -> Result<()> {
        let mut conn = self.pool.acquire().await.map_err(db_error(
            DatabaseError::ConnectionFailed,
            "Failed to acquire connection",
        ))?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER PRIMARY KEY, applied_at INTEGER NOT NULL)",
        )
        .execute(&mut *conn)
        .await
        .map_err(db_error(
            DatabaseError::MigrationFailed,
            "Failed to create schema_version table",
        ))?;

        let current: i64 = sqlx::query_scalar("SELECT COALESCE(MAX(version), 0) FROM schema_version")
            .fetch_one(&mut *conn)
            .await
            .map_err(db_error(
                DatabaseError::QueryFailed,
                "Failed to query schema version",
            ))?;

        for (position, (name, sql)) in MIGRATIONS.iter().enumerate() {
            let version = position as i64 + 1;
            if version > current {
                Self::apply(&mut conn, version, name, sql).await?;
            }
        }
        Ok(())
    }

    // schema change and version row commit together or not at all
    async fn apply(conn: &mut SqliteConnection, version: i64, name: &str, sql: &str) -> Result<()> {
        tracing::info!(version, name, "applying database migration");

        let failed = |e: sqlx::Error| {
            Error::Database(DatabaseError::MigrationFailed(format!(
                "migration v{version} ({name}): {e}"
            )))
        };

        let mut tx = conn.begin().await.map_err(failed)?;
        sqlx::query(sql).execute(&mut *tx).await.map_err(failed)?;
        sqlx::query("INSERT INTO schema_version (version, applied_at) VALUES (?, ?)")
            .bind(version)
            .bind(chrono::Utc::now().timestamp())
            .execute(&mut *tx)
            .await
            .map_err(failed)?;
        tx.commit().await.map_err(failed)?;

        Ok(())
    }

    /// Close the database connection pool
    pub async fn close(self) {
        self.pool.close().await;
    }

    /// Get the underlying connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
