//! Session CRUD.

use crate::error::DatabaseError;
use crate::types::{Session, UserId};
use crate::{Error, Result};

use super::Database;

impl Database {
    /// Insert or replace the user's session
    pub async fn save_session(&self, user_id: UserId, session: &Session) -> Result<()> {
        let data = serde_json::to_string(session)?;
        let now = chrono::Utc::now().timestamp();

        sqlx::query(
            r#"
            INSERT INTO sessions (user_id, data, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(user_id) DO UPDATE SET data = excluded.data, updated_at = excluded.updated_at
            "#,
        )
        .bind(user_id)
        .bind(data)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to save session: {}",
                e
            )))
        })?;

        Ok(())
    }

    /// Load the user's session
    pub async fn get_session(&self, user_id: UserId) -> Result<Option<Session>> {
        let data: Option<String> = sqlx::query_scalar("SELECT data FROM sessions WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to get session: {}",
                    e
                )))
            })?;

        match data {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// Delete the user's session, returning whether a row existed
    pub async fn delete_session(&self, user_id: UserId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM sessions WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to delete session: {}",
                    e
                )))
            })?;

        Ok(result.rows_affected() > 0)
    }

    /// Number of stored sessions
    pub async fn count_sessions(&self) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM sessions")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to count sessions: {}",
                    e
                )))
            })
    }
}
