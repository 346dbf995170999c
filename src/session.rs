//! Pending URL sessions
//!
//! A session is created when a URL is resolved and consumed when the user
//! picks an output form. Lookups go to an in-memory cache first and fall back
//! to the database. Database faults are logged and treated as a missing
//! session; the user is asked to send the URL again.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::db::Database;
use crate::types::{Session, UserId};

/// Cache plus optional durable store for sessions
pub struct SessionStore {
    cache: RwLock<HashMap<UserId, Session>>,
    db: Option<Arc<Database>>,
}

impl SessionStore {
    /// Create a store backed by `db`
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            cache: RwLock::new(HashMap::new()),
            db: Some(db),
        }
    }

    /// Create a store without durable backing
    pub fn in_memory() -> Self {
        Self {
            cache: RwLock::new(HashMap::new()),
            db: None,
        }
    }

    /// Store `session` for the user, replacing any previous one
    pub async fn save(&self, user_id: UserId, session: Session) {
        let mut cache = self.cache.write().await;
        if let Some(db) = &self.db {
            if let Err(e) = db.save_session(user_id, &session).await {
                tracing::warn!(user_id = user_id.0, error = %e, "failed to persist session");
            }
        }
        cache.insert(user_id, session);
    }

    /// Look up the user's session
    pub async fn resolve(&self, user_id: UserId) -> Option<Session> {
        if let Some(session) = self.cache.read().await.get(&user_id) {
            return Some(session.clone());
        }

        let session = self.load(user_id).await?;
        tracing::debug!(user_id = user_id.0, "session restored from database");
        self.cache.write().await.insert(user_id, session.clone());
        Some(session)
    }

    /// Delete the user's session from cache and database
    pub async fn consume(&self, user_id: UserId) {
        self.cache.write().await.remove(&user_id);
        self.forget(user_id).await;
    }

    /// Delete the user's session only while it is still `session`
    ///
    /// A session saved in the meantime supersedes `session` and is kept.
    /// Returns whether anything was deleted.
    pub async fn consume_if_current(&self, user_id: UserId, session: &Session) -> bool {
        let mut cache = self.cache.write().await;
        let current = match cache.get(&user_id) {
            Some(cached) => Some(cached.clone()),
            None => self.load(user_id).await,
        };
        if current.as_ref() != Some(session) {
            return false;
        }

        cache.remove(&user_id);
        self.forget(user_id).await;
        true
    }

    async fn load(&self, user_id: UserId) -> Option<Session> {
        let db = self.db.as_ref()?;
        match db.get_session(user_id).await {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!(user_id = user_id.0, error = %e, "failed to load session");
                None
            }
        }
    }

    async fn forget(&self, user_id: UserId) {
        if let Some(db) = &self.db {
            if let Err(e) = db.delete_session(user_id).await {
                tracing::warn!(user_id = user_id.0, error = %e, "failed to delete session");
            }
        }
    }
}
