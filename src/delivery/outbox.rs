//! Local outbox transport

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

use super::{DeliveryTarget, display_name};
use crate::error::{Error, Result};
use crate::types::{DeliveryKind, UserId};

/// Log file of notices and deliveries inside each user's outbox
pub const MESSAGES_LOG: &str = "messages.jsonl";

/// One line of the outbox log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboxEntry {
    /// A text notice
    Notice {
        /// Unix timestamp
        at: i64,
        /// Message text
        text: String,
    },
    /// A file copied into the outbox
    File {
        /// Unix timestamp
        at: i64,
        /// File name inside the outbox
        name: String,
        /// Presentation hint
        kind: DeliveryKind,
        /// Media title
        title: String,
    },
}

/// Copies files into `<outbox>/user-<id>/` and logs notices beside them
#[derive(Debug, Clone)]
pub struct OutboxDelivery {
    root: PathBuf,
}

impl OutboxDelivery {
    /// Create an outbox rooted at `root`
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Directory holding one user's deliveries
    pub fn user_dir(&self, user_id: UserId) -> PathBuf {
        self.root.join(format!("user-{}", user_id))
    }

    async fn append(&self, user_id: UserId, entry: &OutboxEntry) -> Result<()> {
        let dir = self.user_dir(user_id);
        tokio::fs::create_dir_all(&dir).await?;

        let mut line = serde_json::to_string(entry)?;
        line.push('\n');

        let mut log = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join(MESSAGES_LOG))
            .await?;
        log.write_all(line.as_bytes()).await?;
        Ok(())
    }

    /// Read back a user's log
    pub async fn entries(&self, user_id: UserId) -> Result<Vec<OutboxEntry>> {
        let path = self.user_dir(user_id).join(MESSAGES_LOG);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        content
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| serde_json::from_str(l).map_err(Error::from))
            .collect()
    }
}

#[async_trait]
impl DeliveryTarget for OutboxDelivery {
    async fn notify(&self, user_id: UserId, text: &str) -> Result<()> {
        tracing::info!(user_id = user_id.0, text, "notice");
        self.append(
            user_id,
            &OutboxEntry::Notice {
                at: chrono::Utc::now().timestamp(),
                text: text.to_string(),
            },
        )
        .await
    }

    async fn deliver(
        &self,
        user_id: UserId,
        kind: DeliveryKind,
        path: &Path,
        title: &str,
    ) -> Result<()> {
        let name = display_name(path);
        let dir = self.user_dir(user_id);
        let copy = async {
            tokio::fs::create_dir_all(&dir).await?;
            tokio::fs::copy(path, dir.join(&name)).await
        };
        copy.await.map_err(|e| Error::DeliveryFailed {
            name: name.clone(),
            reason: e.to_string(),
        })?;

        self.append(
            user_id,
            &OutboxEntry::File {
                at: chrono::Utc::now().timestamp(),
                name: name.clone(),
                kind,
                title: title.to_string(),
            },
        )
        .await?;

        tracing::debug!(user_id = user_id.0, file = %name, outbox = %dir.display(), "file placed in outbox");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "outbox"
    }
}
