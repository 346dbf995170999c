//! Task listing, cancellation and stored-file cleanup.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::{Error, Result};
use crate::selector::find_output_files;
use crate::types::{TaskInfo, UserId};
use crate::utils::remove_files;

use super::MediaDownloader;

const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Result of the clear command
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ClearOutcome {
    /// Files deleted from disk
    pub removed: usize,
    /// Reply text
    pub message: String,
}

/// Reply to the downloads command
pub fn describe_task(task: Option<&TaskInfo>) -> String {
    match task {
        None => "You have no recorded downloads.".to_string(),
        Some(task) => format!(
            "Your downloads:\n- {} [{}] → {}\nCreated: {}\nUpdated: {}",
            task.title,
            task.choice,
            task.status,
            task.created_at.format(TIME_FORMAT),
            task.updated_at.format(TIME_FORMAT),
        ),
    }
}

/// Reply to the cancel command
pub fn cancel_reply(requested: bool) -> &'static str {
    if requested {
        "Cancellation requested. ⏹️"
    } else {
        "There are no active downloads to cancel."
    }
}

impl MediaDownloader {
    /// The user's current task, if any
    pub async fn list_downloads(&self, user_id: UserId) -> Option<TaskInfo> {
        self.registry.get(user_id).await
    }

    /// Request cancellation of the user's active task
    ///
    /// Returns `false` when there is nothing to cancel. The task reaches the
    /// `canceled` status once its orchestrator observes the request.
    pub async fn cancel(&self, user_id: UserId) -> bool {
        self.registry.request_cancel(user_id).await
    }

    /// Delete the stored outputs of the user's last task
    ///
    /// Removes every collected file plus anything else on disk carrying the
    /// task's content id. Refused with [`Error::Conflict`] while the task is
    /// still active; fails with [`Error::NotFound`] when the user has no task.
    pub async fn clear_downloads(&self, user_id: UserId) -> Result<ClearOutcome> {
        let Some(task) = self.registry.get(user_id).await else {
            return Err(Error::NotFound("There are no downloads to clear.".to_string()));
        };
        if task.status.is_active() {
            return Err(Error::Conflict {
                user_id,
                status: task.status,
            });
        }

        let content_id = self
            .registry
            .mutate(user_id, |t| t.content_id.clone())
            .await
            .unwrap_or_default();

        let mut paths = self.registry.clear_files(user_id).await;
        if !content_id.is_empty() {
            match find_output_files(&self.user_dir(user_id), &content_id) {
                Ok(found) => paths.extend(found),
                Err(e) => {
                    tracing::warn!(user_id = user_id.0, error = %e, "failed to scan output directory")
                }
            }
        }
        paths.sort();
        paths.dedup();

        let removed = remove_files(&paths).await;
        tracing::info!(user_id = user_id.0, removed, "stored downloads cleared");

        Ok(ClearOutcome {
            removed,
            message: format!("Cleanup complete. Files removed: {}", removed),
        })
    }
}
