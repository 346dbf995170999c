//! Download task context: shared state and status/notice helpers.

use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::registry::TaskHandle;
use crate::types::{Event, MediaChoice, Session, Status, UserId};

use super::super::MediaDownloader;

/// Shared context for a single task, reducing parameter passing between helpers.
pub(crate) struct DownloadTaskContext {
    pub(crate) user_id: UserId,
    pub(crate) choice: MediaChoice,
    pub(crate) session: Session,
    pub(crate) output_dir: PathBuf,
    pub(crate) config: Arc<Config>,
    pub(crate) cancel_token: CancellationToken,
    pub(crate) downloader: MediaDownloader,
}

impl DownloadTaskContext {
    pub(crate) fn new(
        downloader: MediaDownloader,
        handle: TaskHandle,
        session: Session,
        choice: MediaChoice,
    ) -> Self {
        Self {
            user_id: handle.user_id,
            choice,
            output_dir: downloader.user_dir(handle.user_id),
            config: downloader.config.clone(),
            cancel_token: handle.cancel,
            session,
            downloader,
        }
    }

    pub(super) fn title(&self) -> &str {
        &self.session.title
    }

    /// Fail with [`Error::Canceled`] once cancellation was requested.
    pub(super) fn check_canceled(&self) -> Result<()> {
        if self.cancel_token.is_cancelled() {
            return Err(Error::Canceled);
        }
        Ok(())
    }

    /// Send a notice to the task's user.
    pub(super) async fn notify(&self, text: &str) {
        self.downloader.notify(self.user_id, text).await;
    }

    /// Move the task to `status`, emitting an event when the move is allowed.
    pub(super) async fn set_status(&self, status: Status) -> bool {
        let moved = self
            .downloader
            .registry
            .mutate(self.user_id, |task| task.transition(status))
            .await
            .unwrap_or(false);

        if moved {
            tracing::info!(user_id = self.user_id.0, %status, "task status changed");
            self.downloader.emit_event(Event::StatusChanged {
                user_id: self.user_id,
                status,
            });
        }
        moved
    }

    /// Append selected outputs to the task's collected files.
    pub(super) async fn record_files(&self, files: &[PathBuf]) {
        self.downloader
            .registry
            .mutate(self.user_id, |task| {
                for file in files {
                    if !task.collected_files.contains(file) {
                        task.collected_files.push(file.clone());
                    }
                }
                task.touch();
            })
            .await;
    }
}
