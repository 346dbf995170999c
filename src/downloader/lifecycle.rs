//! Shutdown coordination.

use std::sync::atomic::Ordering;
use std::time::Duration;

use crate::error::Result;
use crate::types::Event;

use super::MediaDownloader;

/// How long shutdown waits for running tasks to settle
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

impl MediaDownloader {
    /// Gracefully shut down the downloader
    ///
    /// This method performs a graceful shutdown sequence:
    /// 1. Stops accepting new selections
    /// 2. Requests cancellation of every active task
    /// 3. Waits up to 30 seconds for their orchestrators to finish
    /// 4. Emits [`Event::Shutdown`] and closes the session database
    ///
    /// Canceled tasks still run their cleanup and send their final notice
    /// while this method waits.
    pub async fn shutdown(&self) -> Result<()> {
        self.shutdown_with_timeout(SHUTDOWN_TIMEOUT).await
    }

    pub(crate) async fn shutdown_with_timeout(&self, timeout: Duration) -> Result<()> {
        tracing::info!("Initiating graceful shutdown");

        self.accepting_new.store(false, Ordering::SeqCst);
        tracing::info!("Stopped accepting new downloads");

        let handles = self.registry.cancel_all().await;
        tracing::info!(tasks = handles.len(), "Signaled cancellation to all tasks");

        let wait = futures::future::join_all(handles);
        match tokio::time::timeout(timeout, wait).await {
            Ok(results) => {
                for result in results {
                    if let Err(e) = result {
                        tracing::warn!(error = %e, "task orchestrator ended abnormally");
                    }
                }
                tracing::info!("All tasks settled");
            }
            Err(_) => {
                tracing::warn!(
                    timeout = ?timeout,
                    "Timeout waiting for tasks to settle, proceeding with shutdown"
                );
            }
        }

        self.emit_event(Event::Shutdown);

        self.db.pool().close().await;
        tracing::info!("Graceful shutdown complete");
        Ok(())
    }

    /// Whether new selections are still accepted
    pub fn is_accepting(&self) -> bool {
        self.accepting_new.load(Ordering::SeqCst)
    }
}
