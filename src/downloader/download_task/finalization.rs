//! Task finalization: terminal status, final notice and cleanup.

use crate::error::{Error, Result};
use crate::selector::find_output_files;
use crate::types::{Event, Status};
use crate::utils::remove_files;

use super::context::DownloadTaskContext;

/// Settle the task after its passes returned.
///
/// Every path ends in a terminal status with one final notice. Collected
/// files are removed when cleanup is enabled, along with partial artifacts
/// for canceled or failed tasks. The session was consumed at selection, so
/// a URL sent while the task ran stays pending.
pub(super) async fn finalize_task(ctx: DownloadTaskContext, result: Result<()>) {
    let user_id = ctx.user_id;

    let (status, error) = match result {
        Ok(()) => (Status::Done, None),
        Err(Error::Canceled) => (Status::Canceled, None),
        Err(e) => (Status::Error, Some(e.to_string())),
    };

    ctx.set_status(status).await;

    match status {
        Status::Done => {
            tracing::info!(user_id = user_id.0, title = %ctx.title(), "task completed");
            ctx.notify(&format!("✅ Download completed for '{}'", ctx.title()))
                .await;
        }
        Status::Canceled => {
            tracing::info!(user_id = user_id.0, "task canceled by user");
            ctx.notify("⛔ Download canceled by user").await;
        }
        _ => {
            let e = error.as_deref().unwrap_or_default();
            tracing::error!(user_id = user_id.0, error = %e, "task failed");
            ctx.notify(&format!("⚠️ Error: {}", e)).await;
        }
    }

    if ctx.config.download.cleanup_after_delivery {
        cleanup_outputs(&ctx, status).await;
    }

    ctx.downloader.emit_event(Event::TaskFinished {
        user_id,
        status,
        error,
    });
}

async fn cleanup_outputs(ctx: &DownloadTaskContext, status: Status) {
    let mut paths = ctx.downloader.registry.clear_files(ctx.user_id).await;

    if status != Status::Done {
        match find_output_files(&ctx.output_dir, &ctx.session.content_id) {
            Ok(leftovers) => paths.extend(leftovers),
            Err(e) => {
                tracing::warn!(user_id = ctx.user_id.0, error = %e, "failed to scan for partial files")
            }
        }
        paths.sort();
        paths.dedup();
    }

    let removed = remove_files(&paths).await;
    tracing::debug!(user_id = ctx.user_id.0, removed, "task outputs cleaned up");
}
