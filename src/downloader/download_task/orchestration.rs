//! Download task orchestration: top-level lifecycle for a single task.

use std::path::PathBuf;

use crate::delivery::display_name;
use crate::error::{Error, Result};
use crate::selector::delivery_kind_for;
use crate::types::{Event, MediaKind, Status};

use super::context::DownloadTaskContext;
use super::fetch::fetch_kind;
use super::finalization::finalize_task;

/// Core download task -- orchestrates the full lifecycle of one user's task.
///
/// For each kind of the choice (video then audio for `both`):
/// 1. Transition to Downloading and announce the pass
/// 2. Fetch, select outputs and enforce the transfer cap
/// 3. Record outputs, transition to Sending and deliver each file
///
/// Then finalize: terminal status, final notice, cleanup and session removal.
pub(crate) async fn run_download_task(ctx: DownloadTaskContext) {
    let result = run_passes(&ctx).await;
    finalize_task(ctx, result).await;
}

async fn run_passes(ctx: &DownloadTaskContext) -> Result<()> {
    for &kind in ctx.choice.kinds() {
        ctx.check_canceled()?;
        ctx.set_status(Status::Downloading).await;
        ctx.notify(&format!("🔽 Downloading '{}' as {}…", ctx.title(), kind))
            .await;

        let files = fetch_kind(ctx, kind).await?;
        ctx.record_files(&files).await;

        ctx.check_canceled()?;
        ctx.set_status(Status::Sending).await;
        deliver_files(ctx, kind, &files).await?;
    }
    Ok(())
}

/// Deliver each file; a failed file is reported and the batch continues.
async fn deliver_files(ctx: &DownloadTaskContext, kind: MediaKind, files: &[PathBuf]) -> Result<()> {
    for path in files {
        ctx.check_canceled()?;

        let delivery_kind = delivery_kind_for(path);
        let result = ctx
            .downloader
            .delivery
            .deliver(ctx.user_id, delivery_kind, path, ctx.title())
            .await;

        match result {
            Ok(()) => {
                tracing::debug!(
                    user_id = ctx.user_id.0,
                    %kind,
                    file = %path.display(),
                    "file delivered"
                );
                ctx.downloader.emit_event(Event::FileDelivered {
                    user_id: ctx.user_id,
                    path: path.clone(),
                    kind: delivery_kind,
                });
            }
            Err(e) => {
                let reason = match &e {
                    Error::DeliveryFailed { reason, .. } => reason.clone(),
                    other => other.to_string(),
                };
                tracing::warn!(
                    user_id = ctx.user_id.0,
                    file = %path.display(),
                    error = %reason,
                    "file delivery failed"
                );
                ctx.notify(&format!("⚠️ Could not send {}: {}", display_name(path), reason))
                    .await;
                ctx.downloader.emit_event(Event::DeliveryFailed {
                    user_id: ctx.user_id,
                    path: path.clone(),
                    error: reason,
                });
            }
        }
    }
    Ok(())
}
