//! One fetch pass: preflight, engine run, output selection and the size gate.

use std::path::PathBuf;

use tokio::sync::mpsc;

use crate::engine::FetchRequest;
use crate::error::{Error, Result};
use crate::selector::{find_output_files, select_outputs};
use crate::throttle::ProgressThrottle;
use crate::types::{MediaKind, ProgressSnapshot};
use crate::utils::{ensure_free_space, file_size_mb, remove_files};

use super::context::DownloadTaskContext;

/// Fetch one kind and return the outputs to deliver.
///
/// Runs at primary quality; if any output exceeds the transfer cap the
/// oversized files are removed and the pass is retried once at fallback
/// quality.
pub(super) async fn fetch_kind(ctx: &DownloadTaskContext, kind: MediaKind) -> Result<Vec<PathBuf>> {
    let quality = &ctx.config.quality;

    tokio::fs::create_dir_all(&ctx.output_dir).await?;
    ensure_free_space(&ctx.output_dir, ctx.config.download.required_free_mb())?;

    run_fetch(
        ctx,
        kind,
        kind.label().to_string(),
        quality.max_video_height,
        quality.audio_bitrate_kbps,
    )
    .await?;

    let files = collect_outputs(ctx, kind)?;
    let oversized = oversized_files(ctx, &files).await?;
    if oversized.is_empty() {
        return Ok(files);
    }

    let fallback_height = quality.effective_fallback_height();
    let fallback_bitrate = quality.effective_fallback_bitrate();
    let (notice, label) = match kind {
        MediaKind::Video => (
            format!("⚠️ Video too large; trying {}p…", fallback_height),
            format!("video ({}p)", fallback_height),
        ),
        MediaKind::Audio => (
            format!("⚠️ Audio too large; trying {}kbps…", fallback_bitrate),
            format!("audio ({}kbps)", fallback_bitrate),
        ),
    };

    tracing::info!(
        user_id = ctx.user_id.0,
        %kind,
        oversized = oversized.len(),
        limit_mb = ctx.config.download.max_transfer_mb,
        "output exceeds transfer cap, retrying at fallback quality"
    );
    ctx.notify(&notice).await;

    let paths: Vec<PathBuf> = oversized.into_iter().map(|(path, _)| path).collect();
    remove_files(&paths).await;

    ctx.check_canceled()?;
    run_fetch(ctx, kind, label, fallback_height, fallback_bitrate).await?;

    let files = collect_outputs(ctx, kind)?;
    if let Some((path, size_mb)) = oversized_files(ctx, &files).await?.into_iter().next() {
        return Err(Error::OutputTooLarge {
            path,
            size_mb,
            limit_mb: ctx.config.download.max_transfer_mb,
        });
    }
    Ok(files)
}

/// Run the engine on a blocking worker, relaying throttled progress to the user.
async fn run_fetch(
    ctx: &DownloadTaskContext,
    kind: MediaKind,
    label: String,
    max_height: u32,
    audio_bitrate_kbps: u32,
) -> Result<()> {
    let request = FetchRequest::new(
        &ctx.config,
        ctx.session.url.clone(),
        kind,
        &ctx.output_dir,
        max_height,
        audio_bitrate_kbps,
    );

    tracing::debug!(
        user_id = ctx.user_id.0,
        engine = ctx.downloader.engine.name(),
        format = %request.format(),
        "starting fetch"
    );

    let (tx, mut rx) = mpsc::unbounded_channel();
    let throttle = ProgressThrottle::new(label, ctx.cancel_token.clone(), tx);
    let engine = ctx.downloader.engine.clone();

    let worker = tokio::task::spawn_blocking(move || {
        let mut throttle = throttle;
        throttle.checkpoint()?;
        engine.fetch(&request, &mut |snapshot: &ProgressSnapshot| {
            throttle.observe(snapshot)
        })
    });
    tokio::pin!(worker);

    let joined = loop {
        tokio::select! {
            Some(text) = rx.recv() => ctx.notify(&text).await,
            joined = &mut worker => break joined,
        }
    };

    // lines sent just before the worker returned
    while let Ok(text) = rx.try_recv() {
        ctx.notify(&text).await;
    }

    joined.map_err(|e| Error::Other(format!("fetch worker failed: {}", e)))?
}

/// Outputs of this pass on disk, or [`Error::OutputMissing`].
fn collect_outputs(ctx: &DownloadTaskContext, kind: MediaKind) -> Result<Vec<PathBuf>> {
    let candidates = find_output_files(&ctx.output_dir, &ctx.session.content_id)?;
    let files = select_outputs(&candidates, kind);
    if files.is_empty() {
        return Err(Error::OutputMissing {
            content_id: ctx.session.content_id.clone(),
        });
    }
    Ok(files)
}

/// Files above the transfer cap, with their size in MiB.
async fn oversized_files(
    ctx: &DownloadTaskContext,
    files: &[PathBuf],
) -> Result<Vec<(PathBuf, u64)>> {
    let limit = ctx.config.download.max_transfer_bytes();
    let mut oversized = Vec::new();
    for file in files {
        let size = tokio::fs::metadata(file).await?.len();
        if size > limit {
            oversized.push((file.clone(), file_size_mb(size)));
        }
    }
    Ok(oversized)
}
