//! Media extraction backends
//!
//! Two collaborators sit behind traits so the orchestrator can be exercised
//! without network access:
//! - [`FetchEngine`] downloads and converts media. It is blocking and runs on
//!   a dedicated worker thread, reporting progress through a callback that
//!   may abort the fetch by returning an error.
//! - [`MetadataResolver`] turns a URL into a [`Session`] (title, content id,
//!   duration) before the user picks an output form.
//!
//! [`YtDlpEngine`] and [`YtDlpResolver`] drive an external `yt-dlp` binary.
//! When none is available the `Unavailable*` variants report a clear error.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::types::{MediaKind, ProgressSnapshot, Session};

mod ytdlp;

pub use ytdlp::{YtDlpEngine, YtDlpResolver, parse_progress_line};

/// Output name template; `find_output_files` relies on the `-<id>.` suffix
pub const OUTPUT_TEMPLATE: &str = "%(title).80s-%(id)s.%(ext)s";

/// Everything a single fetch pass needs
#[derive(Clone, Debug, PartialEq)]
pub struct FetchRequest {
    /// Media URL
    pub url: String,
    /// Output form for this pass
    pub kind: MediaKind,
    /// Maximum video height (ignored for audio)
    pub max_height: u32,
    /// MP3 bitrate in kbps (ignored for video)
    pub audio_bitrate_kbps: u32,
    /// Directory outputs are written to
    pub output_dir: PathBuf,
    /// Engine cache directory
    pub cache_dir: PathBuf,
    /// Network retries
    pub retries: u32,
    /// Socket timeout
    pub socket_timeout: Duration,
    /// Parallel fragment downloads
    pub concurrent_fragments: u32,
}

impl FetchRequest {
    /// Build a request from configuration at the given quality
    pub fn new(
        config: &Config,
        url: impl Into<String>,
        kind: MediaKind,
        output_dir: &Path,
        max_height: u32,
        audio_bitrate_kbps: u32,
    ) -> Self {
        Self {
            url: url.into(),
            kind,
            max_height,
            audio_bitrate_kbps,
            output_dir: output_dir.to_path_buf(),
            cache_dir: config.download_dir().join(".cache").join("yt-dlp"),
            retries: config.engine.retries,
            socket_timeout: config.engine.socket_timeout,
            concurrent_fragments: config.engine.concurrent_fragments,
        }
    }

    /// Format selector for this request
    pub fn format(&self) -> String {
        build_format_string(self.kind, self.max_height)
    }

    /// Full output path template
    pub fn output_template(&self) -> PathBuf {
        self.output_dir.join(OUTPUT_TEMPLATE)
    }
}

/// Format selector: best audio, or best video capped at `max_height` merged
/// with best audio
///
/// # Examples
///
/// ```
/// use dropzone_dl::engine::build_format_string;
/// use dropzone_dl::types::MediaKind;
///
/// assert_eq!(build_format_string(MediaKind::Audio, 720), "bestaudio/best");
/// assert!(build_format_string(MediaKind::Video, 480).starts_with("bestvideo[height<=480]+bestaudio"));
/// ```
pub fn build_format_string(kind: MediaKind, max_height: u32) -> String {
    match kind {
        MediaKind::Audio => "bestaudio/best".to_string(),
        MediaKind::Video => format!(
            "bestvideo[height<={max_height}]+bestaudio/best[height<={max_height}]/best"
        ),
    }
}

/// Blocking media fetcher
///
/// `fetch` runs on a worker thread. It must call `progress` for every report
/// it receives and, if `progress` returns an error, stop the fetch and return
/// that error unchanged.
pub trait FetchEngine: Send + Sync {
    /// Download `request.url` into `request.output_dir`
    fn fetch(
        &self,
        request: &FetchRequest,
        progress: &mut dyn FnMut(&ProgressSnapshot) -> Result<()>,
    ) -> Result<()>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}

/// Turns a URL into a session
#[async_trait]
pub trait MetadataResolver: Send + Sync {
    /// Look up title, content id and duration for `url`
    async fn resolve(&self, url: &str) -> Result<Session>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}

/// Engine used when no yt-dlp binary is available
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableEngine;

impl FetchEngine for UnavailableEngine {
    fn fetch(
        &self,
        _request: &FetchRequest,
        _progress: &mut dyn FnMut(&ProgressSnapshot) -> Result<()>,
    ) -> Result<()> {
        Err(Error::ExternalTool(
            "yt-dlp not found; set YTDLP_PATH or install it on PATH".to_string(),
        ))
    }

    fn name(&self) -> &'static str {
        "unavailable"
    }
}

/// Resolver used when no yt-dlp binary is available
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableResolver;

#[async_trait]
impl MetadataResolver for UnavailableResolver {
    async fn resolve(&self, _url: &str) -> Result<Session> {
        Err(Error::ExternalTool(
            "yt-dlp not found; set YTDLP_PATH or install it on PATH".to_string(),
        ))
    }

    fn name(&self) -> &'static str {
        "unavailable"
    }
}

/// Locate yt-dlp according to configuration
///
/// An explicit `ytdlp_path` wins; otherwise PATH is searched when allowed.
pub fn locate_ytdlp(config: &Config) -> Option<PathBuf> {
    if let Some(path) = &config.engine.ytdlp_path {
        return Some(path.clone());
    }
    if config.engine.search_path {
        return which::which("yt-dlp").ok();
    }
    None
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audio_format_ignores_height() {
        assert_eq!(build_format_string(MediaKind::Audio, 720), "bestaudio/best");
        assert_eq!(build_format_string(MediaKind::Audio, 144), "bestaudio/best");
    }

    #[test]
    fn video_format_caps_height_and_merges_audio() {
        assert_eq!(
            build_format_string(MediaKind::Video, 480),
            "bestvideo[height<=480]+bestaudio/best[height<=480]/best"
        );
    }

    #[test]
    fn request_uses_engine_settings_and_cache_under_download_dir() {
        let mut config = Config::default();
        config.download.download_dir = PathBuf::from("/data");
        config.engine.retries = 9;

        let req = FetchRequest::new(
            &config,
            "https://x",
            MediaKind::Video,
            Path::new("/data/user-1"),
            720,
            128,
        );

        assert_eq!(req.retries, 9);
        assert_eq!(req.cache_dir, PathBuf::from("/data/.cache/yt-dlp"));
        assert_eq!(
            req.output_template(),
            PathBuf::from("/data/user-1/%(title).80s-%(id)s.%(ext)s")
        );
    }

    #[test]
    fn explicit_path_wins_over_search() {
        let mut config = Config::default();
        config.engine.ytdlp_path = Some(PathBuf::from("/opt/yt-dlp"));
        assert_eq!(locate_ytdlp(&config), Some(PathBuf::from("/opt/yt-dlp")));
    }

    #[test]
    fn disabled_search_without_path_finds_nothing() {
        let mut config = Config::default();
        config.engine.search_path = false;
        assert_eq!(locate_ytdlp(&config), None);
    }

    #[test]
    fn unavailable_engine_reports_external_tool_error() {
        let req = FetchRequest::new(
            &Config::default(),
            "https://x",
            MediaKind::Audio,
            Path::new("/tmp"),
            720,
            128,
        );
        let err = UnavailableEngine.fetch(&req, &mut |_| Ok(())).unwrap_err();
        assert!(matches!(err, Error::ExternalTool(_)));
    }

    #[tokio::test]
    async fn unavailable_resolver_reports_external_tool_error() {
        let err = UnavailableResolver.resolve("https://x").await.unwrap_err();
        assert!(matches!(err, Error::ExternalTool(_)));
    }
}
