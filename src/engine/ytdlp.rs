//! yt-dlp subprocess backend

use async_trait::async_trait;
use regex::Regex;
use std::io::{BufRead, BufReader, Read};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::LazyLock;
use std::time::Duration;

use super::{FetchEngine, FetchRequest, MetadataResolver};
use crate::error::{Error, Result};
use crate::types::{MediaKind, ProgressPhase, ProgressSnapshot, Session};

/// Marker prefixed to every templated progress line
const PROGRESS_MARKER: &str = "dzprog";

const PROGRESS_TEMPLATE: &str = "download:dzprog %(progress.status)s %(progress.downloaded_bytes)s %(progress.total_bytes)s %(progress.total_bytes_estimate)s %(progress.speed)s %(progress.eta)s";

// compiled once per process; a failure is logged and turns parsing off
fn compile_pattern(pattern: &str) -> Option<Regex> {
    Regex::new(pattern)
        .inspect_err(|e| {
            tracing::warn!(pattern, error = %e, "yt-dlp output pattern failed to compile, progress parsing disabled")
        })
        .ok()
}

static PROGRESS_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    compile_pattern(r"^dzprog\s+(\w+)\s+(\S+)\s+(\S+)\s+(\S+)\s+(\S+)\s+(\S+)\s*$")
});

// merge and conversion steps that follow the transfer
static POSTPROCESS_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    compile_pattern(r"^\[(Merger|ExtractAudio|VideoConvertor|FixupM3u8|ffmpeg)\]")
});

/// Parse one line of yt-dlp stdout into a progress snapshot
///
/// Recognizes the templated `dzprog` lines and post-processor banners.
/// Fields yt-dlp cannot compute are printed as `NA` and map to unknown.
pub fn parse_progress_line(line: &str) -> Option<ProgressSnapshot> {
    let line = line.trim();

    if let Some(caps) = PROGRESS_RE.as_ref().and_then(|re| re.captures(line)) {
        let field = |i: usize| caps.get(i).map(|m| m.as_str()).and_then(parse_number);
        let status = caps.get(1).map(|m| m.as_str()).unwrap_or_default();

        let phase = match status {
            "finished" => ProgressPhase::Finalizing,
            "downloading" => ProgressPhase::Downloading,
            _ => return None,
        };

        let downloaded = field(2).unwrap_or(0.0) as u64;
        let total = field(3).or_else(|| field(4)).unwrap_or(0.0) as u64;

        return Some(ProgressSnapshot {
            downloaded_bytes: downloaded,
            total_bytes: total,
            speed_bytes_per_sec: field(5),
            eta_seconds: field(6).map(|e| e as u64),
            phase,
        });
    }

    if POSTPROCESS_RE.as_ref().is_some_and(|re| re.is_match(line)) {
        return Some(ProgressSnapshot::finalizing());
    }

    None
}

fn parse_number(raw: &str) -> Option<f64> {
    raw.parse::<f64>().ok().filter(|v| v.is_finite() && *v >= 0.0)
}

/// Last `ERROR:` line of yt-dlp stderr, without the prefix
fn last_error_line(stderr: &str) -> Option<String> {
    stderr
        .lines()
        .rev()
        .find_map(|l| l.trim().strip_prefix("ERROR:"))
        .map(|msg| msg.trim().to_string())
}

/// Fetch engine driving the yt-dlp command-line tool
#[derive(Debug, Clone)]
pub struct YtDlpEngine {
    binary_path: PathBuf,
}

impl YtDlpEngine {
    /// Create an engine with an explicit binary path
    pub fn new(binary_path: PathBuf) -> Self {
        Self { binary_path }
    }

    /// Command-line arguments for a request
    pub fn build_args(request: &FetchRequest) -> Vec<String> {
        let mut args = vec![
            "--newline".to_string(),
            "--no-playlist".to_string(),
            "--no-warnings".to_string(),
            "--progress-template".to_string(),
            PROGRESS_TEMPLATE.to_string(),
            "-f".to_string(),
            request.format(),
            "-o".to_string(),
            request.output_template().to_string_lossy().into_owned(),
            "--restrict-filenames".to_string(),
            "--socket-timeout".to_string(),
            request.socket_timeout.as_secs().to_string(),
            "--retries".to_string(),
            request.retries.to_string(),
            "--concurrent-fragments".to_string(),
            request.concurrent_fragments.to_string(),
            "--cache-dir".to_string(),
            request.cache_dir.to_string_lossy().into_owned(),
        ];

        match request.kind {
            MediaKind::Video => {
                args.push("--merge-output-format".to_string());
                args.push("mp4".to_string());
            }
            MediaKind::Audio => {
                args.push("--extract-audio".to_string());
                args.push("--audio-format".to_string());
                args.push("mp3".to_string());
                args.push("--audio-quality".to_string());
                args.push(format!("{}K", request.audio_bitrate_kbps));
            }
        }

        args.push("--".to_string());
        args.push(request.url.clone());
        args
    }
}

impl FetchEngine for YtDlpEngine {
    fn fetch(
        &self,
        request: &FetchRequest,
        progress: &mut dyn FnMut(&ProgressSnapshot) -> Result<()>,
    ) -> Result<()> {
        std::fs::create_dir_all(&request.output_dir)?;
        std::fs::create_dir_all(&request.cache_dir)?;

        let mut child = Command::new(&self.binary_path)
            .args(Self::build_args(request))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::ExternalTool(format!("Failed to execute yt-dlp: {}", e)))?;

        // drain stderr on its own thread so a chatty child never blocks on a full pipe
        let stderr_reader = child.stderr.take().map(|mut stderr| {
            std::thread::spawn(move || {
                let mut buf = String::new();
                let _ = stderr.read_to_string(&mut buf);
                buf
            })
        });

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::ExternalTool("Failed to capture yt-dlp stdout".to_string()))?;

        let mut aborted = None;
        for line in BufReader::new(stdout).lines() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    tracing::debug!(error = %e, "stopped reading yt-dlp output");
                    break;
                }
            };
            if let Some(snapshot) = parse_progress_line(&line) {
                if let Err(e) = progress(&snapshot) {
                    aborted = Some(e);
                    break;
                }
            }
        }

        if let Some(e) = aborted {
            tracing::debug!(url = %request.url, "terminating yt-dlp");
            let _ = child.kill();
            let _ = child.wait();
            if let Some(reader) = stderr_reader {
                let _ = reader.join();
            }
            return Err(e);
        }

        let status = child.wait()?;
        let stderr = stderr_reader
            .and_then(|reader| reader.join().ok())
            .unwrap_or_default();

        if !status.success() {
            let message =
                last_error_line(&stderr).unwrap_or_else(|| format!("yt-dlp exited with {status}"));
            return Err(Error::FetchFailed(message));
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        "yt-dlp"
    }
}

/// Metadata resolver driving `yt-dlp --dump-single-json`
#[derive(Debug, Clone)]
pub struct YtDlpResolver {
    binary_path: PathBuf,
    socket_timeout: Duration,
}

impl YtDlpResolver {
    /// Create a resolver with an explicit binary path
    pub fn new(binary_path: PathBuf, socket_timeout: Duration) -> Self {
        Self {
            binary_path,
            socket_timeout,
        }
    }

    /// Build a session from yt-dlp's JSON description of `url`
    pub fn session_from_json(url: &str, info: serde_json::Value) -> Result<Session> {
        let content_id = info
            .get("id")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| Error::Metadata("missing id in media info".to_string()))?
            .to_string();

        let title = info
            .get("title")
            .and_then(|v| v.as_str())
            .unwrap_or("video")
            .to_string();

        let duration = info
            .get("duration")
            .and_then(|v| v.as_f64())
            .filter(|d| d.is_finite() && *d >= 0.0)
            .map(|d| d as u64);

        let thumbnail = info
            .get("thumbnail")
            .and_then(|v| v.as_str())
            .map(str::to_string);

        Ok(Session {
            url: url.to_string(),
            title,
            content_id,
            duration,
            thumbnail,
            raw_metadata: info,
        })
    }
}

#[async_trait]
impl MetadataResolver for YtDlpResolver {
    async fn resolve(&self, url: &str) -> Result<Session> {
        let output = tokio::process::Command::new(&self.binary_path)
            .arg("--dump-single-json")
            .arg("--no-playlist")
            .arg("--skip-download")
            .arg("--no-warnings")
            .arg("--socket-timeout")
            .arg(self.socket_timeout.as_secs().to_string())
            .arg("--")
            .arg(url)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| Error::ExternalTool(format!("Failed to execute yt-dlp: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = last_error_line(&stderr)
                .unwrap_or_else(|| format!("yt-dlp exited with {}", output.status));
            return Err(Error::Metadata(message));
        }

        let info: serde_json::Value = serde_json::from_slice(&output.stdout)
            .map_err(|e| Error::Metadata(format!("invalid media info: {}", e)))?;
        Self::session_from_json(url, info)
    }

    fn name(&self) -> &'static str {
        "yt-dlp"
    }
}
