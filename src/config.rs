//! Configuration types for dropzone-dl
//!
//! Every setting has a serde default so an empty document (or an empty
//! environment) yields a working configuration. [`Config::from_env`] overlays
//! process environment variables, after loading a `.env` file if present.

use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, path::PathBuf, str::FromStr, time::Duration};
use utoipa::ToSchema;

use crate::error::{Error, Result};

/// Floor for the free-space preflight, regardless of the transfer cap
pub const MIN_FREE_SPACE_MB: u64 = 2000;

/// Download behavior configuration (directories, transfer cap, cleanup)
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct DownloadConfig {
    /// Root output directory (default: "./downloads")
    ///
    /// Each user gets a `user-<id>` subdirectory.
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,

    /// Largest file the delivery channel accepts, in MiB (default: 1900)
    #[serde(default = "default_max_transfer_mb")]
    pub max_transfer_mb: u64,

    /// Remove delivered files once a task ends (default: true)
    #[serde(default = "default_true")]
    pub cleanup_after_delivery: bool,

    /// Floor for the free-space preflight in MB (default: 2000)
    #[serde(default = "default_min_free_space_mb")]
    pub min_free_space_mb: u64,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
            max_transfer_mb: default_max_transfer_mb(),
            cleanup_after_delivery: true,
            min_free_space_mb: default_min_free_space_mb(),
        }
    }
}

impl DownloadConfig {
    /// Free space required before a fetch is attempted: `max(2 × cap, floor)` MB
    pub fn required_free_mb(&self) -> u64 {
        self.max_transfer_mb
            .saturating_mul(2)
            .max(self.min_free_space_mb)
    }

    /// Transfer cap in bytes
    pub fn max_transfer_bytes(&self) -> u64 {
        self.max_transfer_mb.saturating_mul(1024 * 1024)
    }
}

/// Output quality targets and their size-gate fallbacks
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct QualityConfig {
    /// Maximum video height for the first attempt (default: 720)
    #[serde(default = "default_max_video_height")]
    pub max_video_height: u32,

    /// Video height used by the reduced-quality retry (default: 480)
    #[serde(default = "default_fallback_video_height")]
    pub fallback_video_height: u32,

    /// MP3 bitrate for the first attempt, in kbps (default: 128)
    #[serde(default = "default_audio_bitrate_kbps")]
    pub audio_bitrate_kbps: u32,

    /// MP3 bitrate used by the reduced-quality retry (default: 96)
    #[serde(default = "default_fallback_audio_bitrate_kbps")]
    pub fallback_audio_bitrate_kbps: u32,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            max_video_height: default_max_video_height(),
            fallback_video_height: default_fallback_video_height(),
            audio_bitrate_kbps: default_audio_bitrate_kbps(),
            fallback_audio_bitrate_kbps: default_fallback_audio_bitrate_kbps(),
        }
    }
}

impl QualityConfig {
    /// Retry height, never above the primary height
    pub fn effective_fallback_height(&self) -> u32 {
        self.fallback_video_height.min(self.max_video_height)
    }

    /// Retry bitrate, never above the primary bitrate
    pub fn effective_fallback_bitrate(&self) -> u32 {
        self.fallback_audio_bitrate_kbps
            .min(self.audio_bitrate_kbps)
    }
}

/// Fetch engine (yt-dlp) settings
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct EngineConfig {
    /// Network socket timeout (default: 30 seconds)
    #[serde(default = "default_socket_timeout", with = "duration_serde")]
    #[schema(value_type = u64)]
    pub socket_timeout: Duration,

    /// Retries passed to the engine for transient network errors (default: 3)
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Fragments fetched in parallel for segmented streams (default: 3)
    #[serde(default = "default_concurrent_fragments")]
    pub concurrent_fragments: u32,

    /// Path to the yt-dlp executable (auto-detected if None)
    #[serde(default)]
    pub ytdlp_path: Option<PathBuf>,

    /// Whether to search PATH for yt-dlp if no explicit path is set (default: true)
    #[serde(default = "default_true")]
    pub search_path: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            socket_timeout: default_socket_timeout(),
            retries: default_retries(),
            concurrent_fragments: default_concurrent_fragments(),
            ytdlp_path: None,
            search_path: true,
        }
    }
}

/// Session persistence configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct PersistenceConfig {
    /// SQLite path (default: "<download_dir>/sessions.db")
    #[serde(default)]
    pub database_path: Option<PathBuf>,
}

/// Where finished files go
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct DeliveryConfig {
    /// HTTP endpoint receiving notifications and multipart file uploads
    ///
    /// When unset, files are copied into `outbox_dir` instead.
    #[serde(default)]
    pub webhook_url: Option<String>,

    /// Optional `Authorization` header value for the webhook
    #[serde(default)]
    pub auth_header: Option<String>,

    /// Timeout for a single webhook request (default: 30 seconds)
    #[serde(default = "default_delivery_timeout", with = "duration_serde")]
    #[schema(value_type = u64)]
    pub timeout: Duration,

    /// Local outbox directory (default: "./outbox")
    #[serde(default = "default_outbox_dir")]
    pub outbox_dir: PathBuf,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            auth_header: None,
            timeout: default_delivery_timeout(),
            outbox_dir: default_outbox_dir(),
        }
    }
}

/// REST API configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiConfig {
    /// Address to bind to (default: 127.0.0.1:6790)
    #[serde(default = "default_bind_address")]
    #[schema(value_type = String)]
    pub bind_address: SocketAddr,

    /// Optional API key for authentication
    #[serde(default)]
    pub api_key: Option<String>,

    /// Enable CORS for browser access (default: true)
    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// Allowed CORS origins (default: ["*"])
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Enable Swagger UI at /swagger-ui (default: true)
    #[serde(default = "default_true")]
    pub swagger_ui: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            api_key: None,
            cors_enabled: true,
            cors_origins: default_cors_origins(),
            swagger_ui: true,
        }
    }
}

/// Main configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct Config {
    /// Directories, transfer cap and cleanup policy
    #[serde(default)]
    pub download: DownloadConfig,

    /// Quality targets and fallbacks
    #[serde(default)]
    pub quality: QualityConfig,

    /// Fetch engine settings
    #[serde(default)]
    pub engine: EngineConfig,

    /// Session persistence
    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// Delivery channel
    #[serde(default)]
    pub delivery: DeliveryConfig,

    /// REST API
    #[serde(default)]
    pub api: ApiConfig,
}

impl Config {
    /// Download directory
    pub fn download_dir(&self) -> &PathBuf {
        &self.download.download_dir
    }

    /// Resolved session database path
    pub fn database_path(&self) -> PathBuf {
        self.persistence
            .database_path
            .clone()
            .unwrap_or_else(|| self.download.download_dir.join("sessions.db"))
    }

    /// Build a configuration from the process environment
    ///
    /// A `.env` file in the working directory is loaded first; variables
    /// already set in the environment take precedence over it.
    pub fn from_env() -> Result<Self> {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                tracing::warn!(error = %e, "failed to load .env file");
            }
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup
    ///
    /// Unset keys keep their defaults. Numeric keys that fail to parse are
    /// rejected with [`Error::Config`] naming the key.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        if let Some(dir) = lookup("DOWNLOAD_DIR") {
            config.download.download_dir = PathBuf::from(dir);
        }
        if let Some(mb) = parse_key(&lookup, "MAX_TRANSFER_MB")? {
            config.download.max_transfer_mb = mb;
        } else if let Some(mb) = parse_key(&lookup, "TELEGRAM_MAX_MB")? {
            config.download.max_transfer_mb = mb;
        }
        if let Some(mb) = parse_key(&lookup, "MIN_FREE_MB")? {
            config.download.min_free_space_mb = mb;
        }
        if let Some(flag) = lookup("CLEANUP_AFTER_SEND") {
            config.download.cleanup_after_delivery = parse_flag(&flag);
        }

        if let Some(h) = parse_key(&lookup, "MAX_HEIGHT")? {
            config.quality.max_video_height = h;
        }
        if let Some(h) = parse_key(&lookup, "FALLBACK_HEIGHT")? {
            config.quality.fallback_video_height = h;
        }
        if let Some(k) = parse_key(&lookup, "AUDIO_KBITRATE")? {
            config.quality.audio_bitrate_kbps = k;
        }
        if let Some(k) = parse_key(&lookup, "FALLBACK_AUDIO_KBITRATE")? {
            config.quality.fallback_audio_bitrate_kbps = k;
        }

        if let Some(secs) = parse_key(&lookup, "SOCKET_TIMEOUT")? {
            config.engine.socket_timeout = Duration::from_secs(secs);
        }
        if let Some(n) = parse_key(&lookup, "YTDLP_RETRIES")? {
            config.engine.retries = n;
        }
        if let Some(n) = parse_key(&lookup, "CONCURRENT_FRAGMENTS")? {
            config.engine.concurrent_fragments = n;
        }
        if let Some(path) = lookup("YTDLP_PATH") {
            config.engine.ytdlp_path = Some(PathBuf::from(path));
        }

        if let Some(path) = lookup("SESSIONS_DB") {
            config.persistence.database_path = Some(PathBuf::from(path));
        }

        if let Some(url) = lookup("DELIVERY_WEBHOOK_URL") {
            config.delivery.webhook_url = Some(url);
        }
        if let Some(header) = lookup("DELIVERY_AUTH_HEADER") {
            config.delivery.auth_header = Some(header);
        }
        if let Some(dir) = lookup("OUTBOX_DIR") {
            config.delivery.outbox_dir = PathBuf::from(dir);
        }

        if let Some(addr) = parse_key(&lookup, "API_BIND")? {
            config.api.bind_address = addr;
        }
        if let Some(key) = lookup("API_KEY") {
            config.api.api_key = Some(key);
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would make every task fail
    pub fn validate(&self) -> Result<()> {
        let checks = [
            (self.download.max_transfer_mb, "max_transfer_mb"),
            (u64::from(self.quality.max_video_height), "max_video_height"),
            (
                u64::from(self.quality.fallback_video_height),
                "fallback_video_height",
            ),
            (
                u64::from(self.quality.audio_bitrate_kbps),
                "audio_bitrate_kbps",
            ),
            (
                u64::from(self.quality.fallback_audio_bitrate_kbps),
                "fallback_audio_bitrate_kbps",
            ),
        ];
        for (value, key) in checks {
            if value == 0 {
                return Err(Error::Config {
                    message: format!("{key} must be greater than zero"),
                    key: Some(key.to_string()),
                });
            }
        }
        Ok(())
    }
}

fn parse_key<F, T>(lookup: &F, key: &str) -> Result<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw.trim().parse().map(Some).map_err(|e| Error::Config {
            message: format!("invalid value '{raw}' for {key}: {e}"),
            key: Some(key.to_string()),
        }),
    }
}

/// `1`, `true` and `yes` (any case) enable a flag; anything else disables it
fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes"
    )
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("./downloads")
}

fn default_max_transfer_mb() -> u64 {
    1900
}

fn default_min_free_space_mb() -> u64 {
    MIN_FREE_SPACE_MB
}

fn default_true() -> bool {
    true
}

fn default_max_video_height() -> u32 {
    720
}

fn default_fallback_video_height() -> u32 {
    480
}

fn default_audio_bitrate_kbps() -> u32 {
    128
}

fn default_fallback_audio_bitrate_kbps() -> u32 {
    96
}

fn default_socket_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_retries() -> u32 {
    3
}

fn default_concurrent_fragments() -> u32 {
    3
}

fn default_delivery_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_outbox_dir() -> PathBuf {
    PathBuf::from("./outbox")
}

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 6790))
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
