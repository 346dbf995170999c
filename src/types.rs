//! Core types for dropzone-dl

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use utoipa::ToSchema;

/// Identifier of the user a session and task belong to
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl UserId {
    /// Get the inner i64 value
    pub fn get(&self) -> i64 {
        self.0
    }
}

impl From<i64> for UserId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for UserId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

impl sqlx::Type<sqlx::Sqlite> for UserId {
    fn type_info() -> sqlx::sqlite::SqliteTypeInfo {
        <i64 as sqlx::Type<sqlx::Sqlite>>::type_info()
    }

    fn compatible(ty: &sqlx::sqlite::SqliteTypeInfo) -> bool {
        <i64 as sqlx::Type<sqlx::Sqlite>>::compatible(ty)
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Sqlite> for UserId {
    fn encode_by_ref(
        &self,
        buf: &mut Vec<sqlx::sqlite::SqliteArgumentValue<'q>>,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        sqlx::Encode::<sqlx::Sqlite>::encode_by_ref(&self.0, buf)
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Sqlite> for UserId {
    fn decode(value: sqlx::sqlite::SqliteValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let id = <i64 as sqlx::Decode<sqlx::Sqlite>>::decode(value)?;
        Ok(Self(id))
    }
}

/// Task status
///
/// `Queued -> Downloading -> Sending -> Done`, with `Downloading` and
/// `Sending` able to end in `Canceled` or `Error`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Accepted, orchestrator not yet running
    Queued,
    /// Fetch in progress
    Downloading,
    /// Delivering files to the user
    Sending,
    /// All kinds delivered
    Done,
    /// Canceled by the user
    Canceled,
    /// Ended with an unrecoverable fault
    Error,
}

impl Status {
    /// Whether a task in this status blocks a new selection for the same user
    pub fn is_active(&self) -> bool {
        matches!(self, Status::Queued | Status::Downloading | Status::Sending)
    }

    /// Whether this status is final
    pub fn is_terminal(&self) -> bool {
        matches!(self, Status::Done | Status::Canceled | Status::Error)
    }

    /// Lowercase name, as serialized
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Queued => "queued",
            Status::Downloading => "downloading",
            Status::Sending => "sending",
            Status::Done => "done",
            Status::Canceled => "canceled",
            Status::Error => "error",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single output form produced by one fetch pass
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// Audio-only (mp3)
    Audio,
    /// Video with audio
    Video,
}

impl MediaKind {
    /// Lowercase name used in user-facing messages
    pub fn label(&self) -> &'static str {
        match self {
            MediaKind::Audio => "audio",
            MediaKind::Video => "video",
        }
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// What the user asked for
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum MediaChoice {
    /// Audio only
    Audio,
    /// Video only
    Video,
    /// Video pass, then audio pass
    Both,
}

impl MediaChoice {
    /// Kinds fetched for this choice, in order
    pub fn kinds(&self) -> &'static [MediaKind] {
        match self {
            MediaChoice::Audio => &[MediaKind::Audio],
            MediaChoice::Video => &[MediaKind::Video],
            MediaChoice::Both => &[MediaKind::Video, MediaKind::Audio],
        }
    }

    /// Lowercase name used in user-facing messages
    pub fn label(&self) -> &'static str {
        match self {
            MediaChoice::Audio => "audio",
            MediaChoice::Video => "video",
            MediaChoice::Both => "both",
        }
    }
}

impl std::fmt::Display for MediaChoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for MediaChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "audio" => Ok(MediaChoice::Audio),
            "video" => Ok(MediaChoice::Video),
            "both" => Ok(MediaChoice::Both),
            other => Err(format!("unknown choice '{other}' (expected audio, video or both)")),
        }
    }
}

/// How a file is handed to the delivery channel
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryKind {
    /// Sent as an audio track
    Audio,
    /// Sent as a playable video
    Video,
    /// Sent as a plain document
    Generic,
}

/// Phase reported by the fetch engine
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ProgressPhase {
    /// Bytes are still arriving
    Downloading,
    /// Transfer finished, merging or converting
    Finalizing,
}

/// One raw progress report from the fetch engine
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProgressSnapshot {
    /// Bytes downloaded so far
    pub downloaded_bytes: u64,
    /// Total bytes, `0` when unknown
    pub total_bytes: u64,
    /// Current transfer speed
    pub speed_bytes_per_sec: Option<f64>,
    /// Estimated seconds remaining
    pub eta_seconds: Option<u64>,
    /// Engine phase
    pub phase: ProgressPhase,
}

impl ProgressSnapshot {
    /// Snapshot for the downloading phase
    pub fn downloading(downloaded_bytes: u64, total_bytes: u64) -> Self {
        Self {
            downloaded_bytes,
            total_bytes,
            speed_bytes_per_sec: None,
            eta_seconds: None,
            phase: ProgressPhase::Downloading,
        }
    }

    /// Snapshot marking the finalizing phase
    pub fn finalizing() -> Self {
        Self {
            downloaded_bytes: 0,
            total_bytes: 0,
            speed_bytes_per_sec: None,
            eta_seconds: None,
            phase: ProgressPhase::Finalizing,
        }
    }

    /// Whole percentage, `None` when the total is unknown
    pub fn percent(&self) -> Option<u8> {
        if self.total_bytes == 0 {
            return None;
        }
        let pct = self.downloaded_bytes.saturating_mul(100) / self.total_bytes;
        Some(pct.min(100) as u8)
    }
}

/// Pending URL selection, created when a URL is resolved
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Session {
    /// URL the user submitted
    pub url: String,
    /// Media title
    pub title: String,
    /// Extractor content identifier, embedded in output file names
    pub content_id: String,
    /// Duration in seconds, if known
    #[serde(default)]
    pub duration: Option<u64>,
    /// Thumbnail URL, if any
    #[serde(default)]
    pub thumbnail: Option<String>,
    /// Raw metadata as returned by the resolver
    #[serde(default)]
    #[schema(value_type = Object)]
    pub raw_metadata: serde_json::Value,
}

/// Snapshot of a user's current task
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct TaskInfo {
    /// Owner
    pub user_id: UserId,
    /// Media title
    pub title: String,
    /// Source URL
    pub url: String,
    /// What was requested
    pub choice: MediaChoice,
    /// Current status
    pub status: Status,
    /// Files recorded for delivery and cleanup
    pub collected_files: Vec<PathBuf>,
    /// When the task was accepted
    pub created_at: DateTime<Utc>,
    /// Last status change
    pub updated_at: DateTime<Utc>,
}

/// Event emitted during a task lifecycle
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A URL was resolved and stored as the user's session
    SessionCreated {
        /// Owner
        user_id: UserId,
        /// Media title
        title: String,
    },

    /// A selection was accepted
    TaskQueued {
        /// Owner
        user_id: UserId,
        /// Media title
        title: String,
        /// What was requested
        choice: MediaChoice,
    },

    /// The task moved to a new status
    StatusChanged {
        /// Owner
        user_id: UserId,
        /// New status
        status: Status,
    },

    /// A message was sent to the user (throttled progress included)
    Notice {
        /// Recipient
        user_id: UserId,
        /// Message text
        text: String,
    },

    /// A file reached the delivery channel
    FileDelivered {
        /// Recipient
        user_id: UserId,
        /// Delivered file
        path: PathBuf,
        /// Transport handling used
        kind: DeliveryKind,
    },

    /// A single file could not be delivered
    DeliveryFailed {
        /// Recipient
        user_id: UserId,
        /// File that failed
        path: PathBuf,
        /// Reason
        error: String,
    },

    /// The task reached a terminal status
    TaskFinished {
        /// Owner
        user_id: UserId,
        /// Terminal status
        status: Status,
        /// Failure description for `error`
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    /// Graceful shutdown started
    Shutdown,
}
