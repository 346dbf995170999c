//! Error types for dropzone-dl
//!
//! This module provides error handling for the library, including:
//! - The task failure taxonomy (resource exhaustion, fetch, missing output, cancellation)
//! - HTTP status code mapping for API integration
//! - Structured error responses with machine-readable error codes

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use utoipa::ToSchema;

use crate::types::{Status, UserId};

/// Result type alias for dropzone-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for dropzone-dl
///
/// The `Display` form of the task-level variants is shown to the user verbatim
/// when a download ends in the `error` state, so it must not carry secrets.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "MAX_HEIGHT")
        key: Option<String>,
    },

    /// Database operation failed
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// SQLx database error
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Resource not found
    #[error("not found: {0}")]
    NotFound(String),

    /// Shutdown in progress - not accepting new selections
    #[error("shutdown in progress: not accepting new downloads")]
    ShuttingDown,

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// API server error
    #[error("API server error: {0}")]
    ApiServerError(String),

    /// Not enough free disk space to attempt a fetch
    #[error("not enough disk space: need {required_mb} MB, have {available_mb} MB")]
    ResourceExhausted {
        /// Megabytes required before a fetch is attempted
        required_mb: u64,
        /// Megabytes currently available
        available_mb: u64,
    },

    /// Failed to check disk space
    #[error("failed to check disk space: {0}")]
    DiskSpaceCheckFailed(String),

    /// The fetch engine reported a failure
    #[error("download failed: {0}")]
    FetchFailed(String),

    /// The fetch reported success but no matching output was found on disk
    #[error("downloaded file not found for {content_id}")]
    OutputMissing {
        /// Content identifier the output files were expected to carry
        content_id: String,
    },

    /// Output still exceeds the transfer cap after the reduced-quality retry
    #[error("file too large even at reduced quality: {} ({size_mb} MB > {limit_mb} MB)", path.display())]
    OutputTooLarge {
        /// The oversized file
        path: PathBuf,
        /// Its size in megabytes
        size_mb: u64,
        /// The configured transfer cap in megabytes
        limit_mb: u64,
    },

    /// Cancellation was requested by the user
    #[error("download canceled by user")]
    Canceled,

    /// A single file could not be delivered (non-fatal for the batch)
    #[error("could not deliver {name}: {reason}")]
    DeliveryFailed {
        /// File name that failed
        name: String,
        /// Transport-reported reason
        reason: String,
    },

    /// The submitted text is not a usable URL
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// Metadata lookup for a URL failed
    #[error("failed to fetch media info: {0}")]
    Metadata(String),

    /// External tool execution failed (yt-dlp missing, bad exit, etc.)
    #[error("external tool error: {0}")]
    ExternalTool(String),

    /// No pending session for the user
    #[error("session not found for user {user_id}")]
    SessionNotFound {
        /// The user without a session
        user_id: UserId,
    },

    /// The user already has an active task
    #[error("a download is already in progress for user {user_id} ({status})")]
    Conflict {
        /// The user with the active task
        user_id: UserId,
        /// Status of the existing task
        status: Status,
    },

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Database-related errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to connect to database
    #[error("failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Failed to run migrations
    #[error("failed to run migrations: {0}")]
    MigrationFailed(String),

    /// Query failed
    #[error("query failed: {0}")]
    QueryFailed(String),
}

/// API error response format
///
/// # Example JSON Response
///
/// ```json
/// {
///   "error": {
///     "code": "conflict",
///     "message": "a download is already in progress for user 7 (downloading)",
///     "details": { "user_id": 7, "status": "downloading" }
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// The error details
    pub error: ErrorDetail,
}

/// Detailed error information for API responses
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "not_found", "conflict")
    pub code: String,

    /// Human-readable error message
    pub message: String,

    /// Optional additional context about the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with code and message
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    /// Create a "not found" error
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::new("not_found", format!("{} not found", resource.into()))
    }

    /// Create a "validation error" error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new("validation_error", message)
    }

    /// Create an "unauthorized" error
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("unauthorized", message)
    }
}

/// Convert errors to HTTP status codes for API responses
pub trait ToHttpStatus {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> u16;

    /// Get the machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToHttpStatus for Error {
    fn status_code(&self) -> u16 {
        match self {
            Error::Config { .. } => 400,
            Error::InvalidUrl(_) => 400,

            Error::NotFound(_) => 404,
            Error::SessionNotFound { .. } => 404,
            Error::OutputMissing { .. } => 404,

            Error::Conflict { .. } => 409,
            Error::Canceled => 409,

            Error::ResourceExhausted { .. } => 422,
            Error::OutputTooLarge { .. } => 422,

            Error::Database(_) => 500,
            Error::Sqlx(_) => 500,
            Error::Io(_) => 500,
            Error::ApiServerError(_) => 500,
            Error::DiskSpaceCheckFailed(_) => 500,
            Error::Serialization(_) => 500,
            Error::Other(_) => 500,

            Error::Network(_) => 502,
            Error::FetchFailed(_) => 502,
            Error::Metadata(_) => 502,
            Error::DeliveryFailed { .. } => 502,

            Error::ShuttingDown => 503,
            Error::ExternalTool(_) => 503,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Database(_) | Error::Sqlx(_) => "database_error",
            Error::Io(_) => "io_error",
            Error::NotFound(_) => "not_found",
            Error::ShuttingDown => "shutting_down",
            Error::Network(_) => "network_error",
            Error::Serialization(_) => "serialization_error",
            Error::ApiServerError(_) => "api_server_error",
            Error::ResourceExhausted { .. } => "resource_exhausted",
            Error::DiskSpaceCheckFailed(_) => "disk_space_check_failed",
            Error::FetchFailed(_) => "fetch_failed",
            Error::OutputMissing { .. } => "output_missing",
            Error::OutputTooLarge { .. } => "output_too_large",
            Error::Canceled => "canceled",
            Error::DeliveryFailed { .. } => "delivery_failed",
            Error::InvalidUrl(_) => "invalid_url",
            Error::Metadata(_) => "metadata_error",
            Error::ExternalTool(_) => "external_tool_error",
            Error::SessionNotFound { .. } => "session_not_found",
            Error::Conflict { .. } => "conflict",
            Error::Other(_) => "internal_error",
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        let code = error.error_code().to_string();
        let message = error.to_string();

        let details = match &error {
            Error::Config { key: Some(key), .. } => Some(serde_json::json!({ "key": key })),
            Error::ResourceExhausted {
                required_mb,
                available_mb,
            } => Some(serde_json::json!({
                "required_mb": required_mb,
                "available_mb": available_mb,
            })),
            Error::SessionNotFound { user_id } => Some(serde_json::json!({
                "user_id": user_id,
            })),
            Error::Conflict { user_id, status } => Some(serde_json::json!({
                "user_id": user_id,
                "status": status,
            })),
            Error::OutputTooLarge {
                path,
                size_mb,
                limit_mb,
            } => Some(serde_json::json!({
                "path": path,
                "size_mb": size_mb,
                "limit_mb": limit_mb,
            })),
            _ => None,
        };

        ApiError {
            error: ErrorDetail {
                code,
                message,
                details,
            },
        }
    }
}
