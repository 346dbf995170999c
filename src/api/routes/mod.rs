//! Route handlers for the REST API
//!
//! Handlers are organized by domain:
//! - [`users`] - Per-user commands: URL intake, selection, status, cancel, clear
//! - [`system`] - Greeting, health, events, OpenAPI

use serde::{Deserialize, Serialize};

use crate::types::{MediaChoice, TaskInfo};

mod system;
mod users;

pub use system::*;
pub use users::*;

// ============================================================================
// Request/Response Types (shared across handlers)
// ============================================================================

/// Request body for POST /users/:user_id/url
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct SubmitUrlRequest {
    /// Media page URL (http or https)
    pub url: String,
}

/// Request body for POST /users/:user_id/selection
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct SelectionRequest {
    /// `audio`, `video` or `both`
    pub choice: MediaChoice,
}

/// Plain reply text
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct MessageResponse {
    /// Reply shown to the user
    pub message: String,
}

/// Response for GET /users/:user_id/download
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct TaskReport {
    /// The user's current task
    pub task: TaskInfo,
    /// Human-readable summary
    pub message: String,
}
