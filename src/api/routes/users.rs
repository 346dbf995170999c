//! Per-user command handlers.

use crate::api::AppState;
use crate::downloader::{cancel_reply, describe_task, error_reply};
use crate::error::{ApiError, Error, ToHttpStatus};
use crate::types::UserId;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use super::{MessageResponse, SelectionRequest, SubmitUrlRequest, TaskReport};

/// Error response carrying the chat reply for the failure in `details.reply`
fn reply_error(error: Error) -> Response {
    let status =
        StatusCode::from_u16(error.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let reply = error_reply(&error);

    let mut api_error: ApiError = error.into();
    match api_error
        .error
        .details
        .as_mut()
        .and_then(|d| d.as_object_mut())
    {
        Some(details) => {
            details.insert("reply".to_string(), json!(reply));
        }
        None => api_error.error.details = Some(json!({ "reply": reply })),
    }

    (status, Json(api_error)).into_response()
}

/// POST /users/:user_id/url - Resolve a URL and store it as the user's session
#[utoipa::path(
    post,
    path = "/api/v1/users/{user_id}/url",
    tag = "users",
    params(
        ("user_id" = i64, Path, description = "User ID")
    ),
    request_body = SubmitUrlRequest,
    responses(
        (status = 200, description = "Media info resolved, choose an output form", body = crate::downloader::SessionPrompt),
        (status = 400, description = "Not an http(s) URL", body = crate::error::ApiError),
        (status = 502, description = "Media info lookup failed", body = crate::error::ApiError),
        (status = 503, description = "yt-dlp unavailable", body = crate::error::ApiError)
    )
)]
pub async fn submit_url(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
    Json(request): Json<SubmitUrlRequest>,
) -> Response {
    match state.downloader.submit_url(user_id, &request.url).await {
        Ok(prompt) => (StatusCode::OK, Json(prompt)).into_response(),
        Err(e) => reply_error(e),
    }
}

/// POST /users/:user_id/selection - Start the task for the pending session
#[utoipa::path(
    post,
    path = "/api/v1/users/{user_id}/selection",
    tag = "users",
    params(
        ("user_id" = i64, Path, description = "User ID")
    ),
    request_body = SelectionRequest,
    responses(
        (status = 202, description = "Task queued", body = crate::downloader::Accepted),
        (status = 404, description = "No pending session", body = crate::error::ApiError),
        (status = 409, description = "A task is already active", body = crate::error::ApiError),
        (status = 503, description = "Shutting down", body = crate::error::ApiError)
    )
)]
pub async fn select(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
    Json(request): Json<SelectionRequest>,
) -> Response {
    match state.downloader.select(user_id, request.choice).await {
        Ok(accepted) => (StatusCode::ACCEPTED, Json(accepted)).into_response(),
        Err(e) => reply_error(e),
    }
}

/// GET /users/:user_id/download - The user's current task
#[utoipa::path(
    get,
    path = "/api/v1/users/{user_id}/download",
    tag = "users",
    params(
        ("user_id" = i64, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "Current task", body = TaskReport),
        (status = 404, description = "No recorded task", body = crate::error::ApiError)
    )
)]
pub async fn get_download(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
) -> Response {
    match state.downloader.list_downloads(user_id).await {
        Some(task) => {
            let message = describe_task(Some(&task));
            (StatusCode::OK, Json(TaskReport { task, message })).into_response()
        }
        None => reply_error(Error::NotFound(describe_task(None))),
    }
}

/// POST /users/:user_id/download/cancel - Request cancellation
#[utoipa::path(
    post,
    path = "/api/v1/users/{user_id}/download/cancel",
    tag = "users",
    params(
        ("user_id" = i64, Path, description = "User ID")
    ),
    responses(
        (status = 202, description = "Cancellation requested", body = MessageResponse),
        (status = 404, description = "No active task", body = crate::error::ApiError)
    )
)]
pub async fn cancel_download(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
) -> Response {
    if state.downloader.cancel(user_id).await {
        let message = cancel_reply(true).to_string();
        (StatusCode::ACCEPTED, Json(MessageResponse { message })).into_response()
    } else {
        reply_error(Error::NotFound(cancel_reply(false).to_string()))
    }
}

/// POST /users/:user_id/download/clear - Delete the stored outputs of the last task
#[utoipa::path(
    post,
    path = "/api/v1/users/{user_id}/download/clear",
    tag = "users",
    params(
        ("user_id" = i64, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "Files removed", body = crate::downloader::ClearOutcome),
        (status = 404, description = "No recorded task", body = crate::error::ApiError),
        (status = 409, description = "Task still active", body = crate::error::ApiError)
    )
)]
pub async fn clear_download(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
) -> Response {
    match state.downloader.clear_downloads(user_id).await {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(e) => reply_error(e),
    }
}
