//! Greeting, URL intake and output selection.

use serde::{Deserialize, Serialize};
use std::sync::atomic::Ordering;
use utoipa::ToSchema;

use crate::error::{Error, Result};
use crate::registry::{CreateOutcome, NewTask};
use crate::types::{Event, MediaChoice, TaskInfo, UserId};
use crate::utils::humanize_duration;

use super::MediaDownloader;
use super::download_task::{DownloadTaskContext, run_download_task};

/// Reply to the start command
pub const GREETING: &str =
    "Hi! I can download YouTube content for you. Send me a URL and choose audio, video or both.";

/// Prompt shown after a URL was resolved
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SessionPrompt {
    /// Media title
    pub title: String,
    /// Duration as `MM:SS`, `HH:MM:SS` or `unknown`
    pub duration: String,
    /// Thumbnail URL, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    /// Output forms the user can pick
    pub choices: Vec<MediaChoice>,
    /// Caption text
    pub message: String,
}

/// A selection that started a task
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Accepted {
    /// The task as registered
    pub task: TaskInfo,
    /// Reply text
    pub message: String,
}

/// User-facing reply for a failed command
pub fn error_reply(error: &Error) -> String {
    match error {
        Error::SessionNotFound { .. } => {
            "⚠️ Session not found. Please send the URL again.".to_string()
        }
        Error::Conflict { .. } => {
            "⚠️ A download is already in progress. Use /cancel to stop it.".to_string()
        }
        Error::InvalidUrl(_) | Error::Metadata(_) => "⚠️ Failed to fetch video info.".to_string(),
        Error::ShuttingDown => "⚠️ The service is shutting down. Try again later.".to_string(),
        Error::NotFound(reply) => reply.clone(),
        other => format!("⚠️ Error: {other}"),
    }
}

impl MediaDownloader {
    /// Greeting for the start command
    pub fn start(&self) -> &'static str {
        GREETING
    }

    /// Resolve `url` and store it as the user's pending session
    ///
    /// Replaces any session the user had before.
    pub async fn submit_url(&self, user_id: UserId, url: &str) -> Result<SessionPrompt> {
        let url = url.trim();
        let parsed =
            url::Url::parse(url).map_err(|e| Error::InvalidUrl(format!("'{}': {}", url, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Error::InvalidUrl(format!(
                "'{}': unsupported scheme {}",
                url,
                parsed.scheme()
            )));
        }

        tracing::info!(user_id = user_id.0, url, "resolving media info");
        let session = self.resolver.resolve(url).await.inspect_err(|e| {
            tracing::warn!(user_id = user_id.0, url, error = %e, "media info lookup failed");
        })?;

        let duration = humanize_duration(session.duration);
        let prompt = SessionPrompt {
            message: format!(
                "Title: {}\nDuration: {}\nWhat would you like to download?",
                session.title, duration
            ),
            title: session.title.clone(),
            duration,
            thumbnail: session.thumbnail.clone(),
            choices: vec![MediaChoice::Audio, MediaChoice::Video, MediaChoice::Both],
        };

        self.sessions.save(user_id, session).await;
        self.emit_event(Event::SessionCreated {
            user_id,
            title: prompt.title.clone(),
        });

        Ok(prompt)
    }

    /// Start a task for the user's pending session
    ///
    /// The session is consumed once the task is registered. Fails with
    /// [`Error::SessionNotFound`] when no session exists and with
    /// [`Error::Conflict`] when the user already has an active task, in which
    /// case the session is kept.
    pub async fn select(&self, user_id: UserId, choice: MediaChoice) -> Result<Accepted> {
        if !self.accepting_new.load(Ordering::SeqCst) {
            return Err(Error::ShuttingDown);
        }

        let session = self
            .sessions
            .resolve(user_id)
            .await
            .ok_or(Error::SessionNotFound { user_id })?;

        let new = NewTask {
            title: session.title.clone(),
            url: session.url.clone(),
            content_id: session.content_id.clone(),
            choice,
        };

        let title = session.title.clone();
        let pending = session.clone();
        let spawn = |handle| {
            let ctx = DownloadTaskContext::new(self.clone(), handle, session, choice);
            tokio::spawn(run_download_task(ctx))
        };
        match self.registry.create_running(user_id, new, spawn).await {
            CreateOutcome::Created(_) => {}
            CreateOutcome::Conflict(status) => {
                tracing::info!(user_id = user_id.0, %status, "selection refused, task active");
                return Err(Error::Conflict { user_id, status });
            }
            CreateOutcome::Closed => return Err(Error::ShuttingDown),
        }

        // single use; a URL sent in the meantime supersedes it and is kept
        self.sessions.consume_if_current(user_id, &pending).await;

        tracing::info!(user_id = user_id.0, %choice, title = %title, "task queued");
        self.emit_event(Event::TaskQueued {
            user_id,
            title: title.clone(),
            choice,
        });

        let task = self
            .registry
            .get(user_id)
            .await
            .ok_or_else(|| Error::NotFound(format!("task for user {}", user_id)))?;

        Ok(Accepted {
            task,
            message: format!("⏳ Queued: '{}' as {}…", title, choice),
        })
    }
}
