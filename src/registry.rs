//! Per-user task registry
//!
//! Holds at most one task record per user. The user map is only write-locked
//! to insert a record; each record sits behind its own lock so one user's
//! updates never wait on another's. Once [`TaskRegistry::cancel_all`] ran, the
//! registry is closed and refuses new tasks.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::types::{MediaChoice, Status, TaskInfo, UserId};

/// Fields needed to register a task
#[derive(Clone, Debug)]
pub struct NewTask {
    /// Media title
    pub title: String,
    /// Source URL
    pub url: String,
    /// Content identifier used to find output files
    pub content_id: String,
    /// What was requested
    pub choice: MediaChoice,
}

/// A user's task record
#[derive(Debug)]
pub struct Task {
    /// Owner
    pub user_id: UserId,
    /// Media title
    pub title: String,
    /// Source URL
    pub url: String,
    /// Content identifier used to find output files
    pub content_id: String,
    /// What was requested
    pub choice: MediaChoice,
    /// Current status
    pub status: Status,
    /// Files selected for delivery, removed on cleanup
    pub collected_files: Vec<PathBuf>,
    /// When the task was accepted
    pub created_at: DateTime<Utc>,
    /// Last mutation
    pub updated_at: DateTime<Utc>,
    cancel: CancellationToken,
    work: Option<JoinHandle<()>>,
}

impl Task {
    fn new(user_id: UserId, new: NewTask) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            title: new.title,
            url: new.url,
            content_id: new.content_id,
            choice: new.choice,
            status: Status::Queued,
            collected_files: Vec::new(),
            created_at: now,
            updated_at: now,
            cancel: CancellationToken::new(),
            work: None,
        }
    }

    /// Move to `to` if the lifecycle allows it
    ///
    /// Terminal tasks never move. A `Both` task goes from `Sending` back to
    /// `Downloading` for its second pass.
    pub fn transition(&mut self, to: Status) -> bool {
        let allowed = match (self.status, to) {
            (from, _) if from.is_terminal() => false,
            (Status::Queued, Status::Downloading | Status::Canceled | Status::Error) => true,
            (
                Status::Downloading,
                Status::Downloading | Status::Sending | Status::Canceled | Status::Error,
            ) => true,
            (
                Status::Sending,
                Status::Downloading | Status::Done | Status::Canceled | Status::Error,
            ) => true,
            _ => false,
        };
        if allowed {
            self.status = to;
            self.touch();
        } else {
            tracing::warn!(
                user_id = self.user_id.0,
                from = %self.status,
                to = %to,
                "rejected task status transition"
            );
        }
        allowed
    }

    /// Refresh `updated_at`
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Whether cancellation was requested
    pub fn is_cancel_requested(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Snapshot for reporting
    pub fn info(&self) -> TaskInfo {
        TaskInfo {
            user_id: self.user_id,
            title: self.title.clone(),
            url: self.url.clone(),
            choice: self.choice,
            status: self.status,
            collected_files: self.collected_files.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Orchestrator's view of a freshly created task
#[derive(Clone, Debug)]
pub struct TaskHandle {
    /// Owner
    pub user_id: UserId,
    /// Cancellation flag and signal for this task
    pub cancel: CancellationToken,
}

/// Result of [`TaskRegistry::create`]
#[derive(Debug)]
pub enum CreateOutcome {
    /// The task was registered in `queued`
    Created(TaskHandle),
    /// The user already has an active task in this status
    Conflict(Status),
    /// The registry was closed for shutdown
    Closed,
}

/// Process-wide task registry, keyed by user
#[derive(Debug, Default)]
pub struct TaskRegistry {
    tasks: RwLock<HashMap<UserId, Arc<Mutex<Task>>>>,
    closed: AtomicBool,
}

impl TaskRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    async fn entry(&self, user_id: UserId) -> Option<Arc<Mutex<Task>>> {
        self.tasks.read().await.get(&user_id).cloned()
    }

    /// Register a new `queued` task unless the user already has an active one
    ///
    /// A finished task for the same user is replaced.
    pub async fn create(&self, user_id: UserId, new: NewTask) -> CreateOutcome {
        self.insert(user_id, new, |_| None).await
    }

    /// Register a new task and start its orchestrator with `spawn`
    ///
    /// The work handle is recorded before the task becomes visible, so
    /// [`TaskRegistry::cancel_all`] either sees the task with its work or the
    /// creation is refused as [`CreateOutcome::Closed`].
    pub async fn create_running<F>(&self, user_id: UserId, new: NewTask, spawn: F) -> CreateOutcome
    where
        F: FnOnce(TaskHandle) -> JoinHandle<()>,
    {
        self.insert(user_id, new, |handle| Some(spawn(handle.clone())))
            .await
    }

    async fn insert<F>(&self, user_id: UserId, new: NewTask, start: F) -> CreateOutcome
    where
        F: FnOnce(&TaskHandle) -> Option<JoinHandle<()>>,
    {
        let mut tasks = self.tasks.write().await;
        if self.closed.load(Ordering::SeqCst) {
            return CreateOutcome::Closed;
        }
        if let Some(existing) = tasks.get(&user_id) {
            let status = existing.lock().await.status;
            if status.is_active() {
                return CreateOutcome::Conflict(status);
            }
        }

        let mut task = Task::new(user_id, new);
        let handle = TaskHandle {
            user_id,
            cancel: task.cancel.clone(),
        };
        task.work = start(&handle);
        tasks.insert(user_id, Arc::new(Mutex::new(task)));
        CreateOutcome::Created(handle)
    }

    /// Snapshot of the user's task, if any
    pub async fn get(&self, user_id: UserId) -> Option<TaskInfo> {
        let entry = self.entry(user_id).await?;
        let task = entry.lock().await;
        Some(task.info())
    }

    /// Apply `f` to the user's task under its lock
    pub async fn mutate<F, R>(&self, user_id: UserId, f: F) -> Option<R>
    where
        F: FnOnce(&mut Task) -> R,
    {
        let entry = self.entry(user_id).await?;
        let mut task = entry.lock().await;
        Some(f(&mut task))
    }

    /// Empty the user's collected file list, returning what it held
    pub async fn clear_files(&self, user_id: UserId) -> Vec<PathBuf> {
        self.mutate(user_id, |task| {
            task.touch();
            std::mem::take(&mut task.collected_files)
        })
        .await
        .unwrap_or_default()
    }

    /// Request cancellation of the user's active task
    ///
    /// Returns `false` when the user has no task in an active status.
    pub async fn request_cancel(&self, user_id: UserId) -> bool {
        let Some(entry) = self.entry(user_id).await else {
            return false;
        };
        let task = entry.lock().await;
        if !task.status.is_active() {
            return false;
        }

        task.cancel.cancel();
        let running = task.work.as_ref().is_some_and(|w| !w.is_finished());
        tracing::info!(
            user_id = user_id.0,
            status = %task.status,
            running,
            "cancellation requested"
        );
        true
    }

    /// Close the registry, cancel every active task and hand back their
    /// orchestrators
    pub async fn cancel_all(&self) -> Vec<JoinHandle<()>> {
        let entries: Vec<_> = {
            let tasks = self.tasks.write().await;
            self.closed.store(true, Ordering::SeqCst);
            tasks.values().cloned().collect()
        };
        let mut handles = Vec::new();
        for entry in entries {
            let mut task = entry.lock().await;
            if task.status.is_active() {
                task.cancel.cancel();
            }
            if let Some(work) = task.work.take() {
                handles.push(work);
            }
        }
        handles
    }

    /// Number of tasks in an active status
    pub async fn active_count(&self) -> usize {
        let entries: Vec<_> = self.tasks.read().await.values().cloned().collect();
        let mut count = 0;
        for entry in entries {
            if entry.lock().await.status.is_active() {
                count += 1;
            }
        }
        count
    }
}
