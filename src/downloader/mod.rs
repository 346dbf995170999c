//! Core downloader implementation split into focused submodules.
//!
//! The `MediaDownloader` struct and its methods are organized by domain:
//! - [`intake`] - Greeting, URL resolution and output selection
//! - [`control`] - Task listing, cancellation and stored-file cleanup
//! - [`lifecycle`] - Shutdown coordination
//! - [`download_task`] - Per-task fetch, size gate and delivery

mod control;
mod download_task;
mod intake;
mod lifecycle;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use control::{ClearOutcome, cancel_reply, describe_task};
pub use intake::{Accepted, GREETING, SessionPrompt, error_reply};

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use crate::config::Config;
use crate::db::Database;
use crate::delivery::{self, DeliveryTarget};
use crate::engine::{
    FetchEngine, MetadataResolver, UnavailableEngine, UnavailableResolver, YtDlpEngine,
    YtDlpResolver, locate_ytdlp,
};
use crate::error::{Error, Result};
use crate::registry::TaskRegistry;
use crate::session::SessionStore;
use crate::types::{Event, UserId};

/// Main downloader instance (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct MediaDownloader {
    /// Session database, shared with the session store
    pub db: Arc<Database>,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: tokio::sync::broadcast::Sender<Event>,
    /// Configuration (wrapped in Arc for sharing across tasks)
    pub(crate) config: Arc<Config>,
    /// One task record per user
    pub(crate) registry: Arc<TaskRegistry>,
    /// Pending URL sessions
    pub(crate) sessions: Arc<SessionStore>,
    /// Media fetcher, run on blocking workers
    pub(crate) engine: Arc<dyn FetchEngine>,
    /// URL metadata lookup
    pub(crate) resolver: Arc<dyn MetadataResolver>,
    /// Channel back to users
    pub(crate) delivery: Arc<dyn DeliveryTarget>,
    /// Cleared during shutdown so new selections are refused
    pub(crate) accepting_new: Arc<AtomicBool>,
}

impl MediaDownloader {
    /// Create a new MediaDownloader instance
    ///
    /// This initializes all core components:
    /// - Creates the download directory
    /// - Opens/creates the session database and runs migrations
    /// - Builds the delivery target described by configuration
    /// - Sets up the task registry and the event broadcast channel
    pub async fn new(
        config: Config,
        engine: Arc<dyn FetchEngine>,
        resolver: Arc<dyn MetadataResolver>,
    ) -> Result<Self> {
        config.validate()?;

        tokio::fs::create_dir_all(config.download_dir())
            .await
            .map_err(|e| {
                Error::Io(std::io::Error::new(
                    e.kind(),
                    format!(
                        "Failed to create download directory '{}': {}",
                        config.download_dir().display(),
                        e
                    ),
                ))
            })?;

        let db = Arc::new(Database::new(&config.database_path()).await?);
        let sessions = Arc::new(SessionStore::new(db.clone()));
        let delivery = delivery::from_config(&config)?;

        // Buffer up to 1000 events per subscriber
        let (event_tx, _rx) = tokio::sync::broadcast::channel(1000);

        tracing::info!(
            engine = engine.name(),
            resolver = resolver.name(),
            download_dir = %config.download_dir().display(),
            "downloader initialized"
        );

        Ok(Self {
            db,
            event_tx,
            config: Arc::new(config),
            registry: Arc::new(TaskRegistry::new()),
            sessions,
            engine,
            resolver,
            delivery,
            accepting_new: Arc::new(AtomicBool::new(true)),
        })
    }

    /// Create a downloader backed by yt-dlp when it can be located
    ///
    /// Without a yt-dlp binary the downloader still starts, and every fetch
    /// or lookup fails with [`Error::ExternalTool`].
    pub async fn from_config(config: Config) -> Result<Self> {
        let (engine, resolver): (Arc<dyn FetchEngine>, Arc<dyn MetadataResolver>) =
            match locate_ytdlp(&config) {
                Some(path) => (
                    Arc::new(YtDlpEngine::new(path.clone())),
                    Arc::new(YtDlpResolver::new(path, config.engine.socket_timeout)),
                ),
                None => {
                    tracing::warn!("yt-dlp not found; downloads will fail until it is installed");
                    (Arc::new(UnavailableEngine), Arc::new(UnavailableResolver))
                }
            };
        Self::new(config, engine, resolver).await
    }

    /// Replace the delivery target
    pub fn with_delivery(mut self, delivery: Arc<dyn DeliveryTarget>) -> Self {
        tracing::info!(delivery = delivery.name(), "delivery target replaced");
        self.delivery = delivery;
        self
    }

    /// Subscribe to task events
    ///
    /// Multiple subscribers are supported. Each subscriber receives all events independently.
    /// A subscriber that falls behind by more than 1000 events receives `RecvError::Lagged`.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use dropzone_dl::{Config, MediaDownloader};
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ///     let downloader = MediaDownloader::from_config(Config::default()).await?;
    ///
    ///     let mut events = downloader.subscribe();
    ///     tokio::spawn(async move {
    ///         while let Ok(event) = events.recv().await {
    ///             tracing::info!(?event, "task event");
    ///         }
    ///     });
    ///
    ///     Ok(())
    /// }
    /// ```
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Get the current configuration
    pub fn get_config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    /// Output directory for one user's files
    pub fn user_dir(&self, user_id: UserId) -> PathBuf {
        self.config
            .download_dir()
            .join(format!("user-{}", user_id))
    }

    /// Emit an event to all subscribers
    ///
    /// If there are no active subscribers, the event is silently dropped.
    pub(crate) fn emit_event(&self, event: Event) {
        self.event_tx.send(event).ok();
    }

    /// Send a notice to the user and mirror it as an event
    ///
    /// Delivery failures are logged and otherwise ignored.
    pub(crate) async fn notify(&self, user_id: UserId, text: &str) {
        if let Err(e) = self.delivery.notify(user_id, text).await {
            tracing::warn!(user_id = user_id.0, error = %e, "failed to deliver notice");
        }
        self.emit_event(Event::Notice {
            user_id,
            text: text.to_string(),
        });
    }

    /// Spawn the REST API server in a background task
    ///
    /// The server listens on the configured bind address (default: 127.0.0.1:6790).
    pub fn spawn_api_server(self: &Arc<Self>) -> tokio::task::JoinHandle<Result<()>> {
        let downloader = self.clone();
        let config = self.config.clone();

        tokio::spawn(async move { crate::api::start_api_server(downloader, config).await })
    }
}
