//! # dropzone-dl
//!
//! Per-user media download orchestration around yt-dlp.
//!
//! A user submits a URL, the metadata is resolved and kept as their pending
//! session, and once they choose audio, video or both a background task
//! fetches the media, enforces a transfer size cap (retrying once at reduced
//! quality), delivers every resulting file and cleans up after itself. Each
//! user has at most one active task; progress reaches them as throttled
//! status lines and the task can be canceled at any point.
//!
//! ## Quick Start
//!
//! ```no_run
//! use dropzone_dl::{Config, MediaChoice, MediaDownloader, UserId};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let downloader = MediaDownloader::from_config(Config::from_env()?).await?;
//!
//!     // Subscribe to events
//!     let mut events = downloader.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let user = UserId(42);
//!     let prompt = downloader
//!         .submit_url(user, "https://www.youtube.com/watch?v=dQw4w9WgXcQ")
//!         .await?;
//!     println!("{}", prompt.message);
//!
//!     let accepted = downloader.select(user, MediaChoice::Audio).await?;
//!     println!("{}", accepted.message);
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// REST API module
pub mod api;
/// Configuration types
pub mod config;
/// Session persistence
pub mod db;
/// Notice and file delivery targets
pub mod delivery;
/// Core downloader implementation (decomposed into focused submodules)
pub mod downloader;
/// Fetch engine and metadata resolver seams
pub mod engine;
/// Error types
pub mod error;
/// Per-user task registry
pub mod registry;
/// Output file discovery and selection
pub mod selector;
/// Pending URL sessions
pub mod session;
/// Progress throttling and cancellation checkpoints
pub mod throttle;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use db::Database;
pub use delivery::{DeliveryTarget, OutboxDelivery, WebhookDelivery};
pub use downloader::{Accepted, ClearOutcome, MediaDownloader, SessionPrompt};
pub use engine::{FetchEngine, FetchRequest, MetadataResolver, YtDlpEngine, YtDlpResolver};
pub use error::{ApiError, DatabaseError, Error, ErrorDetail, Result, ToHttpStatus};
pub use registry::TaskRegistry;
pub use types::{
    DeliveryKind, Event, MediaChoice, MediaKind, ProgressSnapshot, Session, Status, TaskInfo,
    UserId,
};

/// Helper function to run the downloader with graceful signal handling.
///
/// Waits for a termination signal and then calls the downloader's `shutdown()` method.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use dropzone_dl::{Config, MediaDownloader, run_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let downloader = MediaDownloader::from_config(Config::default()).await?;
///
///     // Run with automatic signal handling
///     run_with_shutdown(downloader).await?;
///
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(downloader: MediaDownloader) -> Result<()> {
    wait_for_signal().await;
    downloader.shutdown().await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Registration can fail in restricted environments (containers, tests)
    let mut handlers = Vec::new();
    for (kind, name) in [
        (SignalKind::terminate(), "SIGTERM"),
        (SignalKind::interrupt(), "SIGINT"),
    ] {
        match signal(kind) {
            Ok(handler) => handlers.push((handler, name)),
            Err(e) => tracing::warn!(error = %e, signal = name, "could not register signal handler"),
        }
    }

    if handlers.is_empty() {
        tracing::error!("no signal handlers registered, falling back to ctrl_c");
        tokio::signal::ctrl_c().await.ok();
        return;
    }

    let waits = handlers.iter_mut().map(|(handler, name)| {
        Box::pin(async move {
            handler.recv().await;
            *name
        })
    });
    let (name, _, _) = futures::future::select_all(waits).await;
    tracing::info!(signal = name, "received shutdown signal");
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
