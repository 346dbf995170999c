//! Delivery channel back to the user
//!
//! The orchestrator talks to the user through [`DeliveryTarget`]: short text
//! notices (progress, warnings, results) and finished media files.
//!
//! Two transports ship with the crate:
//! - [`WebhookDelivery`] posts notices as JSON and files as multipart uploads
//!   to a configured HTTP endpoint (e.g. a chat bot front end).
//! - [`OutboxDelivery`] copies files into a per-user outbox directory and
//!   appends notices to a log next to them. Used when no webhook is set.

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

use crate::config::Config;
use crate::error::Result;
use crate::types::{DeliveryKind, UserId};

mod outbox;
mod webhook;

pub use outbox::{OutboxDelivery, OutboxEntry};
pub use webhook::WebhookDelivery;

/// Transport for user-facing messages and files
#[async_trait]
pub trait DeliveryTarget: Send + Sync {
    /// Send a short text message to the user
    async fn notify(&self, user_id: UserId, text: &str) -> Result<()>;

    /// Send a finished file to the user
    ///
    /// `kind` selects how the transport presents the file. `title` is the
    /// media title and is attached to audio tracks.
    async fn deliver(
        &self,
        user_id: UserId,
        kind: DeliveryKind,
        path: &Path,
        title: &str,
    ) -> Result<()>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}

/// Build the delivery target described by configuration
///
/// A webhook URL selects [`WebhookDelivery`]; otherwise files go to the outbox.
pub fn from_config(config: &Config) -> Result<Arc<dyn DeliveryTarget>> {
    let target: Arc<dyn DeliveryTarget> = match &config.delivery.webhook_url {
        Some(url) => Arc::new(WebhookDelivery::new(
            url.clone(),
            config.delivery.auth_header.clone(),
            config.delivery.timeout,
        )?),
        None => Arc::new(OutboxDelivery::new(config.delivery.outbox_dir.clone())),
    };
    tracing::info!(delivery = target.name(), "delivery target initialized");
    Ok(target)
}

/// File name used in messages about `path`
pub(crate) fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
