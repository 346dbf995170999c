//! Application state for the API server

use crate::{Config, MediaDownloader};
use std::sync::Arc;

/// Shared state handed to every route handler
#[derive(Clone)]
pub struct AppState {
    /// The downloader all commands go through
    pub downloader: Arc<MediaDownloader>,

    /// Configuration the router was built from
    pub config: Arc<Config>,
}

impl AppState {
    /// Create a new AppState
    pub fn new(downloader: Arc<MediaDownloader>, config: Arc<Config>) -> Self {
        Self { downloader, config }
    }
}
