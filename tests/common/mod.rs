//! Common test utilities for dropzone-dl integration tests

#![allow(dead_code)]

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::sync::broadcast::Receiver;

use dropzone_dl::{
    Config, Event, FetchEngine, FetchRequest, MediaDownloader, MetadataResolver, ProgressSnapshot,
    Result, Session, Status, UserId,
};

/// Configuration rooted in `dir` with a 1 MiB cap and no free-space floor
pub fn temp_config(dir: &Path) -> Config {
    let mut config = Config::default();
    config.download.download_dir = dir.join("downloads");
    config.download.max_transfer_mb = 1;
    config.download.min_free_space_mb = 0;
    config.delivery.outbox_dir = dir.join("outbox");
    config
}

/// Engine writing a fixed set of files per call, named like yt-dlp would
pub struct StaticEngine {
    pub content_id: String,
    pub files: Vec<(String, u64)>,
    pub calls: Mutex<usize>,
}

impl StaticEngine {
    pub fn new(content_id: &str, files: &[(&str, u64)]) -> Arc<Self> {
        Arc::new(Self {
            content_id: content_id.to_string(),
            files: files.iter().map(|(n, s)| (n.to_string(), *s)).collect(),
            calls: Mutex::new(0),
        })
    }
}

impl FetchEngine for StaticEngine {
    fn fetch(
        &self,
        request: &FetchRequest,
        progress: &mut dyn FnMut(&ProgressSnapshot) -> Result<()>,
    ) -> Result<()> {
        *self.calls.lock().unwrap() += 1;
        progress(&ProgressSnapshot::downloading(10, 100))?;
        progress(&ProgressSnapshot::downloading(100, 100))?;
        progress(&ProgressSnapshot::finalizing())?;

        std::fs::create_dir_all(&request.output_dir)?;
        for (name, size) in &self.files {
            let file = std::fs::File::create(request.output_dir.join(name))?;
            file.set_len(*size)?;
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "static"
    }
}

/// Resolver answering every URL with the same session
pub struct StaticResolver {
    pub title: String,
    pub content_id: String,
}

#[async_trait]
impl MetadataResolver for StaticResolver {
    async fn resolve(&self, url: &str) -> Result<Session> {
        Ok(Session {
            url: url.to_string(),
            title: self.title.clone(),
            content_id: self.content_id.clone(),
            duration: Some(3725),
            thumbnail: None,
            raw_metadata: serde_json::json!({ "id": self.content_id }),
        })
    }

    fn name(&self) -> &'static str {
        "static"
    }
}

/// Downloader with outbox delivery over the given engine
///
/// Returns the downloader and temp directory (keep temp_dir alive for test duration)
pub async fn create_outbox_downloader(
    engine: Arc<dyn FetchEngine>,
    resolver: Arc<dyn MetadataResolver>,
) -> (MediaDownloader, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let downloader = MediaDownloader::new(temp_config(temp_dir.path()), engine, resolver)
        .await
        .unwrap();
    (downloader, temp_dir)
}

/// Downloader backed by the real yt-dlp, if one can be found
pub async fn create_live_downloader() -> Option<(MediaDownloader, TempDir)> {
    dotenvy::dotenv().ok();

    let temp_dir = TempDir::new().unwrap();
    let mut config = temp_config(temp_dir.path());
    config.download.max_transfer_mb = 50;
    dropzone_dl::engine::locate_ytdlp(&config)?;

    let downloader = MediaDownloader::from_config(config).await.unwrap();
    Some((downloader, temp_dir))
}

/// Wait for the user's task to finish
pub async fn wait_for_finish(
    events: &mut Receiver<Event>,
    user_id: UserId,
    timeout: Duration,
) -> Option<(Status, Option<String>)> {
    let wait = async {
        loop {
            match events.recv().await {
                Ok(Event::TaskFinished {
                    user_id: u,
                    status,
                    error,
                }) if u == user_id => return Some((status, error)),
                Ok(_) => continue,
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                Err(_) => return None,
            }
        }
    };
    tokio::time::timeout(timeout, wait).await.ok().flatten()
}
