//! Shared test helpers: scripted engine, resolver and delivery fakes.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tempfile::{TempDir, tempdir};

use crate::config::Config;
use crate::delivery::DeliveryTarget;
use crate::downloader::MediaDownloader;
use crate::engine::{FetchEngine, FetchRequest, MetadataResolver};
use crate::error::{Error, Result};
use crate::types::{DeliveryKind, Event, ProgressSnapshot, Session, Status, UserId};

pub(crate) const CONTENT_ID: &str = "abc123";
pub(crate) const TITLE: &str = "Test Clip";
pub(crate) const URL: &str = "https://www.youtube.com/watch?v=abc123";

pub(crate) const MIB: u64 = 1024 * 1024;

/// One scripted engine run
#[derive(Clone, Debug, Default)]
pub(crate) struct FakeFetch {
    /// Files written into the request's output dir: (name, size in bytes)
    pub(crate) files: Vec<(String, u64)>,
    /// Snapshots reported before the files appear
    pub(crate) progress: Vec<ProgressSnapshot>,
    /// Fail with `FetchFailed` instead of writing files
    pub(crate) fail: Option<String>,
    /// Report progress until the callback aborts, after writing `files` as
    /// partial artifacts
    pub(crate) wait_for_cancel: bool,
}

impl FakeFetch {
    pub(crate) fn writes(files: &[(&str, u64)]) -> Self {
        Self {
            files: files.iter().map(|(n, s)| (n.to_string(), *s)).collect(),
            ..Default::default()
        }
    }

    pub(crate) fn fails(message: &str) -> Self {
        Self {
            fail: Some(message.to_string()),
            ..Default::default()
        }
    }

    pub(crate) fn until_canceled() -> Self {
        Self {
            wait_for_cancel: true,
            ..Default::default()
        }
    }

    pub(crate) fn until_canceled_leaving(files: &[(&str, u64)]) -> Self {
        Self {
            wait_for_cancel: true,
            ..Self::writes(files)
        }
    }

    pub(crate) fn with_progress(mut self, progress: Vec<ProgressSnapshot>) -> Self {
        self.progress = progress;
        self
    }
}

/// Name of an output file the way the engine would write it
pub(crate) fn output_name(ext: &str) -> String {
    format!("Test_Clip-{}.{}", CONTENT_ID, ext)
}

/// Engine that replays scripted runs in order
#[derive(Default)]
pub(crate) struct FakeEngine {
    script: Mutex<VecDeque<FakeFetch>>,
    requests: Mutex<Vec<FetchRequest>>,
}

impl FakeEngine {
    pub(crate) fn new(script: Vec<FakeFetch>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn requests(&self) -> Vec<FetchRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl FetchEngine for FakeEngine {
    fn fetch(
        &self,
        request: &FetchRequest,
        progress: &mut dyn FnMut(&ProgressSnapshot) -> Result<()>,
    ) -> Result<()> {
        self.requests.lock().unwrap().push(request.clone());
        let step = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| FakeFetch::fails("no scripted run left"));

        for snapshot in &step.progress {
            progress(snapshot)?;
        }

        if step.wait_for_cancel {
            write_files(&request.output_dir, &step.files)?;
            for i in 0..1000u64 {
                progress(&ProgressSnapshot::downloading(i % 100, 100))?;
                std::thread::sleep(Duration::from_millis(10));
            }
            return Err(Error::FetchFailed("never canceled".into()));
        }

        if let Some(message) = step.fail {
            return Err(Error::FetchFailed(message));
        }

        write_files(&request.output_dir, &step.files)
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

fn write_files(dir: &Path, files: &[(String, u64)]) -> Result<()> {
    std::fs::create_dir_all(dir)?;
    for (name, size) in files {
        let file = std::fs::File::create(dir.join(name))?;
        file.set_len(*size)?;
    }
    Ok(())
}

/// Resolver returning a fixed session, or an error
pub(crate) struct FakeResolver {
    pub(crate) fail: bool,
}

#[async_trait]
impl MetadataResolver for FakeResolver {
    async fn resolve(&self, url: &str) -> Result<Session> {
        if self.fail {
            return Err(Error::Metadata("Video unavailable".into()));
        }
        Ok(sample_session(url))
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

pub(crate) fn sample_session(url: &str) -> Session {
    Session {
        url: url.to_string(),
        title: TITLE.to_string(),
        content_id: CONTENT_ID.to_string(),
        duration: Some(212),
        thumbnail: Some("https://i.example/abc123.jpg".to_string()),
        raw_metadata: serde_json::json!({"id": CONTENT_ID}),
    }
}

/// What a recording delivery saw
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Delivered {
    Notice(String),
    File {
        kind: DeliveryKind,
        name: String,
        title: String,
    },
}

/// Delivery that records everything; file names listed in `reject` fail
#[derive(Default)]
pub(crate) struct RecordingDelivery {
    log: Mutex<Vec<(UserId, Delivered)>>,
    reject: Vec<String>,
}

impl RecordingDelivery {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn rejecting(names: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            log: Mutex::new(Vec::new()),
            reject: names.iter().map(|n| n.to_string()).collect(),
        })
    }

    pub(crate) fn notices(&self, user_id: UserId) -> Vec<String> {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|(u, _)| *u == user_id)
            .filter_map(|(_, d)| match d {
                Delivered::Notice(text) => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn files(&self, user_id: UserId) -> Vec<(DeliveryKind, String)> {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|(u, _)| *u == user_id)
            .filter_map(|(_, d)| match d {
                Delivered::File { kind, name, .. } => Some((*kind, name.clone())),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn entries(&self, user_id: UserId) -> Vec<Delivered> {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|(u, _)| *u == user_id)
            .map(|(_, d)| d.clone())
            .collect()
    }
}

#[async_trait]
impl DeliveryTarget for RecordingDelivery {
    async fn notify(&self, user_id: UserId, text: &str) -> Result<()> {
        self.log
            .lock()
            .unwrap()
            .push((user_id, Delivered::Notice(text.to_string())));
        Ok(())
    }

    async fn deliver(
        &self,
        user_id: UserId,
        kind: DeliveryKind,
        path: &Path,
        title: &str,
    ) -> Result<()> {
        let name = crate::delivery::display_name(path);
        if self.reject.contains(&name) {
            return Err(Error::DeliveryFailed {
                name,
                reason: "file rejected".into(),
            });
        }
        assert!(path.exists(), "delivered file must exist: {}", path.display());
        self.log.lock().unwrap().push((
            user_id,
            Delivered::File {
                kind,
                name,
                title: title.to_string(),
            },
        ));
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

/// Test configuration rooted in `dir`, with a 1 MiB transfer cap and no
/// free-space floor
pub(crate) fn test_config(dir: &Path) -> Config {
    let mut config = Config::default();
    config.download.download_dir = dir.join("downloads");
    config.download.max_transfer_mb = 1;
    config.download.min_free_space_mb = 0;
    config.persistence.database_path = Some(dir.join("sessions.db"));
    config.delivery.outbox_dir = dir.join("outbox");
    config
}

/// Everything a downloader test needs to keep alive and inspect
pub(crate) struct Harness {
    pub(crate) downloader: MediaDownloader,
    pub(crate) engine: Arc<FakeEngine>,
    pub(crate) delivery: Arc<RecordingDelivery>,
    pub(crate) temp_dir: TempDir,
}

impl Harness {
    pub(crate) fn user_dir(&self, user_id: UserId) -> PathBuf {
        self.downloader.user_dir(user_id)
    }
}

/// Build a downloader over the given script with default test settings
pub(crate) async fn create_test_downloader(script: Vec<FakeFetch>) -> Harness {
    create_test_downloader_with(script, RecordingDelivery::new(), |_| {}).await
}

/// Build a downloader with a custom delivery and config tweaks
pub(crate) async fn create_test_downloader_with(
    script: Vec<FakeFetch>,
    delivery: Arc<RecordingDelivery>,
    tweak: impl FnOnce(&mut Config),
) -> Harness {
    let temp_dir = tempdir().unwrap();
    let mut config = test_config(temp_dir.path());
    tweak(&mut config);

    let engine = FakeEngine::new(script);
    let downloader = MediaDownloader::new(
        config,
        engine.clone(),
        Arc::new(FakeResolver { fail: false }),
    )
    .await
    .unwrap()
    .with_delivery(delivery.clone());

    Harness {
        downloader,
        engine,
        delivery,
        temp_dir,
    }
}

/// Wait for the user's `TaskFinished` event and return its status and error
pub(crate) async fn wait_finished(
    events: &mut tokio::sync::broadcast::Receiver<Event>,
    user_id: UserId,
) -> (Status, Option<String>) {
    let wait = async {
        loop {
            match events.recv().await {
                Ok(Event::TaskFinished {
                    user_id: u,
                    status,
                    error,
                }) if u == user_id => return (status, error),
                Ok(_) => continue,
                Err(e) => panic!("event channel failed: {e}"),
            }
        }
    };
    tokio::time::timeout(Duration::from_secs(10), wait)
        .await
        .expect("task did not finish in time")
}

/// Submit the sample URL and pick `choice`, returning once the task is queued
pub(crate) async fn start_task(
    downloader: &MediaDownloader,
    user_id: UserId,
    choice: crate::types::MediaChoice,
) -> crate::downloader::Accepted {
    downloader.submit_url(user_id, URL).await.unwrap();
    downloader.select(user_id, choice).await.unwrap()
}
