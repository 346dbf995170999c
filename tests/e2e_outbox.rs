//! End-to-end flow through the public API with the local outbox transport
//!
//! The fetch engine is a stand-in that writes files the way yt-dlp names
//! them; everything else (sessions on disk, registry, orchestration, size
//! gate, outbox delivery and cleanup) is the real thing.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{StaticEngine, StaticResolver, create_outbox_downloader, wait_for_finish};
use dropzone_dl::delivery::OutboxEntry;
use dropzone_dl::{DeliveryKind, MediaChoice, OutboxDelivery, Status, UserId};

const ID: &str = "dQw4w9WgXcQ";

fn resolver() -> Arc<StaticResolver> {
    Arc::new(StaticResolver {
        title: "Never Gonna Give You Up".to_string(),
        content_id: ID.to_string(),
    })
}

#[tokio::test]
async fn test_both_choice_lands_in_outbox() {
    let video = format!("Never_Gonna_Give_You_Up-{ID}.mp4");
    let audio = format!("Never_Gonna_Give_You_Up-{ID}.mp3");
    let engine = StaticEngine::new(ID, &[(video.as_str(), 2048), (audio.as_str(), 1024)]);
    let (downloader, _temp_dir) = create_outbox_downloader(engine.clone(), resolver()).await;
    let mut events = downloader.subscribe();
    let user = UserId(1001);

    let prompt = downloader
        .submit_url(user, "https://youtu.be/dQw4w9WgXcQ")
        .await
        .unwrap();
    assert_eq!(prompt.duration, "01:02:05");

    downloader.select(user, MediaChoice::Both).await.unwrap();
    let (status, error) = wait_for_finish(&mut events, user, Duration::from_secs(10))
        .await
        .expect("task should finish");
    assert_eq!(status, Status::Done, "error: {error:?}");
    assert_eq!(*engine.calls.lock().unwrap(), 2);

    let config = downloader.get_config();
    let outbox = OutboxDelivery::new(config.delivery.outbox_dir.clone());
    let entries = outbox.entries(user).await.unwrap();

    let files: Vec<(String, DeliveryKind)> = entries
        .iter()
        .filter_map(|e| match e {
            OutboxEntry::File { name, kind, .. } => Some((name.clone(), *kind)),
            _ => None,
        })
        .collect();
    // both passes see both files on disk; each pass only delivers its own kind
    assert_eq!(
        files,
        vec![
            (video.clone(), DeliveryKind::Video),
            (audio.clone(), DeliveryKind::Audio),
        ]
    );
    assert!(outbox.user_dir(user).join(&video).exists());

    let notices: Vec<&str> = entries
        .iter()
        .filter_map(|e| match e {
            OutboxEntry::Notice { text, .. } => Some(text.as_str()),
            _ => None,
        })
        .collect();
    assert!(notices.contains(&"🔽 Downloading 'Never Gonna Give You Up' as video…"));
    assert!(notices.contains(&"📦 Processing audio…"));
    assert_eq!(
        notices.last().unwrap(),
        &"✅ Download completed for 'Never Gonna Give You Up'"
    );

    // delivered outputs were removed from the download directory
    assert!(!downloader.user_dir(user).join(&video).exists());
    assert!(!downloader.user_dir(user).join(&audio).exists());

    downloader.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_oversized_output_reports_error() {
    let video = format!("Big-{ID}.mp4");
    // 3 MiB against a 1 MiB cap, at both qualities
    let engine = StaticEngine::new(ID, &[(video.as_str(), 3 * 1024 * 1024)]);
    let (downloader, _temp_dir) = create_outbox_downloader(engine.clone(), resolver()).await;
    let mut events = downloader.subscribe();
    let user = UserId(7);

    downloader
        .submit_url(user, "https://youtu.be/dQw4w9WgXcQ")
        .await
        .unwrap();
    downloader.select(user, MediaChoice::Video).await.unwrap();

    let (status, error) = wait_for_finish(&mut events, user, Duration::from_secs(10))
        .await
        .expect("task should finish");
    assert_eq!(status, Status::Error);
    assert!(error.unwrap().contains("3 MB > 1 MB"));
    assert_eq!(*engine.calls.lock().unwrap(), 2);

    let outbox = OutboxDelivery::new(downloader.get_config().delivery.outbox_dir.clone());
    let entries = outbox.entries(user).await.unwrap();
    assert!(
        entries
            .iter()
            .all(|e| !matches!(e, OutboxEntry::File { .. }))
    );
    assert!(entries.iter().any(|e| matches!(
        e,
        OutboxEntry::Notice { text, .. } if text == "⚠️ Video too large; trying 480p…"
    )));
}
