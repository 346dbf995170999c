use super::*;
use crate::downloader::test_helpers::{URL, output_name, wait_finished};
use crate::types::{Status, UserId};
use serde_json::json;

#[tokio::test]
async fn test_submit_url_returns_prompt() {
    let (app, _h) = test_app(vec![]).await;

    let (status, body) = send(&app, post_json("/api/v1/users/12/url", json!({ "url": URL }))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "Test Clip");
    assert_eq!(body["duration"], "03:32");
    assert_eq!(body["choices"], json!(["audio", "video", "both"]));
}

#[tokio::test]
async fn test_submit_invalid_url() {
    let (app, _h) = test_app(vec![]).await;

    let (status, body) = send(
        &app,
        post_json("/api/v1/users/12/url", json!({ "url": "mailto:someone" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "invalid_url");
    assert_eq!(
        body["error"]["details"]["reply"],
        "⚠️ Failed to fetch video info."
    );
}

#[tokio::test]
async fn test_selection_without_session() {
    let (app, _h) = test_app(vec![]).await;

    let (status, body) = send(
        &app,
        post_json("/api/v1/users/12/selection", json!({ "choice": "audio" })),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "session_not_found");
    assert_eq!(body["error"]["details"]["user_id"], 12);
    assert_eq!(
        body["error"]["details"]["reply"],
        "⚠️ Session not found. Please send the URL again."
    );
}

#[tokio::test]
async fn test_selection_rejects_unknown_choice() {
    let (app, _h) = test_app(vec![]).await;
    send(&app, post_json("/api/v1/users/12/url", json!({ "url": URL }))).await;

    let (status, _) = send(
        &app,
        post_json("/api/v1/users/12/selection", json!({ "choice": "gif" })),
    )
    .await;

    assert!(status.is_client_error());
}

#[tokio::test]
async fn test_full_command_flow() {
    let (app, h) = test_app(vec![FakeFetch::writes(&[(
        output_name("mp3").as_str(),
        1000,
    )])])
    .await;
    let mut events = h.downloader.subscribe();
    let user = UserId(12);

    let (status, _) = send(&app, post_json("/api/v1/users/12/url", json!({ "url": URL }))).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &app,
        post_json("/api/v1/users/12/selection", json!({ "choice": "audio" })),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["message"], "⏳ Queued: 'Test Clip' as audio…");
    assert_eq!(body["task"]["user_id"], 12);

    let (finished, _) = wait_finished(&mut events, user).await;
    assert_eq!(finished, Status::Done);

    let (status, body) = send(&app, get("/api/v1/users/12/download")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["task"]["status"], "done");
    assert!(
        body["message"]
            .as_str()
            .unwrap()
            .starts_with("Your downloads:\n- Test Clip [audio] → done")
    );

    let (status, body) = send(&app, post_empty("/api/v1/users/12/download/cancel")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(
        body["error"]["message"],
        "not found: There are no active downloads to cancel."
    );
    assert_eq!(
        body["error"]["details"]["reply"],
        "There are no active downloads to cancel."
    );

    let (status, body) = send(&app, post_empty("/api/v1/users/12/download/clear")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["removed"], 0);
    assert_eq!(body["message"], "Cleanup complete. Files removed: 0");
}

#[tokio::test]
async fn test_get_download_without_task() {
    let (app, _h) = test_app(vec![]).await;

    let (status, body) = send(&app, get("/api/v1/users/99/download")).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(
        body["error"]["message"],
        "not found: You have no recorded downloads."
    );
    assert_eq!(
        body["error"]["details"]["reply"],
        "You have no recorded downloads."
    );
}

#[tokio::test]
async fn test_cancel_and_conflict_while_active() {
    let (app, h) = test_app(vec![FakeFetch::until_canceled()]).await;
    let mut events = h.downloader.subscribe();

    send(&app, post_json("/api/v1/users/5/url", json!({ "url": URL }))).await;
    let (status, _) = send(
        &app,
        post_json("/api/v1/users/5/selection", json!({ "choice": "video" })),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);

    send(&app, post_json("/api/v1/users/5/url", json!({ "url": URL }))).await;
    let (status, body) = send(
        &app,
        post_json("/api/v1/users/5/selection", json!({ "choice": "audio" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "conflict");

    let (status, body) = send(&app, post_empty("/api/v1/users/5/download/clear")).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "conflict");

    let (status, body) = send(&app, post_empty("/api/v1/users/5/download/cancel")).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["message"], "Cancellation requested. ⏹️");

    let (finished, _) = wait_finished(&mut events, UserId(5)).await;
    assert_eq!(finished, Status::Canceled);
}

#[tokio::test]
async fn test_non_numeric_user_id() {
    let (app, _h) = test_app(vec![]).await;
    let (status, _) = send(&app, get("/api/v1/users/alice/download")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
