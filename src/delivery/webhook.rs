//! HTTP webhook transport

use async_trait::async_trait;
use serde::Serialize;
use std::path::Path;
use std::time::Duration;

use super::{DeliveryTarget, display_name};
use crate::error::{Error, Result};
use crate::types::{DeliveryKind, UserId};

/// JSON body posted for a notice
#[derive(Debug, Serialize)]
struct NoticePayload<'a> {
    user_id: UserId,
    text: &'a str,
    timestamp: i64,
}

/// Posts notices to `<base>/messages` and files to `<base>/files`
///
/// Notices are JSON. Files are multipart uploads with `user_id`, `kind` and
/// `file` fields, plus `title` for audio. File contents are streamed from
/// disk rather than buffered. A configured auth header is sent as
/// `Authorization` on every request.
#[derive(Debug, Clone)]
pub struct WebhookDelivery {
    client: reqwest::Client,
    messages_url: url::Url,
    files_url: url::Url,
    auth_header: Option<String>,
}

impl WebhookDelivery {
    /// Create a transport for the endpoint at `base_url`
    pub fn new(base_url: String, auth_header: Option<String>, timeout: Duration) -> Result<Self> {
        let mut base = url::Url::parse(&base_url).map_err(|e| Error::Config {
            message: format!("invalid delivery webhook URL '{}': {}", base_url, e),
            key: Some("delivery.webhook_url".to_string()),
        })?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let join = |segment: &str| {
            base.join(segment).map_err(|e| Error::Config {
                message: format!("invalid delivery webhook URL '{}': {}", base_url, e),
                key: Some("delivery.webhook_url".to_string()),
            })
        };

        Ok(Self {
            client: reqwest::Client::builder().timeout(timeout).build()?,
            messages_url: join("messages")?,
            files_url: join("files")?,
            auth_header,
        })
    }

    fn post(&self, url: &url::Url) -> reqwest::RequestBuilder {
        let request = self.client.post(url.clone());
        match &self.auth_header {
            Some(auth) => request.header("Authorization", auth),
            None => request,
        }
    }

    async fn check(response: reqwest::Response) -> std::result::Result<(), String> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(format!("endpoint returned status {}: {}", status, body))
    }
}

fn kind_field(kind: DeliveryKind) -> &'static str {
    match kind {
        DeliveryKind::Audio => "audio",
        DeliveryKind::Video => "video",
        DeliveryKind::Generic => "document",
    }
}

#[async_trait]
impl DeliveryTarget for WebhookDelivery {
    async fn notify(&self, user_id: UserId, text: &str) -> Result<()> {
        let payload = NoticePayload {
            user_id,
            text,
            timestamp: chrono::Utc::now().timestamp(),
        };

        let response = self.post(&self.messages_url).json(&payload).send().await?;
        Self::check(response)
            .await
            .map_err(|reason| Error::DeliveryFailed {
                name: "message".to_string(),
                reason,
            })
    }

    async fn deliver(
        &self,
        user_id: UserId,
        kind: DeliveryKind,
        path: &Path,
        title: &str,
    ) -> Result<()> {
        let name = display_name(path);
        let failed = |e: std::io::Error| Error::DeliveryFailed {
            name: name.clone(),
            reason: e.to_string(),
        };

        // streamed from disk; outputs can be as large as the transfer cap
        let file = tokio::fs::File::open(path).await.map_err(failed)?;
        let len = file.metadata().await.map_err(failed)?.len();
        let body = reqwest::Body::wrap_stream(tokio_util::io::ReaderStream::new(file));

        let mut form = reqwest::multipart::Form::new()
            .text("user_id", user_id.to_string())
            .text("kind", kind_field(kind));
        if kind == DeliveryKind::Audio {
            form = form.text("title", title.to_string());
        }
        let form = form.part(
            "file",
            reqwest::multipart::Part::stream_with_length(body, len).file_name(name.clone()),
        );

        let response = self
            .post(&self.files_url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| Error::DeliveryFailed {
                name: name.clone(),
                reason: e.to_string(),
            })?;

        Self::check(response).await.map_err(|reason| Error::DeliveryFailed {
            name: name.clone(),
            reason,
        })?;

        tracing::debug!(user_id = user_id.0, file = %name, "file posted to webhook");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "webhook"
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn target(server: &MockServer, auth: Option<&str>) -> WebhookDelivery {
        WebhookDelivery::new(
            format!("{}/bot", server.uri()),
            auth.map(str::to_string),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn notice_is_posted_as_json_with_auth() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot/messages"))
            .and(header("Authorization", "Bearer secret"))
            .and(body_partial_json(
                serde_json::json!({"user_id": 7, "text": "hello"}),
            ))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        target(&server, Some("Bearer secret"))
            .notify(UserId(7), "hello")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn file_is_uploaded_as_multipart() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot/files"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("Song-abc.mp3");
        std::fs::write(&file, b"ID3 fake audio").unwrap();

        target(&server, None)
            .deliver(UserId(7), DeliveryKind::Audio, &file, "Song")
            .await
            .unwrap();

        let requests = server.received_requests().await.unwrap();
        let body = String::from_utf8_lossy(&requests[0].body);
        assert!(body.contains("name=\"kind\""));
        assert!(body.contains("audio"));
        assert!(body.contains("name=\"title\""));
        assert!(body.contains("filename=\"Song-abc.mp3\""));
        assert!(body.contains("ID3 fake audio"));
    }

    #[tokio::test]
    async fn large_file_is_uploaded_intact() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot/files"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        // several read chunks worth of data with a recognizable start
        let mut data = b"DZSTART".to_vec();
        data.extend((0..512 * 1024u32).map(|i| (i % 251) as u8));
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("Clip-abc.mp4");
        std::fs::write(&file, &data).unwrap();

        target(&server, None)
            .deliver(UserId(3), DeliveryKind::Video, &file, "Clip")
            .await
            .unwrap();

        let requests = server.received_requests().await.unwrap();
        let body = &requests[0].body;
        let start = body
            .windows(7)
            .position(|w| w == b"DZSTART")
            .expect("file part missing");
        assert_eq!(&body[start..start + data.len()], data.as_slice());
        assert!(
            String::from_utf8_lossy(&body[start + data.len()..]).starts_with("\r\n--"),
            "file part has trailing bytes"
        );
    }

    #[tokio::test]
    async fn rejected_upload_is_a_delivery_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot/files"))
            .respond_with(ResponseTemplate::new(413).set_body_string("too big"))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("Clip-abc.mp4");
        std::fs::write(&file, b"data").unwrap();

        let err = target(&server, None)
            .deliver(UserId(1), DeliveryKind::Video, &file, "Clip")
            .await
            .unwrap_err();

        let requests = server.received_requests().await.unwrap();
        let body = String::from_utf8_lossy(&requests[0].body);
        assert!(!body.contains("name=\"title\""));

        match err {
            Error::DeliveryFailed { name, reason } => {
                assert_eq!(name, "Clip-abc.mp4");
                assert!(reason.contains("413"));
                assert!(reason.contains("too big"));
            }
            other => panic!("expected DeliveryFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_file_is_a_delivery_failure() {
        let server = MockServer::start().await;
        let err = target(&server, None)
            .deliver(
                UserId(1),
                DeliveryKind::Generic,
                Path::new("/nonexistent/x-abc.bin"),
                "x",
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DeliveryFailed { .. }));
    }

    #[test]
    fn invalid_url_is_a_config_error() {
        let err = WebhookDelivery::new("not a url".into(), None, Duration::from_secs(1))
            .unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn base_path_keeps_its_last_segment() {
        let target =
            WebhookDelivery::new("http://h/api/bot".into(), None, Duration::from_secs(1)).unwrap();
        assert_eq!(target.messages_url.as_str(), "http://h/api/bot/messages");
        assert_eq!(target.files_url.as_str(), "http://h/api/bot/files");
    }
}
