//! Artifact upload to the public file host.

use std::path::Path;
use std::time::Duration;

use reqwest::multipart::{Form, Part};
use reqwest::Client;
use tracing::{debug, info};
use url::Url;

use crate::error::{DeliveryError, DeliveryResult};

/// Public upload endpoint used when none is configured.
pub const DEFAULT_UPLOAD_URL: &str = "https://upload.tost.ai/api/v1";

/// Uploads finished videos and returns their public URL.
#[derive(Clone)]
pub struct UploadClient {
    http: Client,
    endpoint: Url,
}

impl UploadClient {
    /// Create a new upload client.
    pub fn new(endpoint: &str, timeout: Option<Duration>) -> DeliveryResult<Self> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| DeliveryError::config(format!("upload URL {}: {}", endpoint, e)))?;

        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            http: builder.build()?,
            endpoint,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// POST `path` as the multipart `file` part.
    ///
    /// The response body is the URL of the uploaded file.
    pub async fn upload(&self, path: &Path) -> DeliveryResult<String> {
        if !path.exists() {
            return Err(DeliveryError::FileNotFound(path.to_path_buf()));
        }

        let bytes = tokio::fs::read(path).await?;
        let size = bytes.len();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "output.mp4".to_string());

        debug!("Uploading {} ({} bytes) to {}", path.display(), size, self.endpoint);

        let part = Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("video/mp4")?;
        let form = Form::new().part("file", part);

        let response = self
            .http
            .post(self.endpoint.clone())
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DeliveryError::UploadFailed {
                status: status.as_u16(),
                body,
            });
        }

        let url = response.text().await?.trim().to_string();
        if url.is_empty() {
            return Err(DeliveryError::EmptyUploadResponse);
        }

        info!("Uploaded {} to {}", path.display(), url);
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    fn write_video(dir: &TempDir) -> std::path::PathBuf {
        let path = dir.path().join("clip-42.mp4");
        std::fs::write(&path, b"not really an mp4").unwrap();
        path
    }

    #[tokio::test]
    async fn test_upload_returns_body_as_url() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string("https://files.example.com/clip-42.mp4\n"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let client = UploadClient::new(&format!("{}/api/v1", server.uri()), None).unwrap();
        let url = client.upload(&write_video(&dir)).await.unwrap();

        assert_eq!(url, "https://files.example.com/clip-42.mp4");
    }

    #[tokio::test]
    async fn test_upload_sends_file_part() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("https://files.example.com/x"))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let client = UploadClient::new(&server.uri(), None).unwrap();
        client.upload(&write_video(&dir)).await.unwrap();

        let requests: Vec<Request> = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        let content_type = requests[0]
            .headers
            .get("content-type")
            .unwrap()
            .to_str()
            .unwrap();
        assert!(content_type.starts_with("multipart/form-data"));

        let body = String::from_utf8_lossy(&requests[0].body);
        assert!(body.contains("name=\"file\""));
        assert!(body.contains("filename=\"clip-42.mp4\""));
        assert!(body.contains("not really an mp4"));
    }

    #[tokio::test]
    async fn test_upload_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("disk full"))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let client = UploadClient::new(&server.uri(), None).unwrap();
        let err = client.upload(&write_video(&dir)).await.unwrap_err();

        assert!(matches!(err, DeliveryError::UploadFailed { status: 500, .. }));
    }

    #[tokio::test]
    async fn test_upload_missing_file() {
        let client = UploadClient::new(DEFAULT_UPLOAD_URL, None).unwrap();
        let err = client
            .upload(Path::new("/nonexistent/clip.mp4"))
            .await
            .unwrap_err();
        assert!(matches!(err, DeliveryError::FileNotFound(_)));
    }

    #[test]
    fn test_invalid_endpoint() {
        assert!(matches!(
            UploadClient::new("upload.example.com", None),
            Err(DeliveryError::Config(_))
        ));
    }
}
