//! HTTP upload client: POSTs encoded frames to the backend.

use std::time::Duration;

use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::StatusCode;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Header carrying the static stream token.
pub const STREAM_KEY_HEADER: &str = "x-stream-key";

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("upload request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("backend rejected frame: {status}")]
    BadStatus { status: StatusCode },
}

/// Client for the backend's frame ingestion endpoint.
pub struct UploadClient {
    upload_url: String,
    stream_key: String,
    http_client: reqwest::Client,
}

impl UploadClient {
    /// Build a client for `<base_url>/upload` with a fixed request timeout.
    pub fn new(base_url: &str, stream_key: &str) -> Result<Self, UploadError> {
        let http_client = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()?;

        Ok(UploadClient {
            upload_url: format!("{}/upload", base_url.trim_end_matches('/')),
            stream_key: stream_key.to_string(),
            http_client,
        })
    }

    pub fn upload_url(&self) -> &str {
        &self.upload_url
    }

    /// Upload one encoded frame. Any transport error or non-success status
    /// is an error; the caller decides how to recover.
    pub async fn upload(&self, data: Vec<u8>) -> Result<(), UploadError> {
        let response = self
            .http_client
            .post(&self.upload_url)
            .header(CONTENT_TYPE, "application/octet-stream")
            .header(CONTENT_LENGTH, data.len())
            .header(STREAM_KEY_HEADER, &self.stream_key)
            .body(data)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(UploadError::BadStatus { status });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_url_joins_base() {
        let client = UploadClient::new("http://127.0.0.1:8000", "key").unwrap();
        assert_eq!(client.upload_url(), "http://127.0.0.1:8000/upload");
    }

    #[test]
    fn test_upload_url_strips_trailing_slash() {
        let client = UploadClient::new("http://backend.example/", "key").unwrap();
        assert_eq!(client.upload_url(), "http://backend.example/upload");
    }

    #[test]
    fn test_bad_status_display() {
        let err = UploadError::BadStatus {
            status: StatusCode::INTERNAL_SERVER_ERROR,
        };
        assert_eq!(
            err.to_string(),
            "backend rejected frame: 500 Internal Server Error"
        );
    }
}
