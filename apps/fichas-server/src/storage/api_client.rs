//! Remote upload API client

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;

use super::types::{object_name_for, ObjectStore, StorageError, UploadedObject};
use crate::ingest::UploadFile;

/// Posts files as `multipart{file, bucketName?, objectName}`
pub struct UploadApiClient {
    url: String,
    bucket: Option<String>,
    client: reqwest::Client,
}

/// Success body of the upload endpoint
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadResponse {
    #[serde(default)]
    success: Option<bool>,
    bucket_name: String,
    object_name: String,
    file_url: String,
    #[serde(default)]
    content_type: Option<String>,
    #[serde(default)]
    size: Option<u64>,
}

/// Error body: `{ error }` or `{ message }`
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    error: Option<String>,
    message: Option<String>,
}

impl ErrorBody {
    /// Best-effort message from an error response body
    pub(crate) fn message_from(body: &str) -> String {
        serde_json::from_str::<ErrorBody>(body)
            .ok()
            .and_then(|b| b.error.or(b.message))
            .unwrap_or_else(|| body.trim().to_string())
    }
}

impl UploadApiClient {
    pub fn new(url: impl Into<String>, bucket: Option<String>) -> Self {
        Self {
            url: url.into(),
            bucket,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl ObjectStore for UploadApiClient {
    async fn put_object(&self, file: UploadFile) -> Result<UploadedObject, StorageError> {
        let object_name = object_name_for(&file.file_name);
        let size = file.size() as u64;
        let content_type = file.mime_type.clone();

        let part = Part::bytes(file.bytes.to_vec())
            .file_name(file.file_name.clone())
            .mime_str(&file.mime_type)
            .map_err(|e| StorageError::Transport(format!("Invalid MIME type: {}", e)))?;

        let mut form = Form::new()
            .part("file", part)
            .text("objectName", object_name.clone());
        if let Some(bucket) = &self.bucket {
            form = form.text("bucketName", bucket.clone());
        }

        tracing::debug!(object = %object_name, size, "Uploading to upload API");

        let response = self
            .client
            .post(&self.url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| StorageError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| StorageError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(StorageError::UploadRejected {
                status: status.as_u16(),
                message: ErrorBody::message_from(&body),
            });
        }

        let parsed: UploadResponse = serde_json::from_str(&body)
            .map_err(|e| StorageError::InvalidResponse(e.to_string()))?;

        if parsed.success == Some(false) {
            return Err(StorageError::UploadRejected {
                status: status.as_u16(),
                message: ErrorBody::message_from(&body),
            });
        }

        Ok(UploadedObject {
            bucket_name: parsed.bucket_name,
            object_name: parsed.object_name,
            file_url: parsed.file_url,
            content_type: parsed.content_type.unwrap_or(content_type),
            size: parsed.size.unwrap_or(size),
        })
    }
}
