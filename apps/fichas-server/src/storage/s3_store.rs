//! Direct S3-compatible storage
//!
//! Wraps the AWS SDK for writes into MinIO or any S3-compatible bucket.

use std::time::Duration;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::{
    config::{Credentials, Region},
    presigning::PresigningConfig,
    primitives::ByteStream,
    Client,
};
use tokio::sync::OnceCell;

use super::types::{object_name_for, ObjectStore, StorageError, UploadedObject};
use crate::config::S3Config;
use crate::ingest::UploadFile;

/// Lifetime of presigned download URLs
pub const PRESIGN_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// S3-compatible object store
#[derive(Clone)]
pub struct S3ObjectStore {
    client: Client,
    bucket: String,
    public_url: Option<String>,
    bucket_ready: std::sync::Arc<OnceCell<()>>,
}

impl S3ObjectStore {
    /// Create a new store from configuration
    pub fn new(config: &S3Config) -> Self {
        let credentials = Credentials::new(
            &config.access_key,
            &config.secret_key,
            None,
            None,
            "fichas",
        );

        let region = config
            .region
            .clone()
            .unwrap_or_else(|| "us-east-1".to_string());

        let s3_config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(&config.endpoint)
            .region(Region::new(region))
            .credentials_provider(credentials)
            .force_path_style(true) // Required for MinIO and other S3-compatible services
            .build();

        Self {
            client: Client::from_conf(s3_config),
            bucket: config.bucket.clone(),
            public_url: config
                .public_url
                .as_ref()
                .map(|u| u.trim_end_matches('/').to_string()),
            bucket_ready: Default::default(),
        }
    }

    /// Get the bucket name
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Create the bucket on first use when it does not exist
    async fn ensure_bucket(&self) -> Result<(), StorageError> {
        self.bucket_ready
            .get_or_try_init(|| async {
                if self.client.head_bucket().bucket(&self.bucket).send().await.is_ok() {
                    return Ok(());
                }

                tracing::info!("Creating bucket {}", self.bucket);
                self.client
                    .create_bucket()
                    .bucket(&self.bucket)
                    .send()
                    .await
                    .map(|_| ())
                    .map_err(|e| {
                        StorageError::SdkError(format!(
                            "Failed to create bucket {}: {}",
                            self.bucket, e
                        ))
                    })
            })
            .await
            .map(|_| ())
    }

    /// Public URL when configured, presigned GET otherwise
    async fn url_for(&self, key: &str) -> Result<String, StorageError> {
        if let Some(base) = &self.public_url {
            return Ok(public_object_url(base, &self.bucket, key));
        }

        let presign = PresigningConfig::expires_in(PRESIGN_TTL)
            .map_err(|e| StorageError::SdkError(format!("Invalid presign config: {}", e)))?;

        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presign)
            .await
            .map_err(|e| StorageError::SdkError(format!("Failed to presign {}: {}", key, e)))?;

        Ok(request.uri().to_string())
    }
}

/// `{base}/{bucket}/{object}`, object name percent-encoded
pub fn public_object_url(base: &str, bucket: &str, key: &str) -> String {
    format!(
        "{}/{}/{}",
        base.trim_end_matches('/'),
        bucket,
        urlencoding::encode(key)
    )
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put_object(&self, file: UploadFile) -> Result<UploadedObject, StorageError> {
        self.ensure_bucket().await?;

        let key = object_name_for(&file.file_name);
        let size = file.size() as u64;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .content_type(&file.mime_type)
            .body(ByteStream::from(file.bytes.to_vec()))
            .send()
            .await
            .map_err(|e| StorageError::SdkError(format!("Failed to put object {}: {}", key, e)))?;

        tracing::debug!(bucket = %self.bucket, object = %key, size, "Stored object");

        Ok(UploadedObject {
            bucket_name: self.bucket.clone(),
            file_url: self.url_for(&key).await?,
            object_name: key,
            content_type: file.mime_type,
            size,
        })
    }
}
