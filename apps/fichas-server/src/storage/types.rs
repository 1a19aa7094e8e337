//! Storage types

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::ingest::UploadFile;

/// Storage-specific errors
#[derive(Error, Debug)]
pub enum StorageError {
    /// The upload endpoint answered with a non-2xx status
    #[error("Upload rejected ({status}): {message}")]
    UploadRejected { status: u16, message: String },

    #[error("Upload request failed: {0}")]
    Transport(String),

    #[error("Invalid upload response: {0}")]
    InvalidResponse(String),

    #[error("S3 SDK error: {0}")]
    SdkError(String),
}

/// Where an uploaded file ended up
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedObject {
    pub bucket_name: String,
    pub object_name: String,
    pub file_url: String,
    pub content_type: String,
    pub size: u64,
}

/// Destination for band images
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `file` under a fresh object name derived from its file name
    async fn put_object(&self, file: UploadFile) -> Result<UploadedObject, StorageError>;
}

/// `{unique-id}-{file_name}`
pub fn object_name_for(file_name: &str) -> String {
    format!("{}-{}", Uuid::new_v4().simple(), file_name)
}

#[cfg(test)]
pub use mock::MockStore;

#[cfg(test)]
mod mock {
    use super::*;
    use parking_lot::Mutex;

    /// In-memory store recording every put; can be told to fail
    #[derive(Default)]
    pub struct MockStore {
        pub puts: Mutex<Vec<UploadFile>>,
        /// Fail puts whose file name contains this fragment
        pub fail_on: Mutex<Option<String>>,
        /// Time each put takes
        pub delay: Option<std::time::Duration>,
    }

    impl MockStore {
        pub fn failing_on(fragment: &str) -> Self {
            Self {
                fail_on: Mutex::new(Some(fragment.to_string())),
                ..Self::default()
            }
        }

        pub fn slow(delay: std::time::Duration) -> Self {
            Self {
                delay: Some(delay),
                ..Self::default()
            }
        }

        pub fn put_count(&self) -> usize {
            self.puts.lock().len()
        }

        pub fn file_names(&self) -> Vec<String> {
            self.puts.lock().iter().map(|f| f.file_name.clone()).collect()
        }
    }

    #[async_trait]
    impl ObjectStore for MockStore {
        async fn put_object(&self, file: UploadFile) -> Result<UploadedObject, StorageError> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if let Some(fragment) = self.fail_on.lock().as_deref() {
                if file.file_name.contains(fragment) {
                    return Err(StorageError::UploadRejected {
                        status: 500,
                        message: "mock failure".to_string(),
                    });
                }
            }

            let object_name = object_name_for(&file.file_name);
            let uploaded = UploadedObject {
                bucket_name: "fichas".to_string(),
                file_url: format!("http://storage.test/fichas/{}", object_name),
                object_name,
                content_type: file.mime_type.clone(),
                size: file.size() as u64,
            };
            self.puts.lock().push(file);
            Ok(uploaded)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_name_is_unique_and_keeps_file_name() {
        let a = object_name_for("ficha-0-0-frente.jpg");
        let b = object_name_for("ficha-0-0-frente.jpg");
        assert_ne!(a, b);
        assert!(a.ends_with("-ficha-0-0-frente.jpg"));
    }
}
