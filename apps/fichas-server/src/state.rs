//! Application state management

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::RwLockWriteGuard;

use crate::config::{Config, StorageMode};
use crate::imaging::StorageEncoding;
use crate::notify::Notifier;
use crate::ocr::{OcrService, OcrServiceConfig};
use crate::persist::SaveContext;
use crate::progress::{Operation, ProgressSlot};
use crate::records::{RecordApiClient, RecordSink};
use crate::storage::{ObjectStore, S3ObjectStore, UploadApiClient};
use crate::workspace::{SharedWorkspace, Workspace};

/// Allows one batch operation (split, extract-all, save) at a time
#[derive(Clone, Default)]
pub struct OperationLock {
    current: Arc<Mutex<Option<Operation>>>,
}

/// Held while an operation runs; releases the lock on drop
pub struct OperationGuard {
    current: Arc<Mutex<Option<Operation>>>,
}

impl OperationLock {
    /// Claim the lock, or return the operation already holding it
    pub fn try_acquire(&self, operation: Operation) -> Result<OperationGuard, Operation> {
        let mut current = self.current.lock();
        if let Some(running) = *current {
            return Err(running);
        }
        *current = Some(operation);
        Ok(OperationGuard {
            current: self.current.clone(),
        })
    }

    pub fn current(&self) -> Option<Operation> {
        *self.current.lock()
    }
}

impl Drop for OperationGuard {
    fn drop(&mut self) {
        *self.current.lock() = None;
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    workspace: SharedWorkspace,
    progress: ProgressSlot,
    operations: OperationLock,
    notifier: Notifier,
    ocr: OcrService,
    store: Arc<dyn ObjectStore>,
    records: Arc<dyn RecordSink>,
    encoding: StorageEncoding,
}

impl AppState {
    /// Create the state with the collaborators named in `config`
    pub fn new(config: Config) -> Self {
        let store: Arc<dyn ObjectStore> = match config.storage.mode {
            StorageMode::Api => Arc::new(UploadApiClient::new(
                config.storage.upload_url.clone(),
                config.storage.upload_bucket.clone(),
            )),
            StorageMode::S3 => Arc::new(S3ObjectStore::new(&config.storage.s3)),
        };
        let records = Arc::new(RecordApiClient::new(config.records.create_url.clone()));
        let ocr = OcrService::new(OcrServiceConfig::from_config(&config.ocr));

        Self::with_services(config, ocr, store, records)
    }

    /// Create the state around explicit collaborators
    pub fn with_services(
        config: Config,
        ocr: OcrService,
        store: Arc<dyn ObjectStore>,
        records: Arc<dyn RecordSink>,
    ) -> Self {
        let encoding = StorageEncoding::from_config(&config.pipeline);

        Self {
            inner: Arc::new(AppStateInner {
                config,
                workspace: Workspace::shared(),
                progress: ProgressSlot::new(),
                operations: OperationLock::default(),
                notifier: Notifier::new(),
                ocr,
                store,
                records,
                encoding,
            }),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn workspace(&self) -> &SharedWorkspace {
        &self.inner.workspace
    }

    /// Write access for request-driven edits, or the batch operation in the way.
    ///
    /// Batch operations take their snapshot under the workspace lock after
    /// claiming the operation lock, so an edit granted here always lands
    /// before that snapshot.
    pub async fn edit_workspace(&self) -> Result<RwLockWriteGuard<'_, Workspace>, Operation> {
        let workspace = self.inner.workspace.write().await;
        match self.inner.operations.current() {
            Some(running) => Err(running),
            None => Ok(workspace),
        }
    }

    pub fn progress(&self) -> &ProgressSlot {
        &self.inner.progress
    }

    pub fn operations(&self) -> &OperationLock {
        &self.inner.operations
    }

    pub fn notifier(&self) -> &Notifier {
        &self.inner.notifier
    }

    pub fn ocr(&self) -> &OcrService {
        &self.inner.ocr
    }

    /// Collaborators for a save run
    pub fn save_context(&self) -> SaveContext<'_> {
        SaveContext {
            store: self.inner.store.as_ref(),
            records: self.inner.records.as_ref(),
            encoding: self.inner.encoding,
            progress: &self.inner.progress,
            notifier: &self.inner.notifier,
        }
    }
}
