//! Workspace state and its mutators

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::types::{
    Classification, Composite, ImageSummary, ScanType, UploadedImage, WorkspaceStage,
};
use crate::ingest::UploadFile;

/// Workspace shared between handlers and background batch tasks.
///
/// Writers never hold the lock across I/O: they snapshot, release, work,
/// then re-acquire to apply the result.
pub type SharedWorkspace = Arc<RwLock<Workspace>>;

/// User-adjustable settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceSettings {
    /// Type assigned to the first upload position
    pub first_scan_type: ScanType,
    #[serde(flatten)]
    pub classification: Classification,
}

/// In-memory state of one processing session
#[derive(Debug)]
pub struct Workspace {
    images: Vec<UploadedImage>,
    composites: Vec<Composite>,
    settings: WorkspaceSettings,
    stage: WorkspaceStage,
    last_split_duration: Option<Duration>,
}

impl Default for Workspace {
    fn default() -> Self {
        Self::new()
    }
}

impl Workspace {
    pub fn new() -> Self {
        Self {
            images: Vec::new(),
            composites: Vec::new(),
            settings: WorkspaceSettings::default(),
            stage: WorkspaceStage::Upload,
            last_split_duration: None,
        }
    }

    pub fn shared() -> SharedWorkspace {
        Arc::new(RwLock::new(Self::new()))
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn images(&self) -> &[UploadedImage] {
        &self.images
    }

    pub fn image(&self, id: &str) -> Option<&UploadedImage> {
        self.images.iter().find(|img| img.id == id)
    }

    pub fn composites(&self) -> &[Composite] {
        &self.composites
    }

    pub fn composite(&self, id: &str) -> Option<&Composite> {
        self.composites.iter().find(|c| c.id == id)
    }

    pub fn settings(&self) -> &WorkspaceSettings {
        &self.settings
    }

    pub fn stage(&self) -> WorkspaceStage {
        self.stage
    }

    pub fn last_split_duration(&self) -> Option<Duration> {
        self.last_split_duration
    }

    // ========================================================================
    // Uploads
    // ========================================================================

    /// Append uploads, typing each by its position in the workspace.
    ///
    /// Positions continue from the uploads already present, so two separate
    /// calls alternate the same way one combined call would.
    pub fn add_uploads(&mut self, files: Vec<UploadFile>) -> Vec<ImageSummary> {
        let first = self.settings.first_scan_type;
        let start = self.images.len();

        let added: Vec<UploadedImage> = files
            .into_iter()
            .enumerate()
            .map(|(offset, file)| {
                let scan_type = ScanType::for_position(first, start + offset);
                let id = format!("img-{}", Uuid::new_v4().simple());
                UploadedImage::new(id, file, scan_type)
            })
            .collect();

        let summaries = added.iter().map(UploadedImage::summary).collect();
        self.images.extend(added);

        tracing::debug!(total = self.images.len(), "Added uploads to workspace");
        summaries
    }

    /// Remove one upload; returns whether it existed
    pub fn remove_image(&mut self, id: &str) -> bool {
        let before = self.images.len();
        self.images.retain(|img| img.id != id);
        self.images.len() != before
    }

    pub fn clear_images(&mut self) {
        self.images.clear();
    }

    // ========================================================================
    // Composites
    // ========================================================================

    /// Install a freshly built composite set and move to the process stage
    pub fn replace_composites(&mut self, composites: Vec<Composite>, elapsed: Duration) {
        self.composites = composites;
        self.stage = WorkspaceStage::Process;
        self.last_split_duration = Some(elapsed);
    }

    /// Apply `f` to the composite with `id`; returns `None` when it is gone
    /// (for instance after a reset while a batch was running)
    pub fn update_composite<F, T>(&mut self, id: &str, f: F) -> Option<T>
    where
        F: FnOnce(&mut Composite) -> T,
    {
        self.composites.iter_mut().find(|c| c.id == id).map(f)
    }

    pub fn mark_saved(&mut self, id: &str) -> bool {
        self.update_composite(id, Composite::mark_saved).is_some()
    }

    // ========================================================================
    // Settings / lifecycle
    // ========================================================================

    pub fn set_first_scan_type(&mut self, scan_type: ScanType) {
        self.settings.first_scan_type = scan_type;
    }

    pub fn set_classification(&mut self, classification: Classification) {
        self.settings.classification = classification;
    }

    /// Drop uploads and composites and return to the upload stage.
    /// Settings survive a reset.
    pub fn reset(&mut self) {
        self.images.clear();
        self.composites.clear();
        self.stage = WorkspaceStage::Upload;
        self.last_split_duration = None;
        tracing::info!("Workspace reset");
    }
}
